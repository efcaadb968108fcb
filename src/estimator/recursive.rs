//! Recursive (Kalman-style) solver strategy
use log::debug;

use crate::{
    error::Error,
    estimator::{Estimate, Estimator},
    models::EpochInput,
    state::State,
};

/// The opaque recursive epoch solver collaborator: takes the prior
/// state and one epoch of observations, returns the updated estimate.
/// Implemented outside this crate (RTK/Kalman engine).
pub trait EpochSolver {
    fn solve_epoch(&mut self, prior: &State, input: &EpochInput) -> Result<Estimate, Error>;
}

/// [Estimator] adapter around an [EpochSolver], so the session
/// controller drives the recursive strategy and the particle filter
/// through the same interface.
pub struct RecursiveEstimator {
    solver: Box<dyn EpochSolver>,
    prior: Option<State>,
}

impl RecursiveEstimator {
    pub fn new(solver: Box<dyn EpochSolver>) -> Self {
        Self {
            solver,
            prior: None,
        }
    }
}

impl Estimator for RecursiveEstimator {
    fn set_prior(&mut self, state: State) {
        self.prior = Some(state);
    }

    fn reset(&mut self) {
        self.prior = None;
    }

    fn predict_and_update(&mut self, input: &EpochInput) -> Result<Estimate, Error> {
        let prior = self
            .prior
            .as_ref()
            .ok_or(Error::UninitializedEstimator)?;

        let estimate = self.solver.solve_epoch(prior, input)?;
        debug!("{} - recursive estimate {}", input.time, estimate.state);

        self.prior = Some(estimate.state.clone());
        Ok(estimate)
    }
}
