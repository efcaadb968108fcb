//! Estimation strategies
use crate::{
    error::Error,
    models::EpochInput,
    prelude::{Quality, Sym3},
    state::State,
};

mod particle;
mod recursive;

pub use particle::ParticleEstimator;
pub use recursive::{EpochSolver, RecursiveEstimator};

/// One epoch's estimation output.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Full estimated [State], prior of the next epoch
    pub state: State,
    /// Position covariance
    pub covar: Sym3,
    /// [Quality] grade of the estimate
    pub quality: Quality,
}

/// Estimation strategy interface. The session controller is written
/// once against this seam; the particle filter and the recursive
/// solver collaborator are interchangeable behind it.
pub trait Estimator {
    /// Seed the estimator prior, once per directional run, from the
    /// first epoch's point position fix.
    fn set_prior(&mut self, state: State);

    /// Discard all run state. A directional run never observes
    /// anything from a previous run.
    fn reset(&mut self);

    /// Advance the prior through one epoch of double-differenced
    /// observations and return the refined [Estimate].
    fn predict_and_update(&mut self, input: &EpochInput) -> Result<Estimate, Error>;
}
