#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

extern crate gnss_rs as gnss;

// private modules
mod bias;
mod carrier;
mod cfg;
mod combine;
mod constants;
mod error;
mod estimator;
mod models;
mod observation;
mod select;
mod session;
mod smoother;
mod solutions;
mod state;
mod sync;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::bias::{BiasWindow, PhaseBiases};
    pub use crate::carrier::Carrier;
    pub use crate::cfg::{Config, Mode, SolutionType};
    pub use crate::combine::combine;
    pub use crate::estimator::{
        Estimate, Estimator, EpochSolver, ParticleEstimator, RecursiveEstimator,
    };
    pub use crate::models::{EpochInput, MovementModel, ObservationModel};
    pub use crate::observation::{Observation, ObservationLog, Role};
    pub use crate::select::{select_common, SatMatch};
    pub use crate::session::{InitialFix, PointFix, ProgressFn, Session, SolutionSink};
    pub use crate::smoother::smooth;
    pub use crate::solutions::{EpochSolution, Quality, Sym3};
    pub use crate::state::State;
    pub use crate::sync::{Direction, EpochGroup, Synchronizer};
    // re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
    pub use nalgebra::{Matrix3, Vector3};
}

// pub export
pub use error::Error;
