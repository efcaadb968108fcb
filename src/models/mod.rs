//! Movement (transition) and Observation (measurement) models
use hifitime::Duration;

use crate::{
    prelude::{Epoch, Vector3},
    select::SatMatch,
    sync::EpochGroup,
};

mod movement;
mod observation;

pub use movement::MovementModel;
pub use observation::ObservationModel;

/// Everything one epoch exposes to the models and estimators:
/// the synchronized observation group, the selected common satellites,
/// the elapsed time since the previous resolved epoch (negative when
/// traversing backward) and the base position for this epoch.
#[derive(Debug, Clone, Copy)]
pub struct EpochInput<'a> {
    /// Synchronized [EpochGroup]
    pub group: &'a EpochGroup,
    /// Common satellites selected for double differencing
    pub matches: &'a [SatMatch],
    /// Epoch time tag
    pub time: Epoch,
    /// Elapsed time since the previous epoch
    pub dt: Duration,
    /// Base position for this epoch, ECEF meters
    pub base_pos_m: Vector3<f64>,
}
