//! Double-difference measurement likelihood
use log::debug;

use crate::{
    cfg::Config,
    models::EpochInput,
    prelude::{Carrier, Vector3, SV},
    state::State,
};

/// One double-differenced measurement pair, fixed for the whole epoch
/// at the first filter iteration. The base-side geometry does not
/// depend on the particle state, so it is folded in here once.
#[derive(Debug, Clone)]
struct DoubleDiff {
    sv: SV,
    carrier: Carrier,
    /// Satellite position at transmission time (ECEF m)
    sat_pos_m: Vector3<f64>,
    /// Measured DD pseudo range (m)
    code_m: f64,
    /// Measured DD carrier phase (m)
    phase_m: f64,
    /// Base-side single difference range, this satellite minus pivot (m)
    base_sd_range_m: f64,
}

/// Scores a candidate [State] against one epoch's double-differenced
/// code and phase measurements. The pivot satellite is the highest
/// base-side elevation of the epoch's common set.
#[derive(Debug, Clone)]
pub struct ObservationModel {
    code_noise_m: f64,
    phase_noise_m: f64,

    /// Pivot satellite, position and identity
    pivot: Option<(SV, Carrier, Vector3<f64>)>,
    /// DD entries against the pivot
    dd: Vec<DoubleDiff>,
}

impl ObservationModel {
    pub fn new(cfg: &Config) -> Self {
        Self {
            code_noise_m: cfg.code_noise_m,
            phase_noise_m: cfg.phase_noise_m,
            pivot: None,
            dd: Vec::with_capacity(16),
        }
    }

    /// Acquire this epoch's observations: form the measured double
    /// differences once, refinement iterations only re-evaluate the
    /// rover-side geometry.
    pub fn set_epoch(&mut self, input: &EpochInput) {
        self.pivot = None;
        self.dd.clear();

        let rover = input.group.rover();
        let base = input.group.base();

        let Some(pivot) = input.matches.iter().max_by(|a, b| {
            base[a.base]
                .elevation_deg
                .total_cmp(&base[b.base].elevation_deg)
        }) else {
            return;
        };

        let pivot_rover = &rover[pivot.rover];
        let pivot_base = &base[pivot.base];
        let pivot_sd_code = pivot_rover.pseudo_range_m - pivot_base.pseudo_range_m;
        let pivot_sd_phase = pivot_rover.phase_cycles - pivot_base.phase_cycles;
        let pivot_base_range = (pivot_rover.sat_pos_ecef_m - input.base_pos_m).norm();

        self.pivot = Some((pivot.sv, pivot_rover.carrier, pivot_rover.sat_pos_ecef_m));

        for m in input.matches.iter() {
            if m.sv == pivot.sv {
                continue;
            }
            let obs_rover = &rover[m.rover];
            let obs_base = &base[m.base];
            let lambda = obs_rover.carrier.wavelength();

            let sd_code = obs_rover.pseudo_range_m - obs_base.pseudo_range_m;
            let sd_phase = obs_rover.phase_cycles - obs_base.phase_cycles;

            self.dd.push(DoubleDiff {
                sv: m.sv,
                carrier: obs_rover.carrier,
                sat_pos_m: obs_rover.sat_pos_ecef_m,
                code_m: sd_code - pivot_sd_code,
                phase_m: (sd_phase - pivot_sd_phase) * lambda,
                base_sd_range_m: (obs_rover.sat_pos_ecef_m - input.base_pos_m).norm()
                    - pivot_base_range,
            });
        }
        debug!(
            "{} - observation model: pivot {} + {} double differences",
            input.time,
            pivot.sv,
            self.dd.len(),
        );
    }

    /// Likelihood of `state` given this epoch's double differences.
    /// Unnormalized, non-negative; may underflow to exactly zero for
    /// hopeless states, which the estimator defends against.
    pub fn likelihood(&self, state: &State) -> f64 {
        let Some((pivot_sv, pivot_carrier, pivot_pos)) = self.pivot else {
            return 1.0;
        };
        let pivot_range = (pivot_pos - state.pos_m).norm();
        let pivot_amb = state.ambiguity(pivot_sv, pivot_carrier).unwrap_or(0.0);

        let mut sum_sq = 0.0_f64;
        for dd in self.dd.iter() {
            let range = (dd.sat_pos_m - state.pos_m).norm();
            let dd_range = (range - pivot_range) - dd.base_sd_range_m;

            let code_res = dd.code_m - dd_range;
            sum_sq += (code_res / self.code_noise_m).powi(2);

            let amb = state.ambiguity(dd.sv, dd.carrier).unwrap_or(0.0);
            let lambda = dd.carrier.wavelength();
            let phase_res = dd.phase_m - (dd_range + lambda * (amb - pivot_amb));
            sum_sq += (phase_res / self.phase_noise_m).powi(2);
        }
        (-0.5 * sum_sq).exp()
    }
}
