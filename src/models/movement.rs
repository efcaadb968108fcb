//! State transition and proposal noise
use hifitime::Duration;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use log::debug;

use crate::{
    cfg::Config,
    models::EpochInput,
    prelude::{Carrier, Epoch, SV},
    state::State,
};

/// Advances a [State] by the elapsed epoch time and perturbs it with
/// the proposal noise the particle filter samples from. The proposal
/// is annealed within an epoch ([MovementModel::tighten]) and restored
/// to its configured width before the next epoch
/// ([MovementModel::reset]).
#[derive(Debug, Clone)]
pub struct MovementModel {
    /// Configured (epoch-initial) position proposal std (m)
    cfg_pos_std_m: f64,
    /// Configured (epoch-initial) ambiguity search bounds (cycles)
    cfg_amb_bounds: (f64, f64),

    /// Annealed position proposal
    pos_noise: Normal<f64>,
    /// Annealed position proposal std (m)
    pos_std_m: f64,
    /// Annealed ambiguity search bounds (cycles)
    amb_bounds: (f64, f64),

    dynamics: bool,

    /// Satellites acquired at the first iteration of this epoch
    sats: Vec<(SV, Carrier)>,
    /// Current epoch time
    time: Epoch,
}

impl MovementModel {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg_pos_std_m: cfg.pos_proposal_std_m,
            cfg_amb_bounds: cfg.amb_bounds_cycles,
            pos_noise: Normal::new(0.0, cfg.pos_proposal_std_m)
                .expect("internal error: negative proposal std"),
            pos_std_m: cfg.pos_proposal_std_m,
            amb_bounds: cfg.amb_bounds_cycles,
            dynamics: cfg.dynamics,
            sats: Vec::with_capacity(16),
            time: Default::default(),
        }
    }

    /// Acquire this epoch's common satellite set. Called once per
    /// epoch: refinement iterations reuse the acquired set.
    pub fn set_epoch(&mut self, input: &EpochInput) {
        self.time = input.time;
        self.sats.clear();
        for m in input.matches.iter() {
            let carrier = input.group.rover()[m.rover].carrier;
            self.sats.push((m.sv, carrier));
        }
    }

    /// Initialize float ambiguities for satellites entering the
    /// solution, from the rover-minus-base single difference
    /// (phase minus code over wavelength). Tracked satellites keep
    /// their current estimate.
    pub fn seed_ambiguities(&self, state: &mut State, input: &EpochInput) {
        for m in input.matches.iter() {
            let rover = &input.group.rover()[m.rover];
            let base = &input.group.base()[m.base];
            if state.ambiguity(m.sv, rover.carrier).is_some() {
                continue;
            }
            let lambda = rover.carrier.wavelength();
            let sd_phase = rover.phase_cycles - base.phase_cycles;
            let sd_code = rover.pseudo_range_m - base.pseudo_range_m;
            let amb = sd_phase - sd_code / lambda;
            debug!("{}({}) - ambiguity init {:.3} cyc", input.time, m.sv, amb);
            state.set_ambiguity(m.sv, rover.carrier, amb);
        }
    }

    /// Advance `state` by `dt` and draw one proposal sample:
    /// per-axis Gaussian position noise, uniform ambiguity moves
    /// inside the current search bounds.
    pub fn drift<R: Rng>(&self, state: &mut State, dt: Duration, rng: &mut R) {
        let dt_s = dt.to_seconds();

        if self.dynamics {
            state.pos_m += state.vel_m_s * dt_s;
        }
        state.t = self.time;

        if self.pos_std_m > 0.0 {
            for axis in 0..3 {
                state.pos_m[axis] += self.pos_noise.sample(rng);
            }
        }

        let (lo, hi) = self.amb_bounds;
        if hi > lo {
            for (sv, carrier) in self.sats.iter() {
                state.perturb_ambiguity(*sv, *carrier, rng.random_range(lo..hi));
            }
        }
    }

    /// Anneal: halve the position proposal std and both ambiguity
    /// search bounds.
    pub fn tighten(&mut self) {
        self.pos_std_m /= 2.0;
        self.pos_noise = Normal::new(0.0, self.pos_std_m)
            .expect("internal error: negative proposal std");
        self.amb_bounds = (self.amb_bounds.0 / 2.0, self.amb_bounds.1 / 2.0);
    }

    /// Restore the configured proposal, so annealing never leaks
    /// into the next epoch.
    pub fn reset(&mut self) {
        self.pos_std_m = self.cfg_pos_std_m;
        self.pos_noise = Normal::new(0.0, self.cfg_pos_std_m)
            .expect("internal error: negative proposal std");
        self.amb_bounds = self.cfg_amb_bounds;
    }

    /// Current position proposal std (m).
    pub fn pos_std_m(&self) -> f64 {
        self.pos_std_m
    }

    /// Current ambiguity search bounds (cycles).
    pub fn amb_bounds(&self) -> (f64, f64) {
        self.amb_bounds
    }
}
