//! Estimator state vector
use std::collections::HashMap;

use crate::prelude::{Carrier, Epoch, Vector3, SV};

/// Full estimation state: receiver position, optional dynamics terms
/// and the sparse set of float carrier ambiguities, keyed by satellite
/// and signal. One [State] belongs to exactly one directional run and
/// is never shared across directions.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// [Epoch] of validity
    pub t: Epoch,

    /// Receiver position, ECEF meters
    pub pos_m: Vector3<f64>,

    /// Receiver velocity, ECEF m/s. Advanced only when
    /// dynamics are enabled.
    pub vel_m_s: Vector3<f64>,

    /// Receiver clock drift (s.s⁻¹)
    pub clock_drift_s_s: f64,

    /// Float carrier ambiguities (cycles)
    ambiguities: HashMap<(SV, Carrier), f64>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            t: Default::default(),
            pos_m: Vector3::zeros(),
            vel_m_s: Vector3::zeros(),
            clock_drift_s_s: 0.0_f64,
            ambiguities: HashMap::with_capacity(16),
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} x={:.3}m y={:.3}m z={:.3}m ({} ambiguities)",
            self.t,
            self.pos_m[0],
            self.pos_m[1],
            self.pos_m[2],
            self.ambiguities.len(),
        )
    }
}

impl State {
    /// Create a new [State] from an initial point position fix.
    pub fn from_point_fix(t: Epoch, pos_m: Vector3<f64>) -> Self {
        Self {
            t,
            pos_m,
            ..Default::default()
        }
    }

    /// Float ambiguity for (sv, carrier), if tracked.
    pub fn ambiguity(&self, sv: SV, carrier: Carrier) -> Option<f64> {
        self.ambiguities.get(&(sv, carrier)).copied()
    }

    /// Insert or overwrite one float ambiguity (cycles).
    pub fn set_ambiguity(&mut self, sv: SV, carrier: Carrier, cycles: f64) {
        self.ambiguities.insert((sv, carrier), cycles);
    }

    /// Add `delta` cycles to one tracked ambiguity.
    pub(crate) fn perturb_ambiguity(&mut self, sv: SV, carrier: Carrier, delta: f64) {
        if let Some(amb) = self.ambiguities.get_mut(&(sv, carrier)) {
            *amb += delta;
        }
    }

    /// Number of tracked ambiguities.
    pub fn ambiguity_count(&self) -> usize {
        self.ambiguities.len()
    }

    /// Iterate tracked ambiguities.
    pub fn ambiguities(&self) -> impl Iterator<Item = (&(SV, Carrier), &f64)> {
        self.ambiguities.iter()
    }
}
