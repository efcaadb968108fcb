//! Carrier phase bias (FCB) corrections
use std::collections::HashMap;

use hifitime::Unit;
use log::debug;

use crate::{
    observation::Observation,
    prelude::{Carrier, Epoch, SV},
};

/// One validity window of satellite phase biases, in cycles,
/// keyed per satellite and carrier signal.
#[derive(Debug, Clone, Default)]
pub struct BiasWindow {
    /// Window opening [Epoch]
    pub start: Epoch,
    /// Window closing [Epoch]
    pub end: Epoch,
    /// Bias (cycles) per ([SV], [Carrier])
    biases: HashMap<(SV, Carrier), f64>,
}

impl BiasWindow {
    /// Define a new [BiasWindow] valid over [start, end].
    pub fn new(start: Epoch, end: Epoch) -> Self {
        Self {
            start,
            end,
            biases: HashMap::with_capacity(16),
        }
    }

    /// Insert one satellite + signal bias (cycles).
    pub fn with_bias(mut self, sv: SV, carrier: Carrier, cycles: f64) -> Self {
        self.biases.insert((sv, carrier), cycles);
        self
    }

    /// Why this window does not apply at `t`, None when it does.
    fn misfit(&self, t: Epoch) -> Option<WindowMisfit> {
        // window edges tolerate 1 ms of slack
        let tol = 1.0 * Unit::Millisecond;
        if self.end < t - tol {
            Some(WindowMisfit::Elapsed)
        } else if self.start > t + tol {
            Some(WindowMisfit::NotYet)
        } else {
            None
        }
    }
}

enum WindowMisfit {
    Elapsed,
    NotYet,
}

/// Satellite phase bias table, produced upstream by the FCB-file
/// collaborator. Windows are expected sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct PhaseBiases {
    windows: Vec<BiasWindow>,
}

impl PhaseBiases {
    /// Build the table from time-sorted windows.
    pub fn from_windows(windows: Vec<BiasWindow>) -> Self {
        Self { windows }
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Correct carrier phases of one epoch group in place.
    /// Only the first window containing the group's time tag applies,
    /// then correction stops: later-dated windows are never consulted
    /// for this epoch.
    pub fn correct(&self, obs: &mut [Observation]) {
        let Some(t) = obs.first().map(|o| o.time) else {
            return;
        };
        for window in self.windows.iter() {
            match window.misfit(t) {
                Some(WindowMisfit::Elapsed) => continue,
                Some(WindowMisfit::NotYet) => break,
                None => {},
            }
            for o in obs.iter_mut() {
                if o.phase_cycles == 0.0 {
                    continue;
                }
                if let Some(bias) = window.biases.get(&(o.sv, o.carrier)) {
                    o.phase_cycles -= bias;
                    debug!("{}({}) - fcb correction {:.4} cyc", t, o.sv, bias);
                }
            }
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::{Constellation, Role, Vector3};

    fn obs(t: Epoch, prn: u8) -> Observation {
        Observation::new(
            t,
            SV::new(Constellation::GPS, prn),
            Role::Rover,
            Carrier::L1,
            2.0E7,
            100.0,
            Vector3::zeros(),
            45.0,
            0.0,
        )
    }

    #[test]
    fn first_containing_window_only() {
        let t0 = Epoch::from_gpst_seconds(0.0);
        let sv = SV::new(Constellation::GPS, 1);

        let w0 = BiasWindow::new(t0, t0 + 30.0 * Unit::Second).with_bias(sv, Carrier::L1, 0.25);
        let w1 = BiasWindow::new(t0 + 30.0 * Unit::Second, t0 + 60.0 * Unit::Second)
            .with_bias(sv, Carrier::L1, 0.75);
        let table = PhaseBiases::from_windows(vec![w0, w1]);

        let t = t0 + 10.0 * Unit::Second;
        let mut group = vec![obs(t, 1), obs(t, 2)];
        table.correct(&mut group);

        // matching satellite corrected by the first window only
        assert!((group[0].phase_cycles - 99.75).abs() < 1E-9);
        // no table entry, untouched
        assert!((group[1].phase_cycles - 100.0).abs() < 1E-9);
    }

    #[test]
    fn elapsed_window_skipped() {
        let t0 = Epoch::from_gpst_seconds(0.0);
        let sv = SV::new(Constellation::GPS, 1);

        let w0 = BiasWindow::new(t0, t0 + 30.0 * Unit::Second).with_bias(sv, Carrier::L1, 0.25);
        let w1 = BiasWindow::new(t0 + 30.0 * Unit::Second, t0 + 60.0 * Unit::Second)
            .with_bias(sv, Carrier::L1, 0.75);
        let table = PhaseBiases::from_windows(vec![w0, w1]);

        let t = t0 + 45.0 * Unit::Second;
        let mut group = vec![obs(t, 1)];
        table.correct(&mut group);
        assert!((group[0].phase_cycles - 99.25).abs() < 1E-9);
    }
}
