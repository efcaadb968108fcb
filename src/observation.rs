//! Observation records and the sorted multi-receiver log
use itertools::{Itertools, MinMaxResult};

use crate::prelude::{Carrier, Duration, Epoch, Vector3, SV};

/// Receiver a record was sampled by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Moving receiver being positioned
    Rover,
    /// Reference station
    Base,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Rover => write!(f, "rover"),
            Self::Base => write!(f, "base"),
        }
    }
}

/// One satellite sampled by one receiver at one epoch.
/// Satellite state (position at transmission time, attitude angles)
/// is resolved upstream by the parsing/orbit collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Sampling [Epoch]
    pub time: Epoch,
    /// [SV] satellite identity
    pub sv: SV,
    /// Sampling [Role]
    pub role: Role,
    /// [Carrier] signal
    pub carrier: Carrier,
    /// Decoded pseudo range (m)
    pub pseudo_range_m: f64,
    /// Carrier phase (cycles)
    pub phase_cycles: f64,
    /// Satellite position at transmission time (ECEF m)
    pub sat_pos_ecef_m: Vector3<f64>,
    /// Elevation seen from this receiver (degrees)
    pub elevation_deg: f64,
    /// Azimuth seen from this receiver (degrees)
    pub azimuth_deg: f64,
    /// Possible SNR (dB-Hz)
    pub snr_dbhz: Option<f64>,
}

impl Observation {
    /// Define a new [Observation].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time: Epoch,
        sv: SV,
        role: Role,
        carrier: Carrier,
        pseudo_range_m: f64,
        phase_cycles: f64,
        sat_pos_ecef_m: Vector3<f64>,
        elevation_deg: f64,
        azimuth_deg: f64,
    ) -> Self {
        Self {
            time,
            sv,
            role,
            carrier,
            pseudo_range_m,
            phase_cycles,
            sat_pos_ecef_m,
            elevation_deg,
            azimuth_deg,
            snr_dbhz: None,
        }
    }

    /// Copies and returns [Observation] with SNR attached.
    pub fn with_snr_dbhz(mut self, snr: f64) -> Self {
        self.snr_dbhz = Some(snr);
        self
    }
}

/// Time-sorted multi-receiver observation log, as read by the
/// file-parsing collaborator. All traversal happens through
/// session-owned cursors, the log itself is immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    records: Vec<Observation>,
}

impl ObservationLog {
    /// Build a log from parsed records, sorting them by
    /// (time, role, satellite) so epoch runs are contiguous.
    pub fn from_records(mut records: Vec<Observation>) -> Self {
        records.sort_by_key(|obs| (obs.time, obs.role, obs.sv));
        Self { records }
    }

    /// Sorted records, read only.
    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rover epochs in the log: one full pass, run up front
    /// so combined-mode buffers are sized before either direction runs.
    pub fn epoch_count(&self, dt_tol: Duration) -> usize {
        let mut count = 0;
        let mut run_start: Option<Epoch> = None;
        for obs in self.records.iter().filter(|obs| obs.role == Role::Rover) {
            match run_start {
                Some(t0) if obs.time - t0 <= dt_tol => {},
                _ => {
                    count += 1;
                    run_start = Some(obs.time);
                },
            }
        }
        count
    }

    /// Observed time span, for progress reporting.
    pub fn time_span(&self) -> Option<(Epoch, Epoch)> {
        match self.records.iter().map(|obs| obs.time).minmax() {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(t) => Some((t, t)),
            MinMaxResult::MinMax(t0, t1) => Some((t0, t1)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Constellation;
    use hifitime::Unit;

    fn obs(t: Epoch, prn: u8, role: Role) -> Observation {
        Observation::new(
            t,
            SV::new(Constellation::GPS, prn),
            role,
            Carrier::L1,
            2.0E7,
            1.0E8,
            Vector3::new(1.5E7, 1.0E7, 1.5E7),
            45.0,
            120.0,
        )
    }

    #[test]
    fn sorting_and_epoch_count() {
        let t0 = Epoch::from_gpst_seconds(100.0);
        let t1 = t0 + 30.0 * Unit::Second;
        let log = ObservationLog::from_records(vec![
            obs(t1, 3, Role::Base),
            obs(t0, 7, Role::Rover),
            obs(t0, 3, Role::Rover),
            obs(t1, 3, Role::Rover),
            obs(t0, 3, Role::Base),
        ]);

        let recs = log.records();
        assert_eq!(recs[0].time, t0);
        assert_eq!(recs[0].role, Role::Rover);
        assert_eq!(recs[0].sv.prn, 3);
        assert_eq!(recs[1].sv.prn, 7);
        assert_eq!(recs[2].role, Role::Base);

        assert_eq!(log.epoch_count(5.0 * Unit::Millisecond), 2);
        assert_eq!(log.time_span(), Some((t0, t1)));
    }
}
