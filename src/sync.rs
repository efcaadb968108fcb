//! Epoch synchronization over the sorted observation log
use hifitime::Duration;
use log::debug;

use crate::{
    error::Error,
    observation::{Observation, ObservationLog, Role},
    prelude::Epoch,
};

/// Log traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increasing time
    Forward,
    /// Decreasing time
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// One matched epoch: rover records first, then the base records
/// selected for that rover time. Owned copy, so downstream
/// corrections can mutate the phases.
#[derive(Debug, Clone)]
pub struct EpochGroup {
    pub obs: Vec<Observation>,
    n_rover: usize,
    n_base: usize,
}

impl EpochGroup {
    pub fn rover(&self) -> &[Observation] {
        &self.obs[..self.n_rover]
    }

    pub fn base(&self) -> &[Observation] {
        &self.obs[self.n_rover..]
    }

    pub fn n_rover(&self) -> usize {
        self.n_rover
    }

    pub fn n_base(&self) -> usize {
        self.n_base
    }

    /// Epoch time tag (rover side).
    pub fn time(&self) -> Epoch {
        self.obs[0].time
    }

    pub fn is_empty(&self) -> bool {
        self.n_rover == 0
    }

    /// Drop records not matching the predicate, maintaining the
    /// rover-first layout and counts.
    pub fn retain<F: FnMut(&Observation) -> bool>(&mut self, f: F) {
        self.obs.retain(f);
        self.n_rover = self
            .obs
            .iter()
            .filter(|obs| obs.role == Role::Rover)
            .count();
        self.n_base = self.obs.len() - self.n_rover;
    }
}

/// Scan the contiguous same-role run starting at `cursor`, increasing
/// indices, grouped within +tol of the run head. Returns the run length,
/// 0 marking end of stream. The cursor is left on the run head.
fn next_run_forward(
    log: &ObservationLog,
    cursor: &mut isize,
    role: Role,
    tol: Duration,
) -> Result<usize, Error> {
    if *cursor < 0 {
        return Err(Error::CursorOutOfRange);
    }
    let recs = log.records();
    let len = recs.len() as isize;

    while *cursor < len && recs[*cursor as usize].role != role {
        *cursor += 1;
    }
    if *cursor >= len {
        return Ok(0);
    }

    let t0 = recs[*cursor as usize].time;
    let mut n = 0_usize;
    while *cursor + (n as isize) < len {
        let obs = &recs[(*cursor + n as isize) as usize];
        if obs.role != role || obs.time - t0 > tol {
            break;
        }
        n += 1;
    }
    Ok(n)
}

/// Backward twin of [next_run_forward]: decreasing indices, grouped
/// within -tol. A cursor parked at -1 is the natural exhaustion state.
fn next_run_backward(
    log: &ObservationLog,
    cursor: &mut isize,
    role: Role,
    tol: Duration,
) -> Result<usize, Error> {
    let recs = log.records();
    let len = recs.len() as isize;
    if *cursor >= len {
        return Err(Error::CursorOutOfRange);
    }

    while *cursor >= 0 && recs[*cursor as usize].role != role {
        *cursor -= 1;
    }
    if *cursor < 0 {
        return Ok(0);
    }

    let t0 = recs[*cursor as usize].time;
    let mut n = 0_usize;
    while *cursor - (n as isize) >= 0 {
        let obs = &recs[(*cursor - n as isize) as usize];
        if obs.role != role || obs.time - t0 < -tol {
            break;
        }
        n += 1;
    }
    Ok(n)
}

/// Pulls time-matched rover/base groups out of the log, one cursor per
/// role. The rover cursor advances past each returned run; the base
/// cursor stays on the selected run so it can serve several rover
/// epochs when sampling rates differ.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    rover: isize,
    base: isize,
}

impl Synchronizer {
    /// Place cursors at the starting edge for `direction`.
    pub fn start(direction: Direction, log: &ObservationLog) -> Self {
        match direction {
            Direction::Forward => Self { rover: 0, base: 0 },
            Direction::Backward => Self {
                rover: log.len() as isize - 1,
                base: log.len() as isize - 1,
            },
        }
    }

    /// Next matched epoch in `direction`, or None at end of stream.
    /// `base_interpolation` selects between the base run straddling the
    /// rover time and the most recent run not newer than it.
    pub fn next_group(
        &mut self,
        log: &ObservationLog,
        tol: Duration,
        base_interpolation: bool,
        direction: Direction,
    ) -> Result<Option<EpochGroup>, Error> {
        match direction {
            Direction::Forward => self.next_forward(log, tol, base_interpolation),
            Direction::Backward => self.next_backward(log, tol, base_interpolation),
        }
    }

    fn next_forward(
        &mut self,
        log: &ObservationLog,
        tol: Duration,
        base_interpolation: bool,
    ) -> Result<Option<EpochGroup>, Error> {
        let recs = log.records();

        let nu = next_run_forward(log, &mut self.rover, Role::Rover, tol)?;
        if nu == 0 {
            return Ok(None);
        }
        let rover_t = recs[self.rover as usize].time;

        if base_interpolation {
            // stop on the first base run not older than rover-tol:
            // together with its successor it straddles the rover time
            loop {
                let nr = next_run_forward(log, &mut self.base, Role::Base, tol)?;
                if nr == 0 || recs[self.base as usize].time - rover_t > -tol {
                    break;
                }
                self.base += nr as isize;
            }
        } else {
            // commit the last base run not newer than rover+tol
            let mut probe = self.base;
            loop {
                let nr = next_run_forward(log, &mut probe, Role::Base, tol)?;
                if nr == 0 || recs[probe as usize].time - rover_t > tol {
                    break;
                }
                self.base = probe;
                probe += nr as isize;
            }
        }
        let nr = next_run_forward(log, &mut self.base, Role::Base, tol)?;

        let mut obs = Vec::with_capacity(nu + nr);
        obs.extend_from_slice(&recs[self.rover as usize..self.rover as usize + nu]);
        obs.extend_from_slice(&recs[self.base as usize..self.base as usize + nr]);
        self.rover += nu as isize;

        debug!("{} - synchronized nu={} nr={}", rover_t, nu, nr);
        Ok(Some(EpochGroup {
            obs,
            n_rover: nu,
            n_base: nr,
        }))
    }

    fn next_backward(
        &mut self,
        log: &ObservationLog,
        tol: Duration,
        base_interpolation: bool,
    ) -> Result<Option<EpochGroup>, Error> {
        let recs = log.records();

        let nu = next_run_backward(log, &mut self.rover, Role::Rover, tol)?;
        if nu == 0 {
            return Ok(None);
        }
        let rover_t = recs[self.rover as usize].time;

        if base_interpolation {
            loop {
                let nr = next_run_backward(log, &mut self.base, Role::Base, tol)?;
                if nr == 0 || recs[self.base as usize].time - rover_t < tol {
                    break;
                }
                self.base -= nr as isize;
            }
        } else {
            let mut probe = self.base;
            loop {
                let nr = next_run_backward(log, &mut probe, Role::Base, tol)?;
                if nr == 0 || recs[probe as usize].time - rover_t < -tol {
                    break;
                }
                self.base = probe;
                probe -= nr as isize;
            }
        }
        let nr = next_run_backward(log, &mut self.base, Role::Base, tol)?;

        let mut obs = Vec::with_capacity(nu + nr);
        let rover_lo = (self.rover + 1 - nu as isize) as usize;
        obs.extend_from_slice(&recs[rover_lo..rover_lo + nu]);
        if nr > 0 {
            let base_lo = (self.base + 1 - nr as isize) as usize;
            obs.extend_from_slice(&recs[base_lo..base_lo + nr]);
        }
        self.rover -= nu as isize;

        debug!("{} - synchronized nu={} nr={}", rover_t, nu, nr);
        Ok(Some(EpochGroup {
            obs,
            n_rover: nu,
            n_base: nr,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::{Carrier, Constellation, Vector3, SV};
    use hifitime::Unit;

    fn obs(t: Epoch, prn: u8, role: Role) -> Observation {
        Observation::new(
            t,
            SV::new(Constellation::GPS, prn),
            role,
            Carrier::L1,
            2.0E7,
            1.0E8,
            Vector3::zeros(),
            45.0,
            0.0,
        )
    }

    fn test_log(epochs: usize) -> ObservationLog {
        let t0 = Epoch::from_gpst_seconds(0.0);
        let mut records = Vec::new();
        for k in 0..epochs {
            let t = t0 + (k as f64) * 30.0 * Unit::Second;
            for prn in [1, 5, 9] {
                records.push(obs(t, prn, Role::Rover));
                records.push(obs(t, prn, Role::Base));
            }
        }
        ObservationLog::from_records(records)
    }

    /// Concatenating all runs reconstructs the original per-role
    /// ordering, nothing omitted, nothing duplicated.
    #[test]
    fn reconstruction_forward() {
        let log = test_log(4);
        let tol = 5.0 * Unit::Millisecond;
        let mut sync = Synchronizer::start(Direction::Forward, &log);

        let mut rebuilt = Vec::new();
        while let Some(group) = sync
            .next_group(&log, tol, false, Direction::Forward)
            .unwrap()
        {
            rebuilt.extend(group.rover().to_vec());
        }
        let expected: Vec<_> = log
            .records()
            .iter()
            .filter(|o| o.role == Role::Rover)
            .cloned()
            .collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn reconstruction_backward() {
        let log = test_log(4);
        let tol = 5.0 * Unit::Millisecond;
        let mut sync = Synchronizer::start(Direction::Backward, &log);

        let mut rebuilt = Vec::new();
        while let Some(group) = sync
            .next_group(&log, tol, false, Direction::Backward)
            .unwrap()
        {
            // groups come latest-first, each internally ascending
            let mut epoch = group.rover().to_vec();
            epoch.extend(rebuilt);
            rebuilt = epoch;
        }
        let expected: Vec<_> = log
            .records()
            .iter()
            .filter(|o| o.role == Role::Rover)
            .cloned()
            .collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn base_matched_to_rover_time() {
        let log = test_log(3);
        let tol = 5.0 * Unit::Millisecond;
        let mut sync = Synchronizer::start(Direction::Forward, &log);

        for _ in 0..3 {
            let group = sync
                .next_group(&log, tol, false, Direction::Forward)
                .unwrap()
                .unwrap();
            assert_eq!(group.n_rover(), 3);
            assert_eq!(group.n_base(), 3);
            assert_eq!(group.base()[0].time, group.time());
        }
        assert!(sync
            .next_group(&log, tol, false, Direction::Forward)
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_cursor_is_fatal() {
        let log = test_log(1);
        let tol = 5.0 * Unit::Millisecond;
        let mut cursor = -3_isize;
        assert_eq!(
            next_run_forward(&log, &mut cursor, Role::Rover, tol),
            Err(Error::CursorOutOfRange)
        );
    }
}
