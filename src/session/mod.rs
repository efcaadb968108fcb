//! Directional processing session
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info, warn};

use crate::{
    bias::PhaseBiases,
    cfg::{Config, SolutionType},
    combine::combine,
    error::Error,
    estimator::Estimator,
    models::EpochInput,
    observation::{Observation, ObservationLog},
    prelude::{Epoch, EpochSolution, Vector3},
    select::select_common,
    state::State,
    sync::{Direction, Synchronizer},
};

/// Initial point position estimate of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFix {
    /// Resolution [Epoch]
    pub time: Epoch,
    /// Absolute rover position, ECEF meters
    pub pos_m: Vector3<f64>,
}

/// The single point positioning collaborator, consulted every epoch
/// for the time tag and, on the first epoch of a run, the estimator
/// prior. Returning None skips the epoch, it never aborts the run.
pub trait InitialFix {
    fn fix(&mut self, rover: &[Observation]) -> Option<PointFix>;
}

/// Output sink collaborator. Called once per epoch in streaming modes,
/// once per merged epoch (or once in total, static option) in
/// combined mode.
pub trait SolutionSink {
    fn emit(&mut self, solution: &EpochSolution);
}

/// Progress callback, percentage complete.
pub type ProgressFn = Box<dyn FnMut(f64)>;

/// Per-direction solution storage for combined runs. Pre-sized from
/// the epoch count known before either directional run starts;
/// writing past that count is a fatal internal error.
struct DirectionalBuffer {
    solutions: Vec<EpochSolution>,
    capacity: usize,
}

impl DirectionalBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            solutions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, solution: EpochSolution) -> Result<(), Error> {
        if self.solutions.len() >= self.capacity {
            return Err(Error::BufferOverrun);
        }
        self.solutions.push(solution);
        Ok(())
    }
}

enum Output<'a> {
    Stream(&'a mut dyn SolutionSink),
    Buffer(&'a mut DirectionalBuffer),
}

/// Owns everything one processing session needs: the observation log,
/// configuration, bias table, collaborators, cursors and buffers. No
/// state outlives or is shared across sessions; forward and backward
/// runs of a combined session each own a fresh estimator state and
/// write only to their own buffer.
pub struct Session {
    /// Session [Config]
    pub cfg: Config,
    log: ObservationLog,
    biases: PhaseBiases,
    initial_fix: Box<dyn InitialFix>,
    abort: Arc<AtomicBool>,
    progress: Option<ProgressFn>,
}

impl Session {
    /// Build a new [Session] over a sorted observation log.
    pub fn new(
        cfg: Config,
        log: ObservationLog,
        biases: PhaseBiases,
        initial_fix: Box<dyn InitialFix>,
    ) -> Self {
        Self {
            cfg,
            log,
            biases,
            initial_fix,
            abort: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Cooperative abort flag, polled once per epoch. Raising it
    /// terminates the current run without error; a combined session
    /// aborted in either direction emits nothing.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Attach a percentage-complete callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the session: one directional pass streamed to `sink`, or —
    /// with [SolutionType::Combined] — both passes buffered then
    /// merged through the smoother.
    pub fn run<E: Estimator>(
        &mut self,
        estimator: &mut E,
        sink: &mut dyn SolutionSink,
    ) -> Result<(), Error> {
        if self.log.is_empty() {
            return Err(Error::EmptyLog);
        }
        info!(
            "session start: mode={} sol_type={}",
            self.cfg.mode, self.cfg.sol_type,
        );

        match self.cfg.sol_type {
            SolutionType::Forward => {
                self.run_direction(Direction::Forward, estimator, &mut Output::Stream(sink))?;
            },
            SolutionType::Backward => {
                self.run_direction(Direction::Backward, estimator, &mut Output::Stream(sink))?;
            },
            SolutionType::Combined => {
                let nepoch = self.log.epoch_count(self.cfg.dt_tol);
                if nepoch == 0 {
                    return Err(Error::EmptyLog);
                }
                let mut forward = DirectionalBuffer::with_capacity(nepoch);
                let mut backward = DirectionalBuffer::with_capacity(nepoch);

                let aborted = self.run_direction(
                    Direction::Forward,
                    estimator,
                    &mut Output::Buffer(&mut forward),
                )? || self.run_direction(
                    Direction::Backward,
                    estimator,
                    &mut Output::Buffer(&mut backward),
                )?;

                if aborted {
                    info!("session aborted: combination skipped");
                    return Ok(());
                }
                combine(&self.cfg, &forward.solutions, &backward.solutions, sink);
            },
        }
        Ok(())
    }

    /// One directional pass. Returns true when terminated by the abort
    /// flag; the partially filled output of an aborted pass must not
    /// reach the combiner.
    fn run_direction<E: Estimator>(
        &mut self,
        direction: Direction,
        estimator: &mut E,
        out: &mut Output,
    ) -> Result<bool, Error> {
        let total_epochs = self.log.epoch_count(self.cfg.dt_tol).max(1);
        let base_pos = Vector3::new(
            self.cfg.base_pos_ecef_m.0,
            self.cfg.base_pos_ecef_m.1,
            self.cfg.base_pos_ecef_m.2,
        );

        let mut sync = Synchronizer::start(direction, &self.log);
        estimator.reset();

        let mut first = true;
        let mut prev_t: Option<Epoch> = None;
        let mut representative: Option<EpochSolution> = None;
        let mut processed = 0_usize;
        let mut aborted = false;

        loop {
            if self.abort.load(Ordering::Relaxed) {
                info!("{} run aborted", direction);
                aborted = true;
                break;
            }

            let group = sync.next_group(
                &self.log,
                self.cfg.dt_tol,
                self.cfg.base_interpolation,
                direction,
            )?;
            let Some(mut group) = group else {
                break;
            };
            processed += 1;

            if !self.cfg.excluded.is_empty() {
                let excluded = &self.cfg.excluded;
                group.retain(|obs| !excluded.contains(&obs.sv));
            }
            if group.is_empty() {
                continue;
            }

            if !self.biases.is_empty() {
                self.biases.correct(&mut group.obs);
            }

            let Some(fix) = self.initial_fix.fix(group.rover()) else {
                warn!("{} - point position failed, epoch skipped", group.time());
                continue;
            };
            let dt = prev_t.map(|t| fix.time - t).unwrap_or_default();
            prev_t = Some(fix.time);

            if first {
                estimator.set_prior(State::from_point_fix(fix.time, fix.pos_m));
                first = false;
            }

            let matches = select_common(&group, self.cfg.min_sv_elev_deg);
            if matches.is_empty() {
                debug!("{} - no usable common satellite", fix.time);
                continue;
            }

            let input = EpochInput {
                group: &group,
                matches: &matches,
                time: fix.time,
                dt,
                base_pos_m: base_pos,
            };

            let estimate = match estimator.predict_and_update(&input) {
                Ok(estimate) => estimate,
                Err(e @ Error::UninitializedEstimator) => return Err(e),
                Err(e) => {
                    warn!("{} - epoch resolution failed ({}), skipped", fix.time, e);
                    continue;
                },
            };

            let solution = EpochSolution {
                time: fix.time,
                pos_m: estimate.state.pos_m,
                covar: estimate.covar,
                quality: estimate.quality,
                base_pos_m: base_pos,
            };
            debug!("{} {}", direction, solution);

            match out {
                Output::Stream(sink) => {
                    if self.cfg.sol_static() {
                        let replace = match representative.as_ref() {
                            Some(best) => solution.preferred_over(best),
                            None => true,
                        };
                        if replace {
                            representative = Some(solution);
                        }
                    } else {
                        sink.emit(&solution);
                    }
                },
                Output::Buffer(buffer) => buffer.push(solution)?,
            }

            if let Some(progress) = self.progress.as_mut() {
                progress(100.0 * processed as f64 / total_epochs as f64);
            }
        }

        // the static representative still goes out after an abort:
        // it was produced before the abort was raised
        if let Output::Stream(sink) = out {
            if let Some(solution) = representative {
                sink.emit(&solution);
            }
        }
        Ok(aborted)
    }
}
