//! Annealed particle filter estimator
use std::collections::HashMap;

use hifitime::Duration;
use log::debug;
use nalgebra::Matrix3;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    cfg::Config,
    error::Error,
    estimator::{Estimate, Estimator},
    models::{EpochInput, MovementModel, ObservationModel},
    prelude::{Carrier, Quality, Sym3, Vector3, SV},
    state::State,
};

#[derive(Debug, Clone)]
struct Particle {
    state: State,
    weight: f64,
}

/// Particle-based Bayesian estimator: N weighted state samples driven
/// through the movement and observation models, resampled on every
/// iteration, annealed over a small number of refinement iterations
/// per epoch, summarized by the minimum-mean-square-error average.
pub struct ParticleEstimator {
    particles: Vec<Particle>,
    num: usize,
    refinement_iters: usize,
    movement: MovementModel,
    observation: ObservationModel,
    rng: SmallRng,
}

impl ParticleEstimator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            particles: Vec::with_capacity(cfg.num_particles),
            num: cfg.num_particles.max(1),
            refinement_iters: cfg.refinement_iters.max(1),
            movement: MovementModel::new(cfg),
            observation: ObservationModel::new(cfg),
            rng: match cfg.prng_seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_os_rng(),
            },
        }
    }

    /// Redraw the particle set proportional to weight (systematic
    /// scheme), leaving uniform weights behind. A zero or non-finite
    /// weight total is the degenerate case: states are kept as they
    /// are and weights flattened, instead of dividing by zero.
    fn resample(&mut self) {
        let n = self.particles.len();
        let uniform = 1.0 / n as f64;

        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        if !(total > 0.0) || !total.is_finite() {
            debug!("total likelihood underflow: resampling skipped");
            for p in self.particles.iter_mut() {
                p.weight = uniform;
            }
            return;
        }

        let step = total / n as f64;
        let mut u = self.rng.random::<f64>() * step;
        let mut cursor = 0;
        let mut cum = self.particles[0].weight;

        let mut redrawn = Vec::with_capacity(n);
        for _ in 0..n {
            while u > cum && cursor + 1 < n {
                cursor += 1;
                cum += self.particles[cursor].weight;
            }
            redrawn.push(Particle {
                state: self.particles[cursor].state.clone(),
                weight: uniform,
            });
            u += step;
        }
        self.particles = redrawn;
    }

    /// MMSE summary: weighted average state and weighted position
    /// covariance. Falls back to the un-weighted mean when the weight
    /// total underflowed to zero.
    fn mmse(&self) -> (State, Sym3) {
        let n = self.particles.len() as f64;
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();

        let weights: Vec<f64> = if total > 0.0 && total.is_finite() {
            self.particles.iter().map(|p| p.weight / total).collect()
        } else {
            vec![1.0 / n; self.particles.len()]
        };

        let mut mean = State::from_point_fix(self.particles[0].state.t, Vector3::zeros());
        let mut ambiguities: HashMap<(SV, Carrier), f64> = HashMap::with_capacity(16);

        for (p, w) in self.particles.iter().zip(weights.iter()) {
            mean.pos_m += p.state.pos_m * *w;
            mean.vel_m_s += p.state.vel_m_s * *w;
            mean.clock_drift_s_s += p.state.clock_drift_s_s * *w;
            for (key, amb) in p.state.ambiguities() {
                *ambiguities.entry(*key).or_insert(0.0) += amb * *w;
            }
        }
        for ((sv, carrier), amb) in ambiguities {
            mean.set_ambiguity(sv, carrier, amb);
        }

        let mut covar = Matrix3::<f64>::zeros();
        for (p, w) in self.particles.iter().zip(weights.iter()) {
            let diff: Vector3<f64> = p.state.pos_m - mean.pos_m;
            covar += *w * diff * diff.transpose();
        }

        (mean, Sym3::from_matrix(&covar))
    }
}

impl Estimator for ParticleEstimator {
    fn set_prior(&mut self, state: State) {
        let uniform = 1.0 / self.num as f64;
        self.particles = (0..self.num)
            .map(|_| Particle {
                state: state.clone(),
                weight: uniform,
            })
            .collect();
    }

    fn reset(&mut self) {
        self.particles.clear();
        self.movement.reset();
    }

    fn predict_and_update(&mut self, input: &EpochInput) -> Result<Estimate, Error> {
        if self.particles.is_empty() {
            return Err(Error::UninitializedEstimator);
        }

        // observations and satellites acquired once per epoch
        self.movement.set_epoch(input);
        self.observation.set_epoch(input);
        for p in self.particles.iter_mut() {
            self.movement.seed_ambiguities(&mut p.state, input);
        }

        for iteration in 0..self.refinement_iters {
            // time advances on the first iteration only, refinements
            // re-draw the (annealed) proposal around the posterior
            let dt = if iteration == 0 {
                input.dt
            } else {
                self.movement.tighten();
                Duration::ZERO
            };

            for p in self.particles.iter_mut() {
                self.movement.drift(&mut p.state, dt, &mut self.rng);
                p.weight = self.observation.likelihood(&p.state);
            }
            self.resample();
        }
        self.movement.reset();

        let (state, covar) = self.mmse();
        debug!(
            "{} - pf estimate x={:.3} y={:.3} z={:.3}",
            input.time, state.pos_m[0], state.pos_m[1], state.pos_m[2],
        );

        Ok(Estimate {
            state,
            covar,
            quality: Quality::Float,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        observation::{Observation, ObservationLog, Role},
        prelude::{Constellation, Epoch},
        select::select_common,
        sync::{Direction, Synchronizer},
    };
    use hifitime::Unit;

    fn zero_noise_cfg() -> Config {
        let mut cfg = Config::default();
        cfg.num_particles = 1;
        cfg.pos_proposal_std_m = 0.0;
        cfg.amb_bounds_cycles = (0.0, 0.0);
        cfg.prng_seed = Some(7);
        cfg
    }

    fn consistent_log(rover: Vector3<f64>, base: Vector3<f64>) -> ObservationLog {
        let t = Epoch::from_gpst_seconds(0.0);
        let sats = [
            (2_u8, Vector3::new(2.0E7, 0.0, 1.0E7)),
            (5, Vector3::new(0.0, 2.0E7, 1.2E7)),
            (9, Vector3::new(-1.5E7, 1.0E7, 1.5E7)),
        ];
        let mut records = Vec::new();
        for (prn, sat) in sats.iter() {
            for (role, rx) in [(Role::Rover, rover), (Role::Base, base)] {
                let range = (sat - rx).norm();
                records.push(Observation::new(
                    t,
                    SV::new(Constellation::GPS, *prn),
                    role,
                    Carrier::L1,
                    range,
                    range / Carrier::L1.wavelength(),
                    *sat,
                    45.0,
                    0.0,
                ));
            }
        }
        ObservationLog::from_records(records)
    }

    /// Degenerate-filter sanity check: one particle, zero noise, the
    /// MMSE estimate is exactly the deterministic prediction.
    #[test]
    fn single_particle_zero_noise_is_deterministic() {
        let rover = Vector3::new(10.0, 20.0, 30.0);
        let log = consistent_log(rover, Vector3::zeros());
        let mut sync = Synchronizer::start(Direction::Forward, &log);
        let group = sync
            .next_group(&log, 5.0 * Unit::Millisecond, false, Direction::Forward)
            .unwrap()
            .unwrap();
        let matches = select_common(&group, 15.0);

        let cfg = zero_noise_cfg();
        let mut estimator = ParticleEstimator::new(&cfg);
        estimator.set_prior(State::from_point_fix(group.time(), rover));

        let input = EpochInput {
            group: &group,
            matches: &matches,
            time: group.time(),
            dt: Duration::ZERO,
            base_pos_m: Vector3::zeros(),
        };
        let estimate = estimator.predict_and_update(&input).unwrap();
        assert_eq!(estimate.state.pos_m, rover);
        assert_eq!(estimate.quality, Quality::Float);
    }

    /// All-zero weights must produce the un-weighted mean, never NaN.
    #[test]
    fn zero_weight_fallback_is_unweighted_mean() {
        let cfg = zero_noise_cfg();
        let mut estimator = ParticleEstimator::new(&cfg);

        let t = Epoch::from_gpst_seconds(0.0);
        estimator.particles = vec![
            Particle {
                state: State::from_point_fix(t, Vector3::new(0.0, 0.0, 0.0)),
                weight: 0.0,
            },
            Particle {
                state: State::from_point_fix(t, Vector3::new(2.0, 4.0, 6.0)),
                weight: 0.0,
            },
        ];

        let (mean, covar) = estimator.mmse();
        assert_eq!(mean.pos_m, Vector3::new(1.0, 2.0, 3.0));
        assert!(covar.trace().is_finite());
    }

    /// Resampling a degenerate (all-zero) set keeps every state.
    #[test]
    fn zero_weight_resample_keeps_states() {
        let cfg = zero_noise_cfg();
        let mut estimator = ParticleEstimator::new(&cfg);

        let t = Epoch::from_gpst_seconds(0.0);
        estimator.particles = (0..4)
            .map(|k| Particle {
                state: State::from_point_fix(t, Vector3::new(k as f64, 0.0, 0.0)),
                weight: 0.0,
            })
            .collect();

        estimator.resample();
        assert_eq!(estimator.particles.len(), 4);
        for (k, p) in estimator.particles.iter().enumerate() {
            assert_eq!(p.state.pos_m[0], k as f64);
            assert_eq!(p.weight, 0.25);
        }
    }
}
