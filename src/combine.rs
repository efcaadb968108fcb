//! Forward/backward solution combination
use log::{debug, info};

use crate::{
    cfg::{Config, Mode},
    prelude::{EpochSolution, Quality},
    session::SolutionSink,
    smoother::smooth,
};

/// Compare the forward and backward estimates of one epoch: each
/// position axis must agree within 4 sigma of the summed per-axis
/// variance. Exactly at the boundary still passes.
fn validate_combination(f: &EpochSolution, b: &EpochSolution) -> bool {
    for axis in 0..3 {
        let dr = f.pos_m[axis] - b.pos_m[axis];
        let var = f.covar.var(axis) + b.covar.var(axis);
        if dr * dr <= 16.0 * var {
            continue;
        }
        info!(
            "degrade fix to float: {} axis={} dr={:.3} std={:.3}",
            f.time,
            axis,
            dr,
            var.max(0.0).sqrt(),
        );
        return false;
    }
    true
}

/// Merge two completed directional solution sequences — forward
/// ascending, backward descending over the same epochs — into one
/// combined sequence, streamed to `sink`.
///
/// Epochs present on one side only are emitted unmodified. Matching
/// epochs of unequal quality emit the better one. Matching epochs of
/// equal quality are fused by the fixed-interval smoother, stamped at
/// the midpoint, and — for ambiguity-fixed kinematic or
/// moving-baseline solutions — validated with the 4-sigma rule that
/// may demote the merge to float, never the opposite. In
/// moving-baseline mode the smoother runs on the rover-minus-base
/// vector and the base position is re-added afterwards.
///
/// With the static option, only the best-priority merged solution
/// (earliest on ties) is emitted, once, at the end.
pub fn combine(
    cfg: &Config,
    forward: &[EpochSolution],
    backward: &[EpochSolution],
    sink: &mut dyn SolutionSink,
) {
    let tol = cfg.dt_tol;
    let solstatic = cfg.sol_static();
    let mut representative: Option<EpochSolution> = None;

    debug!(
        "combining {} forward with {} backward solutions",
        forward.len(),
        backward.len(),
    );

    let mut i = 0_isize;
    let mut j = backward.len() as isize - 1;

    while i < forward.len() as isize && j >= 0 {
        let f = &forward[i as usize];
        let b = &backward[j as usize];
        let tt = f.time - b.time;

        let merged = if tt < -tol {
            // forward-only epoch: hold the backward side
            j += 1;
            f.clone()
        } else if tt > tol {
            // backward-only epoch: hold the forward side
            i -= 1;
            b.clone()
        } else if f.quality.priority() < b.quality.priority() {
            f.clone()
        } else if f.quality.priority() > b.quality.priority() {
            b.clone()
        } else {
            let mut sols = f.clone();
            sols.time = f.time - tt / 2.0;

            if (cfg.mode == Mode::Kinematic || cfg.mode == Mode::MovingBaseline)
                && sols.quality.is_fixed()
                && !validate_combination(f, b)
            {
                sols.quality = Quality::Float;
            }

            let fused = if cfg.mode == Mode::MovingBaseline {
                let rel_f = f.pos_m - f.base_pos_m;
                let rel_b = b.pos_m - b.base_pos_m;
                smooth(&rel_f, &f.covar, &rel_b, &b.covar)
                    .map(|(x, q)| (sols.base_pos_m + x, q))
            } else {
                smooth(&f.pos_m, &f.covar, &b.pos_m, &b.covar)
            };

            match fused {
                Some((pos, covar)) => {
                    sols.pos_m = pos;
                    sols.covar = covar;
                },
                None => {
                    // singular covariance: epoch dropped
                    i += 1;
                    j -= 1;
                    continue;
                },
            }
            sols
        };

        if solstatic {
            let replace = match representative.as_ref() {
                Some(best) => merged.preferred_over(best),
                None => true,
            };
            if replace {
                representative = Some(merged);
            }
        } else {
            sink.emit(&merged);
        }

        i += 1;
        j -= 1;
    }

    if let Some(sol) = representative {
        sink.emit(&sol);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::{Epoch, Sym3, Vector3};
    use hifitime::Unit;
    use rstest::rstest;

    struct Collector {
        solutions: Vec<EpochSolution>,
    }

    impl SolutionSink for Collector {
        fn emit(&mut self, solution: &EpochSolution) {
            self.solutions.push(solution.clone());
        }
    }

    fn solution(t_s: f64, pos: Vector3<f64>, quality: Quality) -> EpochSolution {
        EpochSolution {
            time: Epoch::from_gpst_seconds(t_s),
            pos_m: pos,
            covar: Sym3::from_diagonal(1.0, 1.0, 1.0),
            quality,
            base_pos_m: Vector3::zeros(),
        }
    }

    fn sequence(quality: Quality) -> Vec<EpochSolution> {
        (0..5)
            .map(|k| {
                solution(
                    k as f64 * 30.0,
                    Vector3::new(k as f64, 2.0 * k as f64, -(k as f64)),
                    quality,
                )
            })
            .collect()
    }

    /// Merging a buffer with itself reproduces the sequence: positions
    /// unchanged, quality unchanged (zero discrepancy never demotes),
    /// variance halved by the fusion.
    #[test]
    fn self_merge_is_identity() {
        let cfg = Config::default();
        let forward = sequence(Quality::Fix);
        let mut backward = forward.clone();
        backward.reverse();

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);

        assert_eq!(sink.solutions.len(), forward.len());
        for (merged, original) in sink.solutions.iter().zip(forward.iter()) {
            assert_eq!(merged.time, original.time);
            assert!((merged.pos_m - original.pos_m).norm() < 1E-9);
            assert_eq!(merged.quality, Quality::Fix);
            assert!((merged.covar.var(0) - 0.5).abs() < 1E-9);
        }
    }

    #[test]
    fn better_quality_side_wins() {
        let cfg = Config::default();
        let forward = vec![solution(0.0, Vector3::new(1.0, 0.0, 0.0), Quality::Float)];
        let backward = vec![solution(0.0, Vector3::new(9.0, 0.0, 0.0), Quality::Fix)];

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);

        assert_eq!(sink.solutions.len(), 1);
        assert_eq!(sink.solutions[0].quality, Quality::Fix);
        assert_eq!(sink.solutions[0].pos_m[0], 9.0);
    }

    #[test]
    fn one_sided_epochs_pass_through() {
        let cfg = Config::default();
        // forward has an extra early epoch the backward pass missed
        let forward = sequence(Quality::Float);
        let backward: Vec<_> = forward[1..].iter().rev().cloned().collect();

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);

        assert_eq!(sink.solutions.len(), 5);
        assert_eq!(sink.solutions[0], forward[0]);
    }

    /// Demotion triggers only strictly beyond 4 sigma: with 0.5 m²
    /// variance on each side the summed variance is 1.0, so the
    /// per-axis threshold sits exactly at dr = 4.
    #[rstest]
    #[case(4.0 - 1E-9, Quality::Fix)]
    #[case(4.0, Quality::Fix)]
    #[case(4.0 + 1E-6, Quality::Float)]
    fn four_sigma_boundary(#[case] dx: f64, #[case] expected: Quality) {
        let cfg = Config::default();
        let mut forward = vec![solution(0.0, Vector3::new(dx, 0.0, 0.0), Quality::Fix)];
        let mut backward = vec![solution(0.0, Vector3::zeros(), Quality::Fix)];
        forward[0].covar = Sym3::from_diagonal(0.5, 0.5, 0.5);
        backward[0].covar = Sym3::from_diagonal(0.5, 0.5, 0.5);

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);

        assert_eq!(sink.solutions.len(), 1);
        assert_eq!(sink.solutions[0].quality, expected);
    }

    /// Demotion never applies in static mode.
    #[test]
    fn static_mode_never_demotes() {
        let mut cfg = Config::default();
        cfg.mode = Mode::Static;

        let forward = vec![solution(0.0, Vector3::new(100.0, 0.0, 0.0), Quality::Fix)];
        let backward = vec![solution(0.0, Vector3::zeros(), Quality::Fix)];

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);
        assert_eq!(sink.solutions[0].quality, Quality::Fix);
    }

    /// Static option: one representative, best priority, earliest time.
    #[test]
    fn static_representative() {
        let mut cfg = Config::default();
        cfg.mode = Mode::Static;
        cfg.sol_static = true;

        let forward = vec![
            solution(0.0, Vector3::new(1.0, 0.0, 0.0), Quality::Float),
            solution(30.0, Vector3::new(2.0, 0.0, 0.0), Quality::Fix),
            solution(60.0, Vector3::new(3.0, 0.0, 0.0), Quality::Fix),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &forward, &backward, &mut sink);

        assert_eq!(sink.solutions.len(), 1);
        assert_eq!(sink.solutions[0].quality, Quality::Fix);
        assert_eq!(sink.solutions[0].time, Epoch::from_gpst_seconds(30.0));
    }

    #[test]
    fn moving_baseline_smooths_relative_vector() {
        let mut cfg = Config::default();
        cfg.mode = Mode::MovingBaseline;

        let base_f = Vector3::new(100.0, 0.0, 0.0);
        let base_b = Vector3::new(104.0, 0.0, 0.0);
        let mut f = solution(0.0, base_f + Vector3::new(10.0, 0.0, 0.0), Quality::Float);
        f.base_pos_m = base_f;
        let mut b = solution(0.0, base_b + Vector3::new(10.0, 0.0, 0.0), Quality::Float);
        b.base_pos_m = base_b;

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &[f], &[b], &mut sink);

        // identical relative vectors fuse unchanged, re-anchored on
        // the forward base position
        assert_eq!(sink.solutions.len(), 1);
        assert!((sink.solutions[0].pos_m - (base_f + Vector3::new(10.0, 0.0, 0.0))).norm() < 1E-9);
    }

    #[test]
    fn midpoint_timestamp_within_tolerance() {
        let cfg = Config::default();
        // 4 ms apart: same epoch within the 5 ms tolerance
        let f = solution(10.000, Vector3::zeros(), Quality::Float);
        let b = solution(10.004, Vector3::zeros(), Quality::Float);

        let mut sink = Collector { solutions: vec![] };
        combine(&cfg, &[f], &[b], &mut sink);

        assert_eq!(sink.solutions.len(), 1);
        let expected = Epoch::from_gpst_seconds(10.002);
        assert!((sink.solutions[0].time - expected).abs() < 1.0 * Unit::Microsecond);
    }
}
