//! Fixed-interval smoother
use crate::prelude::{Sym3, Vector3};

/// Combine two independent estimates of the same 3-vector (forward
/// filtered, backward filtered) by inverse-variance fusion:
///
/// Qs = (Qf⁻¹ + Qb⁻¹)⁻¹, xs = Qs (Qf⁻¹ xf + Qb⁻¹ xb)
///
/// Returns None when either covariance is singular: the caller skips
/// the epoch rather than failing the whole combination.
pub fn smooth(
    xf: &Vector3<f64>,
    qf: &Sym3,
    xb: &Vector3<f64>,
    qb: &Sym3,
) -> Option<(Vector3<f64>, Sym3)> {
    let inv_f = qf.to_matrix().try_inverse()?;
    let inv_b = qb.to_matrix().try_inverse()?;

    let qs = (inv_f + inv_b).try_inverse()?;
    let xs = qs * (inv_f * xf + inv_b * xb);

    Some((xs, Sym3::from_matrix(&qs)))
}
