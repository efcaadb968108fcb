//! Packed symmetric position covariance
use crate::prelude::Matrix3;

/// Symmetric 3x3 covariance, packed as the six independent terms
/// (xx, yy, zz, xy, yz, zx). `at(i, j) == at(j, i)` holds by
/// construction, there is no way to store an asymmetric matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sym3 {
    q: [f64; 6],
}

impl Sym3 {
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Define a new [Sym3] from the packed terms (xx, yy, zz, xy, yz, zx).
    pub fn new(xx: f64, yy: f64, zz: f64, xy: f64, yz: f64, zx: f64) -> Self {
        Self {
            q: [xx, yy, zz, xy, yz, zx],
        }
    }

    /// Diagonal covariance from the three per-axis variances.
    pub fn from_diagonal(xx: f64, yy: f64, zz: f64) -> Self {
        Self::new(xx, yy, zz, 0.0, 0.0, 0.0)
    }

    /// Symmetrized copy of an arbitrary [Matrix3]: off-diagonal pairs
    /// are averaged, which is exact for matrices already symmetric.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self::new(
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            0.5 * (m[(0, 1)] + m[(1, 0)]),
            0.5 * (m[(1, 2)] + m[(2, 1)]),
            0.5 * (m[(0, 2)] + m[(2, 0)]),
        )
    }

    /// Term (i, j), panics outside the 3x3 range.
    pub fn at(&self, i: usize, j: usize) -> f64 {
        match (i, j) {
            (0, 0) => self.q[0],
            (1, 1) => self.q[1],
            (2, 2) => self.q[2],
            (0, 1) | (1, 0) => self.q[3],
            (1, 2) | (2, 1) => self.q[4],
            (0, 2) | (2, 0) => self.q[5],
            _ => panic!("Sym3: index ({}, {}) out of range", i, j),
        }
    }

    /// Per-axis variance (diagonal term).
    pub fn var(&self, axis: usize) -> f64 {
        self.at(axis, axis)
    }

    /// Variance sum.
    pub fn trace(&self) -> f64 {
        self.q[0] + self.q[1] + self.q[2]
    }

    /// Expand to a full [Matrix3].
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.q[0], self.q[3], self.q[5], //
            self.q[3], self.q[1], self.q[4], //
            self.q[5], self.q[4], self.q[2],
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn symmetric_by_construction() {
        let q = Sym3::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(q.at(i, j), q.at(j, i));
            }
        }
        assert_eq!(q.trace(), 6.0);

        let m = q.to_matrix();
        assert_eq!(Sym3::from_matrix(&m), q);
    }
}
