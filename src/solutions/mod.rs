//! Epoch solutions
use crate::prelude::{Epoch, Vector3};

mod covar;
pub use covar::Sym3;

/// Solution quality ladder. Priority ranks solutions when merging
/// forward/backward passes and when retaining a static representative:
/// lower rank wins, inherited fixes rank with true fixes, demotion
/// (never promotion) happens during combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quality {
    /// No solution
    #[default]
    None,
    /// Single point (absolute) solution
    Single,
    /// Code differential solution
    Dgps,
    /// Float carrier ambiguities
    Float,
    /// Integer-fixed carrier ambiguities
    Fix,
    /// Partial ambiguity fix
    HalfFix,
    /// Fix inherited from a neighbouring epoch
    InheritFix,
    /// Dead reckoning only
    DeadReckoning,
}

impl Quality {
    /// Priority rank, lower is better.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Fix | Self::InheritFix => 1,
            Self::HalfFix => 2,
            Self::Float => 3,
            Self::Dgps => 4,
            Self::Single => 5,
            Self::DeadReckoning => 6,
            Self::None => 7,
        }
    }

    /// True for ambiguity-fixed solutions, the only grade the
    /// combination validator may demote.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fix)
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Single => write!(f, "SINGLE"),
            Self::Dgps => write!(f, "DGPS"),
            Self::Float => write!(f, "FLOAT"),
            Self::Fix => write!(f, "FIX"),
            Self::HalfFix => write!(f, "HALFFIX"),
            Self::InheritFix => write!(f, "INHERITFIX"),
            Self::DeadReckoning => write!(f, "DR"),
        }
    }
}

/// One epoch's resolved solution.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSolution {
    /// Resolution [Epoch]
    pub time: Epoch,
    /// Rover position, ECEF meters
    pub pos_m: Vector3<f64>,
    /// Position covariance
    pub covar: Sym3,
    /// [Quality] grade
    pub quality: Quality,
    /// Base station position at this epoch, ECEF meters
    pub base_pos_m: Vector3<f64>,
}

impl EpochSolution {
    /// True when self replaces `other` as the retained static
    /// representative: strictly better priority, or equal priority
    /// and earlier time.
    pub fn preferred_over(&self, other: &Self) -> bool {
        let (a, b) = (self.quality.priority(), other.quality.priority());
        a < b || (a == b && self.time < other.time)
    }
}

impl std::fmt::Display for EpochSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {:.4} {:.4} {:.4} {} sdx={:.4} sdy={:.4} sdz={:.4}",
            self.time,
            self.pos_m[0],
            self.pos_m[1],
            self.pos_m[2],
            self.quality,
            self.covar.var(0).max(0.0).sqrt(),
            self.covar.var(1).max(0.0).sqrt(),
            self.covar.var(2).max(0.0).sqrt(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::Quality;

    #[test]
    fn priority_ladder() {
        assert!(Quality::Fix.priority() < Quality::Float.priority());
        assert!(Quality::Float.priority() < Quality::Single.priority());
        assert_eq!(Quality::InheritFix.priority(), Quality::Fix.priority());
        assert!(Quality::None.priority() > Quality::DeadReckoning.priority());
        assert!(Quality::Fix.is_fixed());
        assert!(!Quality::InheritFix.is_fixed());
    }
}
