//! Common satellite selection between rover and base
use log::debug;

use crate::{prelude::SV, sync::EpochGroup};

/// One satellite observed on both sides of the baseline at one epoch,
/// with its offsets into the rover and base slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatMatch {
    /// Common [SV]
    pub sv: SV,
    /// Offset in the rover slice
    pub rover: usize,
    /// Offset in the base slice
    pub base: usize,
}

/// Merge the rover and base slices of one epoch (each sorted by
/// satellite) into the list of satellites present on both sides, base
/// elevation at least `elmin_deg`. Linear two-pointer walk: one-sided
/// satellites are skipped without moving the other pointer.
///
/// Zero matches is the normal "no usable epoch" outcome, the caller
/// skips the epoch.
pub fn select_common(group: &EpochGroup, elmin_deg: f64) -> Vec<SatMatch> {
    let rover = group.rover();
    let base = group.base();
    let mut matches = Vec::with_capacity(rover.len().min(base.len()));

    let (mut i, mut j) = (0, 0);
    while i < rover.len() && j < base.len() {
        if rover[i].sv < base[j].sv {
            i += 1;
        } else if rover[i].sv > base[j].sv {
            j += 1;
        } else {
            if base[j].elevation_deg >= elmin_deg {
                matches.push(SatMatch {
                    sv: rover[i].sv,
                    rover: i,
                    base: j,
                });
            } else {
                debug!(
                    "{}({}) - below elevation mask ({:.1}°)",
                    rover[i].time, rover[i].sv, base[j].elevation_deg,
                );
            }
            i += 1;
            j += 1;
        }
    }
    matches
}
