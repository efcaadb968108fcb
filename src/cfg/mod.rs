//! Session configuration
use hifitime::{Duration, Unit};

use crate::prelude::SV;

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Positioning mode
#[derive(Default, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub enum Mode {
    /// Receiver antenna held static for the whole session.
    Static,
    /// Roaming receiver, static base station.
    #[default]
    Kinematic,
    /// Both receivers roam: the relative (rover minus base)
    /// vector is the estimated quantity.
    MovingBaseline,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Static => write!(fmt, "static"),
            Self::Kinematic => write!(fmt, "kinematic"),
            Self::MovingBaseline => write!(fmt, "moving-baseline"),
        }
    }
}

/// Solution (traversal) type
#[derive(Default, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub enum SolutionType {
    /// Single forward pass, solutions streamed as they resolve.
    #[default]
    Forward,
    /// Single backward pass, solutions streamed as they resolve.
    Backward,
    /// Forward and backward passes buffered then combined
    /// with the fixed-interval smoother. Post-processing only.
    Combined,
}

impl std::fmt::Display for SolutionType {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Forward => write!(fmt, "forward"),
            Self::Backward => write!(fmt, "backward"),
            Self::Combined => write!(fmt, "combined"),
        }
    }
}

fn default_elev_mask_deg() -> f64 {
    15.0
}

fn default_dt_tol() -> Duration {
    5.0 * Unit::Millisecond
}

fn default_num_particles() -> usize {
    300
}

fn default_refinement_iters() -> usize {
    3
}

fn default_pos_proposal_std_m() -> f64 {
    0.3
}

fn default_amb_bounds_cycles() -> (f64, f64) {
    (-0.5, 0.5)
}

fn default_code_noise_m() -> f64 {
    1.0
}

fn default_phase_noise_m() -> f64 {
    0.01
}

fn default_base_pos() -> (f64, f64, f64) {
    (0.0, 0.0, 0.0)
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct Config {
    /// Positioning [Mode]
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: Mode,

    /// [SolutionType]: traversal direction(s) over the observation log.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sol_type: SolutionType,

    /// Minimal SV elevation (in degrees) on the base side
    /// for a satellite to contribute to double differences.
    #[cfg_attr(feature = "serde", serde(default = "default_elev_mask_deg"))]
    pub min_sv_elev_deg: f64,

    /// Two observations closer than this tolerance belong
    /// to the same epoch.
    #[cfg_attr(feature = "serde", serde(default = "default_dt_tol"))]
    pub dt_tol: Duration,

    /// When true, epoch matching selects the base record run that
    /// straddles the rover time (interpolation downstream). When false,
    /// the most recent base run not newer than the rover time is used.
    /// Selecting the wrong policy degrades accuracy silently.
    #[cfg_attr(feature = "serde", serde(default))]
    pub base_interpolation: bool,

    /// Static sessions only: emit a single representative solution
    /// instead of one per epoch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sol_static: bool,

    /// Model receiver velocity in the state vector.
    #[cfg_attr(feature = "serde", serde(default))]
    pub dynamics: bool,

    /// Base station position, ECEF meters. Ignored in moving-baseline
    /// mode where the per-epoch base position applies.
    #[cfg_attr(feature = "serde", serde(default = "default_base_pos"))]
    pub base_pos_ecef_m: (f64, f64, f64),

    /// Particle set size.
    #[cfg_attr(feature = "serde", serde(default = "default_num_particles"))]
    pub num_particles: usize,

    /// Per-epoch annealed refinement iterations of the particle filter.
    #[cfg_attr(feature = "serde", serde(default = "default_refinement_iters"))]
    pub refinement_iters: usize,

    /// Rover position proposal standard deviation (m), per axis,
    /// at the first iteration of each epoch.
    #[cfg_attr(feature = "serde", serde(default = "default_pos_proposal_std_m"))]
    pub pos_proposal_std_m: f64,

    /// Ambiguity search bounds (cycles) at the first iteration
    /// of each epoch.
    #[cfg_attr(feature = "serde", serde(default = "default_amb_bounds_cycles"))]
    pub amb_bounds_cycles: (f64, f64),

    /// Double-differenced pseudo range noise (m, 1 sigma).
    #[cfg_attr(feature = "serde", serde(default = "default_code_noise_m"))]
    pub code_noise_m: f64,

    /// Double-differenced carrier phase noise (m, 1 sigma).
    #[cfg_attr(feature = "serde", serde(default = "default_phase_noise_m"))]
    pub phase_noise_m: f64,

    /// Satellites excluded from processing.
    #[cfg_attr(feature = "serde", serde(default))]
    pub excluded: Vec<SV>,

    /// Fixed PRNG seed for reproducible particle runs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub prng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            sol_type: SolutionType::default(),
            min_sv_elev_deg: default_elev_mask_deg(),
            dt_tol: default_dt_tol(),
            base_interpolation: false,
            sol_static: false,
            dynamics: false,
            base_pos_ecef_m: default_base_pos(),
            num_particles: default_num_particles(),
            refinement_iters: default_refinement_iters(),
            pos_proposal_std_m: default_pos_proposal_std_m(),
            amb_bounds_cycles: default_amb_bounds_cycles(),
            code_noise_m: default_code_noise_m(),
            phase_noise_m: default_phase_noise_m(),
            excluded: Vec::new(),
            prng_seed: None,
        }
    }
}

impl Config {
    /// Returns [Config] with updated [Mode]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns [Config] with updated [SolutionType]
    pub fn with_sol_type(mut self, sol_type: SolutionType) -> Self {
        self.sol_type = sol_type;
        self
    }

    /// Returns [Config] with updated base station position (ECEF m)
    pub fn with_base_position_ecef_m(mut self, pos: (f64, f64, f64)) -> Self {
        self.base_pos_ecef_m = pos;
        self
    }

    /// True if the static representative-solution path applies.
    pub(crate) fn sol_static(&self) -> bool {
        self.sol_static && self.mode == Mode::Static
    }
}
