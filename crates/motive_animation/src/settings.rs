use serde::{Deserialize, Serialize};

/// Tuning for the chain solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Upper bound on reach passes per solve.
    pub max_iterations: u32,
    /// Distance from the effector goal at which the chain counts as solved.
    pub convergence_epsilon: f32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence_epsilon: 1e-4,
        }
    }
}

/// Per-instance motion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    pub solver: SolverSettings,
    /// Whether constraints are solved at all.
    pub constraints_enabled: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            solver: SolverSettings::default(),
            constraints_enabled: true,
        }
    }
}
