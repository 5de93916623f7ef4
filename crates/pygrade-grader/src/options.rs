//! Grader configuration.

use pygrade_eval::Limits;
use serde::{Deserialize, Serialize};

/// Knobs a harness may set, typically loaded from JSON. Missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeOptions {
    /// Interpreter steps allowed per environment build.
    pub gas_limit: u64,
    pub max_call_depth: u32,
    /// Prefix for feedback on a correct result.
    pub praise: String,
    /// Prefix for feedback on an incorrect result.
    pub encourage: String,
}

impl Default for GradeOptions {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            gas_limit: limits.gas_limit,
            max_call_depth: limits.max_call_depth,
            praise: "Great work!".to_string(),
            encourage: "Please try again.".to_string(),
        }
    }
}

impl GradeOptions {
    pub fn limits(&self) -> Limits {
        Limits {
            gas_limit: self.gas_limit,
            max_call_depth: self.max_call_depth,
        }
    }

    /// Parse options from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
