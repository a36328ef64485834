//! Container/isolation profile pass-through.
//!
//! Which isolation technology executes a task has no bearing on manifest
//! correctness. The profile is a single tagged value selected at process
//! start, read-only thereafter, and handed to the job runner untouched.

use serde::{Deserialize, Serialize};

/// Mutually exclusive choice of isolation technology and its run options.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug, Default)]
#[serde(tag = "engine", rename_all = "snake_case")]
pub enum ExecProfile {
    Docker {
        #[serde(default)]
        run_options: Vec<String>,
    },
    Singularity {
        #[serde(default)]
        run_options: Vec<String>,
    },
    Conda {
        env: String,
    },
    #[default]
    Local,
}

impl ExecProfile {
    pub fn engine(&self) -> &'static str {
        match self {
            ExecProfile::Docker { .. } => "docker",
            ExecProfile::Singularity { .. } => "singularity",
            ExecProfile::Conda { .. } => "conda",
            ExecProfile::Local => "local",
        }
    }
}
