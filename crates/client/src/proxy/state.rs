//! Worker lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle of an offline cache proxy.
///
/// `Uninstalled → Installing → Installed → Activating → Active`. A failed
/// install falls back to the state it started from. A re-install started
/// from `Active` returns to `Active`, so an installed proxy never controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Active,
}

impl WorkerState {
    /// Whether an install event may start from this state.
    pub fn can_install(&self) -> bool {
        matches!(self, WorkerState::Uninstalled | WorkerState::Installed | WorkerState::Active)
    }

    /// Whether an activate event may start from this state.
    pub fn can_activate(&self) -> bool {
        matches!(self, WorkerState::Installed | WorkerState::Active)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Uninstalled => write!(f, "uninstalled"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Active => write!(f, "active"),
        }
    }
}

/// Mutable lifecycle bookkeeping guarded by the proxy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lifecycle {
    pub state: WorkerState,
    /// Set by the first completed activation and never cleared; a
    /// re-install keeps serving from the cache meanwhile.
    pub controlling: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self { state: WorkerState::Uninstalled, controlling: false }
    }
}
