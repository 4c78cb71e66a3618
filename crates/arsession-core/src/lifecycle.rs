use crate::SessionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Uninitialized,
    EngineInitializing,
    DatasetLoading,
    Running,
    Paused,
    Stopped,
    Failed,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Uninitialized => write!(f, "uninitialized"),
            LifecyclePhase::EngineInitializing => write!(f, "engine-initializing"),
            LifecyclePhase::DatasetLoading => write!(f, "dataset-loading"),
            LifecyclePhase::Running => write!(f, "running"),
            LifecyclePhase::Paused => write!(f, "paused"),
            LifecyclePhase::Stopped => write!(f, "stopped"),
            LifecyclePhase::Failed => write!(f, "failed"),
        }
    }
}

pub fn validate_transition(from: LifecyclePhase, to: LifecyclePhase) -> Result<(), SessionError> {
    use LifecyclePhase::{
        DatasetLoading, EngineInitializing, Failed, Paused, Running, Stopped, Uninitialized,
    };

    let valid = matches!(
        (from, to),
        (Uninitialized | Stopped, EngineInitializing)
            | (EngineInitializing, DatasetLoading)
            | (DatasetLoading | Paused | Stopped | Running, Running)
            | (Running, Paused)
            | (
                Uninitialized | EngineInitializing | DatasetLoading | Running | Paused | Failed,
                Stopped
            )
            | (EngineInitializing | DatasetLoading | Running | Paused, Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
