//! Life cycle states of a digital twin, carried as the body of `dt.lifecycle` events.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeCycleState {
    None,
    Created,
    Started,
    Bound,
    Unbound,
    Synchronized,
    NotSynchronized,
    Destroyed,
    Stopped,
    Error,
}

impl LifeCycleState {
    /// Wire value of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Created => "created",
            Self::Started => "started",
            Self::Bound => "bound",
            Self::Unbound => "unbound",
            Self::Synchronized => "synchronized",
            Self::NotSynchronized => "not_synchronized",
            Self::Destroyed => "destroyed",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
