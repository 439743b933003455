use serde::{Deserialize, Serialize};

/// Graph lifecycle: assemble, then run, then close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GraphState {
    #[default]
    Assembling,
    Running,
    Stopped,
    Closed,
}

impl GraphState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &GraphState) -> bool {
        use GraphState::*;

        matches!(
            (self, target),
            // From Assembling
            (Assembling, Running) |
            (Assembling, Closed) |

            // From Running
            (Running, Stopped) |
            (Running, Closed) |

            // From Stopped
            (Stopped, Closed)
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Assembling => "assembling",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        }
    }
}
