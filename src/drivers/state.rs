use serde::{Deserialize, Serialize};
use std::fmt;

/// 机器远端资源的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Nonexistent,
    Running,
    Stopped,
    Error,
    Timeout,
}

impl State {
    pub fn is_running(&self) -> bool {
        matches!(self, State::Running)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Nonexistent => "Nonexistent",
            State::Running => "Running",
            State::Stopped => "Stopped",
            State::Error => "Error",
            State::Timeout => "Timeout",
        };
        f.pad(s)
    }
}
