//! Interaction mode state machine
//!
//! The process is always in exactly one mode. Observe watches regions for
//! clicks; Act draws temporary boxes over target windows. The transition
//! table lives here, the side effects live in the coordinator.

use serde::{Deserialize, Serialize};

/// Process-wide interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Region click monitoring (initial)
    #[default]
    Observe,
    /// Temporary annotations over target windows
    Act,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Observe => write!(f, "observe"),
            Mode::Act => write!(f, "act"),
        }
    }
}

/// Side effects a transition requires, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same mode requested; nothing to do
    Stay,
    /// Observe -> Act: stop the monitor, clear regions and their boxes
    EnterAct,
    /// Act -> Observe: clear all annotations, start the monitor
    EnterObserve,
}

/// State machine for mode transitions
pub struct StateMachine;

impl StateMachine {
    /// Transition needed to go from `current` to `target`
    pub fn transition(current: Mode, target: Mode) -> Transition {
        match (current, target) {
            (Mode::Observe, Mode::Act) => Transition::EnterAct,
            (Mode::Act, Mode::Observe) => Transition::EnterObserve,
            _ => Transition::Stay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_mode_is_observe() {
        assert_eq!(Mode::default(), Mode::Observe);
    }

    #[test]
    fn transition_table() {
        assert_eq!(StateMachine::transition(Mode::Observe, Mode::Act), Transition::EnterAct);
        assert_eq!(StateMachine::transition(Mode::Act, Mode::Observe), Transition::EnterObserve);
        assert_eq!(StateMachine::transition(Mode::Act, Mode::Act), Transition::Stay);
        assert_eq!(StateMachine::transition(Mode::Observe, Mode::Observe), Transition::Stay);
    }

    #[test]
    fn mode_wire_names() {
        assert_eq!(serde_json::to_string(&Mode::Act).unwrap(), "\"act\"");
        assert_eq!(serde_json::from_str::<Mode>("\"observe\"").unwrap(), Mode::Observe);
        assert!(serde_json::from_str::<Mode>("\"Act\"").is_err());
        assert_eq!(Mode::Act.to_string(), "act");
    }
}
