// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Lifecycles in the collector are modelled as pure Mealy machines: the
//! transition decides the next state and an output describing the side
//! effect to perform, and the caller performs it.
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! Keeping transitions pure means the whole lifecycle table can be tested
//! without a probe, a repository or a clock.
//!
//! # Example
//!
//! ```rust
//! use cim_inventory::state_machine::StateMachine;
//! use cim_inventory::session::{SessionEffect, SessionInput, SessionState};
//!
//! let (next, effect) = SessionState::Active
//!     .transition(&SessionInput::ConnectivityLost)
//!     .unwrap();
//! assert_eq!(next, SessionState::Disconnected);
//! assert_eq!(effect, SessionEffect::MarkHostsDisconnected);
//!
//! assert!(!SessionState::Removed.can_transition(&SessionInput::Reconnected));
//! ```

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Input is not accepted in the current state
    #[error("Invalid transition from {from} on {input}")]
    InvalidTransition { from: String, input: String },

    /// Current state accepts no input at all
    #[error("State {0} is terminal")]
    Terminal(String),
}

/// Trait for finite state machines
///
/// Implement this trait to define a state machine with typed states,
/// inputs, and outputs.
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    ///
    /// # Returns
    /// - Ok((new_state, output)) if transition is valid
    /// - Err(TransitionError) if transition is invalid
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Get all valid inputs from current state (if enumerable)
    fn valid_inputs(&self) -> Vec<Self::Input>
    where
        Self::Input: Clone,
    {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Switch {
        Off,
        On,
        Broken,
    }

    #[derive(Debug, Clone)]
    enum SwitchInput {
        Press,
    }

    impl StateMachine for Switch {
        type Input = SwitchInput;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
            match (self, input) {
                (Switch::Off, SwitchInput::Press) => Ok((Switch::On, ())),
                (Switch::On, SwitchInput::Press) => Ok((Switch::Off, ())),
                (Switch::Broken, _) => Err(TransitionError::Terminal("Broken".to_string())),
            }
        }
    }

    #[test]
    fn test_simple_transition() {
        let (new_state, _) = Switch::Off.transition(&SwitchInput::Press).unwrap();
        assert_eq!(new_state, Switch::On);
    }

    #[test]
    fn test_can_transition() {
        assert!(Switch::Off.can_transition(&SwitchInput::Press));
        assert!(!Switch::Broken.can_transition(&SwitchInput::Press));
    }

    #[test]
    fn test_default_valid_inputs_is_empty() {
        assert!(Switch::On.valid_inputs().is_empty());
    }
}
