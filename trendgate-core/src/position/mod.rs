//! Position lifecycle.

pub mod manager;

pub use manager::{PositionManager, PositionState, StateTransition, TransitionCause};
