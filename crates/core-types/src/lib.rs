//! Shared primitives for the ApplyFlow form-filling engine.
//!
//! Everything that crosses a crate boundary lives here: closed enums for
//! control and page kinds, the action/result envelopes exchanged between the
//! field mapper and the executor, and URL-based platform detection.

use std::fmt;

use uuid::Uuid;

mod action;
mod analysis;
mod control;
mod element;
mod platform;

pub use action::{Action, ErrorKind, ExecutionResult};
pub use analysis::{CtaCandidate, PageAnalysis, PageKind, RecommendedAction, RecommendedKind};
pub use control::ControlKind;
pub use element::{ElementRecord, LogicalGroup, SelectOption};
pub use platform::Platform;

/// Maximum number of elements a logical group may carry before it is split.
pub const MAX_GROUP_SIZE: usize = 50;

#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
