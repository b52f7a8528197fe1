//! Deterministic action execution.
//!
//! The mapper decides *what* goes into each control; this crate makes the
//! browser actually do it, one control kind at a time, and reads the value
//! back to prove it happened. `execute` never throws across its boundary -
//! every failure lands in the `ExecutionResult` envelope.

mod executor;
mod matching;
mod primitives;

pub use executor::{ActionExecutor, ExecutorConfig};
pub use matching::{
    match_option, radio_equivalent, similarity, MatchOutcome, MatchRule, LAST_RESORT_CONFIDENCE,
};
