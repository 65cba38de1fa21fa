//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod prompts;
pub mod sanitize;
pub mod types;
pub mod variant;
