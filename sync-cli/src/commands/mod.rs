//! CLI command implementations.

pub mod normalize;
pub mod run;
pub mod status;
