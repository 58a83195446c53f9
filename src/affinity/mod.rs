// src/affinity/mod.rs
mod options;
mod provider;

pub use options::{AffinityOption, ParseAffinityOptionError};
pub use provider::{AffinityOutcome, AffinityProvider, Binding, Resolution};
