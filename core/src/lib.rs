//! Customer segmentation core.
//!
//! transaction history → features → clustering → recorded run →
//! ranked segment strategies. `pipeline::Pipeline` is the entry point.

pub mod artifact;
pub mod clock;
pub mod clustering;
pub mod config;
pub mod demo_data;
pub mod error;
pub mod features;
pub mod name_generator;
pub mod pipeline;
pub mod recorder;
pub mod rng;
pub mod segment;
pub mod snapshot;
pub mod store;
pub mod strategy;
pub mod types;
