//! Seeded shuffling and sampling for dataset preparation
//!
//! All randomness flows from an explicit [`Seed`]; nothing reads global RNG
//! state, so a run is reproducible whenever the caller fixes the seed.

#![warn(missing_docs)]

pub mod sampler;
pub mod seed;

pub use sampler::{permutation, sample_with_replacement, sample_without_replacement};
pub use seed::Seed;
