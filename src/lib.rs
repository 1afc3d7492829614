// lib.rs
pub mod cactus;
pub mod chain_walk;
pub mod commands;
pub mod coverage;
pub mod error;
pub mod melting;
pub mod metadata;
pub mod model;
pub mod pinch;
pub mod pipeline;
pub mod recoverable;

pub use error::CafError;
