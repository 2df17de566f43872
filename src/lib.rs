// src/lib.rs
pub mod cli;
pub mod config;
pub mod coverage;
pub mod report;
pub mod tools;
pub mod types;
pub mod utils;

pub use types::*;
