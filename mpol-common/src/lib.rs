//! # Music Police Common Library
//!
//! Shared code for the Music Police dashboard crates:
//! - Backend wire types (analyses, tasks, stats, rules, settings)
//! - Event types and the broadcast EventBus
//! - Bootstrap configuration loading
//! - Human-readable time and size formatting

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
