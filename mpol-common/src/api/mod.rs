//! Backend API wire types
//!
//! Request and response bodies exchanged with the analysis backend over JSON.

pub mod types;

pub use types::*;
