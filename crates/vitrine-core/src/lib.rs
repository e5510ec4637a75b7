//! Vitrine Core - shared abstractions for the studio data access layer
//!
//! This crate provides the types every other vitrine crate depends on:
//!
//! - `Connection` - trait implemented by database connections
//! - `Value`, `Row`, `RowSet` - query parameters and results
//! - `VitrineError` - the error taxonomy

mod connection;
mod error;
mod types;

pub use connection::*;
pub use error::*;
pub use types::*;
