//! Common types for kvattr
//!
//! This crate provides the error taxonomy shared by the pool and engine crates.

pub mod error;

pub use error::{KvAttrError, Result};
