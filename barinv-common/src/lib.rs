//! # Barinv Common Library
//!
//! Shared code for the stock-take client:
//! - Error taxonomy
//! - Session and inventory data model
//! - EAN shape validation
//! - Password hashing
//! - Configuration loading
//! - Durable session/ledger storage

pub mod auth;
pub mod config;
pub mod ean;
pub mod error;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
