//! services/api/src/lib.rs
//!
//! The library crate for the API service. The binaries and the
//! integration tests build on top of these modules.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
