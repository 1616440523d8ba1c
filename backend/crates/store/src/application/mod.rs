//! Application Layer
//!
//! The generic repository and connection configuration.

pub mod config;
pub mod generic_repository;
