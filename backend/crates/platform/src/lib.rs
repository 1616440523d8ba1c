//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Typed environment configuration with defaults
//! - Cryptographic utilities (Base64, AES-GCM secrets)
//! - Circuit breaker policy and runtime

pub mod breaker;
pub mod config;
pub mod crypto;
