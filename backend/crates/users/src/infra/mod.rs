//! Infrastructure Layer
//!
//! PostgreSQL and document-store repositories.

pub mod document;
pub mod postgres;
