//! Shared Kernel - vocabulary every crate agrees on
//!
//! This crate holds the pieces of the CRM backend that have one meaning
//! across all modules:
//! - The unified error type, its HTTP classification and result alias
//! - The opaque entity identifier
//! - The `{code, message, data}` response envelope

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
pub mod response;
