//! Domain Layer
//!
//! - Entity capability traits (`Identity`, `Timestamps`, `Entity`)
//! - Equality filters
//! - The `DocumentStore` trait (interface to the database)

pub mod entity;
pub mod filter;
pub mod store;
