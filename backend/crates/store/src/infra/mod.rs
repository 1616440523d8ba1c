//! Infrastructure Layer - `DocumentStore` implementations

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod mongodb;
