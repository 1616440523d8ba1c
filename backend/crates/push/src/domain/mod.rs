//! Domain Layer
//!
//! Requests, reports and the provider/credential seams.

pub mod credential;
pub mod message;
pub mod notification;
pub mod provider;
pub mod response;
