//! Infrastructure Layer
//!
//! FCM HTTP v1 client and Google service-account credentials.

pub mod fcm;
pub mod google_auth;
