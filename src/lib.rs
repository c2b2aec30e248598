//! src/lib.rs
//!
//! A per-user phone book served over HTTP: sign-up with email
//! confirmation, JWT authentication, and contact management.
// make public to other binaries (main, test)
pub mod authentication;
pub mod cloudinary;
pub mod configuration;
pub mod domain;
pub mod email_client;
pub mod rate_limit;
pub mod repository;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod utils;
