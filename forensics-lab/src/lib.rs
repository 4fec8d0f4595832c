//! forensics-lab library crate
//!
//! Exposes the backend client, job tracking and orchestration for the binary
//! and for integration tests.

pub mod audit;
pub mod auth;
pub mod config;
pub mod jobs;
pub mod lab;
pub mod storage;
pub mod tools;
