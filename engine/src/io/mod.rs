//! Side-effecting collaborators: transport clients, the record fixture,
//! configuration and process helpers.
//!
//! Every client sits behind a trait so runners can be exercised against the
//! in-memory backend in `test_support`.

pub mod batch;
pub mod config;
pub mod fixture;
pub mod mail;
pub mod poll;
pub mod process;
pub mod session;
pub mod stream;
pub mod web_api;
