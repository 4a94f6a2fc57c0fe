//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod budget;
pub mod builder;
pub mod content;
pub mod dimension;
pub mod record;
pub mod response;
pub mod scenario;
pub mod verdict;
