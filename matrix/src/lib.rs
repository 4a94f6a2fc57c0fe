//! Command-line front end for conformance suites.
//!
//! A suite file lists scenarios; `matrix run` executes them against the
//! system described by an engine config and reports pass, fail and error
//! counts per transport.

pub mod cli;
pub mod exit_codes;
pub mod report;
pub mod run;
pub mod suite;
