//! Command Line Interface (CLI) layer for EOSTACK.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for single-product and batch
//! stacking flows. It wires user-provided options to the underlying
//! library functionality exposed via `eostack::Product`.
//!
//! If you are embedding EOSTACK into another application, prefer the
//! library API instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
