//! Ask a language model how to do something on Linux, pull the shell command
//! out of its answer and optionally copy or run it.

pub mod clipboard;
pub mod config;
pub mod context;
pub mod error_handling;
pub mod execution;
pub mod extraction;
pub mod history;
pub mod logging;
pub mod os_context;
pub mod providers;
pub mod spinner;
