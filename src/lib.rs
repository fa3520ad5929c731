#![forbid(unsafe_code)]
//! opcore: the execution core behind `plan`, `apply`, `destroy` and `refresh`.
//!
//! Operational model:
//! - A command resolves its backend from a saved plan, the root module or a
//!   synthetic local default, then builds an immutable [`operation::Operation`].
//! - The backend runs the operation on a worker thread while holding the state
//!   lock; the lock is released on every exit path, including interrupts.
//! - State, plan and dependency-lock files are replaced atomically.
//! - Every stage emits a structured fact through [`logging::FactsEmitter`].

pub mod api;
pub mod backend;
pub mod config;
pub mod console;
pub mod constants;
pub mod depsfile;
pub mod encryption;
pub mod engine;
pub mod fs;
pub mod hcl;
pub mod interrupt;
pub mod logging;
pub mod operation;
pub mod planfile;
pub mod statelock;
pub mod statemgr;
pub mod types;
pub mod views;

pub use api::*;
