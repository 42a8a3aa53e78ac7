//! Lyric video render engine.
//!
//! This crate provides:
//! - The in-memory job store and its state machine
//! - The render pipeline (probe, compose, encode, upload)
//! - A bounded job runner with panic capture and cancellation
//! - [`RenderService`], the submission and status facade
//! - Structured job logging and Prometheus metrics

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runner;
pub mod service;
pub mod store;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{ProgressReporter, RenderPipeline};
pub use runner::{JobRunner, RenderHandle, StoreReporter};
pub use service::RenderService;
pub use store::JobStore;
