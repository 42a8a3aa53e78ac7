//! Upload collaborator for rendered lyric videos.
//!
//! This crate provides:
//! - The [`Uploader`] trait the render pipeline calls after a successful encode
//! - [`NoopUploader`] for local-only deployments
//! - [`R2Client`], an S3-compatible uploader for Cloudflare R2

pub mod client;
pub mod error;
pub mod uploader;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use uploader::{render_key, NoopUploader, Uploader};
