//! Boundary to the remote transcription and labeling server.

mod backend;
mod client;
mod wire;

pub use backend::{AnnotationBackend, IdentifyOptions, UploadPayload};
pub use client::{RemoteSyncClient, RemoteSyncConfig};
