//! HTTP server module.
//!
//! This module exposes the generation router over HTTP for callers that
//! cannot link the library directly.

mod app;
mod handlers;

pub use app::{create_router, run_server, AppState};
pub use handlers::{
    GenerateBody, FALLBACKS_HEADER, LATENCY_MS_HEADER, MODEL_HEADER, PROVIDER_HEADER,
    REQUEST_ID_HEADER,
};
