//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the API (sync, stats,
//! team settings) and exposes typed Rocket handlers annotated with
//! `#[openapi]` so `rocket_okapi` can derive an OpenAPI document
//! automatically. The SSE progress stream is the one exception: it is
//! mounted as a plain route.

pub mod health;
pub(crate) mod helpers;
pub mod settings;
pub mod stats;
pub mod sync;
