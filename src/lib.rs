//! Badge composition and export backend.
//!
//! Library surface for the `badgegen-backend` binary and the integration
//! tests: the photo normalization/storage pipeline, the parametrized badge
//! layout, and the rasterizing exporter.

pub mod api;
pub mod badge;
pub mod openapi;
pub mod perf;
pub mod state;
pub mod util;
