//! Senda - telemetry to route to guidance pipeline.
//!
//! Turns device telemetry batches into GeoJSON point collections, orders them into routes,
//! and answers nearest-waypoint guidance queries. Storage and the speech, translation and
//! routing services sit behind thin adapters used by the `server` and `senda` binaries.

pub mod config;
pub mod directions;
pub mod error;
pub mod guide;
pub mod models;
pub mod pipeline;
pub mod route;
pub mod speech;
pub mod store;
pub mod synth;
pub mod translate;

pub use error::PipelineError;
pub use guide::{guide, GuidanceEngine, GuidanceResult};
pub use models::{Feature, FeatureCollection, TelemetrySample, ZoneType};
pub use route::{build_route, RouteBuilder, TimestampPolicy};
pub use synth::synthesize;
