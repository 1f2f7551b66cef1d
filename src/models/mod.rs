//! Core data models for the telemetry pipeline.

pub mod feature;
pub mod telemetry;
pub mod zone;

pub use feature::{Feature, FeatureCollection, Geometry, Position, TypedGeometry};
pub use telemetry::{parse_timestamp, Location, SensorVector, TelemetrySample};
pub use zone::ZoneType;
