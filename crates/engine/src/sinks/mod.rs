//! Destinations a transaction batch can be published to.
pub mod influx;
pub mod relational;
pub mod time_series;

pub use influx::InfluxStore;
pub use relational::RelationalSink;
pub use time_series::{PointStore, publish_points};
