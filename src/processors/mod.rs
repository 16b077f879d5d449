//! Geometry processing shared by the pipeline stages.

pub mod geometry;

pub use geometry::{AxisBox, Point, Polygon, RawPoint, RawPolygon, normalize_polygon};
