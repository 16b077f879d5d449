//! Geometric utilities for answer-sheet analysis.
//!
//! This module provides the canonical point and polygon types that every
//! downstream stage works with, the axis-aligned box used for containment
//! tests, and [`normalize_polygon`], which turns the polygon shapes emitted by
//! document analysis services into a [`Polygon`].

use itertools::Itertools;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    /// X-coordinate of the point.
    pub x: f32,
    /// Y-coordinate of the point.
    pub y: f32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// An ordered sequence of points outlining a recognized element.
///
/// An empty polygon means the geometry is unknown; every geometric query on it
/// answers "no match possible" instead of failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Polygon {
    /// The points that define the polygon.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Creates a new polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates an empty polygon (unknown geometry).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a rectangle from its top-left and bottom-right corners.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    pub fn from_coords(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let points = vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ];
        Self { points }
    }

    /// Returns true when the geometry is unknown.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean of all points, or `None` for an empty polygon.
    pub fn centroid(&self) -> Option<Point> {
        if self.points.is_empty() {
            return None;
        }
        let sum_x: f32 = self.points.iter().map(|p| p.x).sum();
        let sum_y: f32 = self.points.iter().map(|p| p.y).sum();
        let count = self.points.len() as f32;
        let centroid = Point::new(sum_x / count, sum_y / count);
        centroid.is_finite().then_some(centroid)
    }

    /// Axis-aligned bounds of the polygon, or `None` for an empty polygon.
    pub fn bounds(&self) -> Option<AxisBox> {
        let (x_min, x_max) = self
            .points
            .iter()
            .map(|p| p.x)
            .minmax_by(f32::total_cmp)
            .into_option()?;
        let (y_min, y_max) = self
            .points
            .iter()
            .map(|p| p.y)
            .minmax_by(f32::total_cmp)
            .into_option()?;
        Some(AxisBox {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Polygon holding the points of both polygons, `self` first.
    pub fn concat(&self, other: &Polygon) -> Polygon {
        let mut points = Vec::with_capacity(self.points.len() + other.points.len());
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);
        Polygon::new(points)
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AxisBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl AxisBox {
    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Grows the box on every side by `ratio` of its width and height.
    pub fn expand(&self, ratio: f32) -> AxisBox {
        let margin_x = self.width() * ratio;
        let margin_y = self.height() * ratio;
        AxisBox {
            x_min: self.x_min - margin_x,
            y_min: self.y_min - margin_y,
            x_max: self.x_max + margin_x,
            y_max: self.y_max + margin_y,
        }
    }

    /// Inclusive containment test.
    pub fn contains(&self, point: &Point) -> bool {
        self.x_min <= point.x
            && point.x <= self.x_max
            && self.y_min <= point.y
            && point.y <= self.y_max
    }
}

/// A point object as emitted by SDK-style results: `{"x": .., "y": ..}`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

// Only JSON objects are points; a derived impl would also accept `[x, y]`
// and let mixed-shape arrays through.
impl<'de> Deserialize<'de> for RawPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct PointObject {
            x: f64,
            y: f64,
        }

        let value = serde_json::Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("point must be an object with x and y"));
        }
        let PointObject { x, y } = serde_json::from_value(value).map_err(D::Error::custom)?;
        Ok(RawPoint { x, y })
    }
}

/// Polygon data as it arrives from the document analysis service.
///
/// Three shapes are understood; anything else, including arrays that mix
/// shapes, is kept as [`RawPolygon::Unrecognized`] and normalizes to an empty
/// polygon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawPolygon {
    /// `[{"x": 1, "y": 2}, ...]`
    Points(Vec<RawPoint>),
    /// `[[1, 2], ...]`
    Pairs(Vec<[f64; 2]>),
    /// `[1, 2, 3, 4, ...]`
    Flat(Vec<f64>),
    /// Any other JSON value.
    Unrecognized(serde_json::Value),
}

/// Canonicalizes raw polygon data into a [`Polygon`].
///
/// Never fails: `None`, empty input, odd-length flat lists, non-finite
/// coordinates and unrecognized shapes all yield an empty polygon.
pub fn normalize_polygon(raw: Option<&RawPolygon>) -> Polygon {
    let Some(raw) = raw else {
        return Polygon::empty();
    };

    let points: Vec<Point> = match raw {
        RawPolygon::Points(points) => points
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect(),
        RawPolygon::Pairs(pairs) => pairs
            .iter()
            .map(|[x, y]| Point::new(*x as f32, *y as f32))
            .collect(),
        RawPolygon::Flat(values) => {
            if values.len() % 2 != 0 {
                return Polygon::empty();
            }
            values
                .iter()
                .tuples()
                .map(|(x, y)| Point::new(*x as f32, *y as f32))
                .collect()
        }
        RawPolygon::Unrecognized(_) => return Polygon::empty(),
    };

    if points.iter().all(Point::is_finite) {
        Polygon::new(points)
    } else {
        Polygon::empty()
    }
}
