//! Spatial values: points, linestrings, polygons, their multi-variants and
//! geometry collections, each tagged with an SRID.

use crate::types::data_type::SpatialClass;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geometry value. Coordinates are (x, y) pairs; the SRID travels with the
/// value and is validated against the destination column on writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub srid: u32,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point(f64, f64),
    LineString(Vec<(f64, f64)>),
    Polygon(Vec<Vec<(f64, f64)>>),
    MultiPoint(Vec<(f64, f64)>),
    MultiLineString(Vec<Vec<(f64, f64)>>),
    MultiPolygon(Vec<Vec<Vec<(f64, f64)>>>),
    Collection(Vec<Geometry>),
}

impl Geometry {
    pub fn point(srid: u32, x: f64, y: f64) -> Geometry {
        Geometry { srid, shape: Shape::Point(x, y) }
    }

    pub fn class(&self) -> SpatialClass {
        match &self.shape {
            Shape::Point(..) => SpatialClass::Point,
            Shape::LineString(_) => SpatialClass::LineString,
            Shape::Polygon(_) => SpatialClass::Polygon,
            Shape::MultiPoint(_) => SpatialClass::MultiPoint,
            Shape::MultiLineString(_) => SpatialClass::MultiLineString,
            Shape::MultiPolygon(_) => SpatialClass::MultiPolygon,
            Shape::Collection(_) => SpatialClass::GeometryCollection,
        }
    }

    /// Point accessors; None for other shapes.
    pub fn x(&self) -> Option<f64> {
        match self.shape {
            Shape::Point(x, _) => Some(x),
            _ => None,
        }
    }

    pub fn y(&self) -> Option<f64> {
        match self.shape {
            Shape::Point(_, y) => Some(y),
            _ => None,
        }
    }

    /// Cartesian distance between two points.
    pub fn distance(&self, other: &Geometry) -> Option<f64> {
        match (&self.shape, &other.shape) {
            (Shape::Point(x1, y1), Shape::Point(x2, y2)) => Some(((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()),
            _ => None,
        }
    }
}

fn fmt_coords(f: &mut fmt::Formatter<'_>, coords: &[(f64, f64)]) -> fmt::Result {
    write!(f, "(")?;
    for (i, (x, y)) in coords.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{} {}", x, y)?;
    }
    write!(f, ")")
}

fn fmt_rings(f: &mut fmt::Formatter<'_>, rings: &[Vec<(f64, f64)>]) -> fmt::Result {
    write!(f, "(")?;
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        fmt_coords(f, ring)?;
    }
    write!(f, ")")
}

// WKT form.
impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            Shape::Point(x, y) => write!(f, "POINT({} {})", x, y),
            Shape::LineString(coords) => {
                write!(f, "LINESTRING")?;
                fmt_coords(f, coords)
            }
            Shape::Polygon(rings) => {
                write!(f, "POLYGON")?;
                fmt_rings(f, rings)
            }
            Shape::MultiPoint(coords) => {
                write!(f, "MULTIPOINT")?;
                fmt_coords(f, coords)
            }
            Shape::MultiLineString(lines) => {
                write!(f, "MULTILINESTRING")?;
                fmt_rings(f, lines)
            }
            Shape::MultiPolygon(polys) => {
                write!(f, "MULTIPOLYGON(")?;
                for (i, rings) in polys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    fmt_rings(f, rings)?;
                }
                write!(f, ")")
            }
            Shape::Collection(geoms) => {
                write!(f, "GEOMETRYCOLLECTION(")?;
                for (i, g) in geoms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", g)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl Eq for Geometry {}

impl Ord for Geometry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_string().cmp(&other.to_string()).then(self.srid.cmp(&other.srid))
    }
}

impl PartialOrd for Geometry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for Geometry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.srid.hash(state);
        self.to_string().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wkt_output() {
        let p = Geometry::point(0, 1.0, 2.0);
        assert_eq!(p.to_string(), "POINT(1 2)");
        let ls = Geometry { srid: 0, shape: Shape::LineString(vec![(0.0, 0.0), (1.0, 1.0)]) };
        assert_eq!(ls.to_string(), "LINESTRING(0 0,1 1)");
    }

    #[test]
    fn point_distance() {
        let a = Geometry::point(0, 0.0, 0.0);
        let b = Geometry::point(0, 3.0, 4.0);
        assert_eq!(a.distance(&b), Some(5.0));
    }
}
