/// Typed GeoJSON geometries
///
/// The seven geometry kinds as a tagged sum type, each carrying its own
/// coordinate nesting. Deserializing through these types enforces nesting
/// depth and numeric leaves; `validate` covers what the type system cannot
/// (position arity), `construct_check` covers what the spatial store's
/// geometry constructor would reject.
use serde::{Deserialize, Serialize};

/// A single coordinate tuple: `[x, y]` or `[x, y, z]`
pub type Position = Vec<f64>;

pub const GEOMETRY_TYPES: [&str; 7] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

fn check_position(position: &Position) -> Result<(), String> {
    if position.len() < 2 {
        return Err(format!(
            "a position requires at least 2 coordinates, got {}",
            position.len()
        ));
    }
    Ok(())
}

impl Geometry {
    /// Schema validation beyond nesting depth: every position must carry at
    /// least an x and a y.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Geometry::Point { coordinates } => check_position(coordinates),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                coordinates.iter().try_for_each(check_position)
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().try_for_each(check_position)
            }
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .try_for_each(check_position),
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().try_for_each(Geometry::validate)
            }
        }
    }

    /// Checks the constraints the store's geometry constructor enforces, so a
    /// bad feature can be skipped instead of failing the whole batch: no
    /// empty coordinate arrays, line strings of at least two points, closed
    /// rings of at least four points.
    pub fn construct_check(&self) -> Result<(), String> {
        match self {
            Geometry::Point { .. } => Ok(()),
            Geometry::MultiPoint { coordinates } => {
                if coordinates.is_empty() {
                    return Err("MultiPoint has no points".to_string());
                }
                Ok(())
            }
            Geometry::LineString { coordinates } => check_linestring(coordinates),
            Geometry::MultiLineString { coordinates } => {
                if coordinates.is_empty() {
                    return Err("MultiLineString has no line strings".to_string());
                }
                coordinates.iter().try_for_each(|c| check_linestring(c))
            }
            Geometry::Polygon { coordinates } => check_polygon(coordinates),
            Geometry::MultiPolygon { coordinates } => {
                if coordinates.is_empty() {
                    return Err("MultiPolygon has no polygons".to_string());
                }
                coordinates.iter().try_for_each(|p| check_polygon(p))
            }
            Geometry::GeometryCollection { geometries } => {
                geometries.iter().try_for_each(Geometry::construct_check)
            }
        }
    }

    /// Strip any elevation component: truncate every position to `[x, y]`,
    /// recursively. Idempotent.
    pub fn strip_elevation(&mut self) {
        match self {
            Geometry::Point { coordinates } => coordinates.truncate(2),
            Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
                for position in coordinates {
                    position.truncate(2);
                }
            }
            Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
                for ring in coordinates {
                    for position in ring {
                        position.truncate(2);
                    }
                }
            }
            Geometry::MultiPolygon { coordinates } => {
                for polygon in coordinates {
                    for ring in polygon {
                        for position in ring {
                            position.truncate(2);
                        }
                    }
                }
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.strip_elevation();
                }
            }
        }
    }
}

fn check_linestring(coordinates: &[Position]) -> Result<(), String> {
    if coordinates.len() < 2 {
        return Err(format!(
            "a LineString requires at least 2 points, got {}",
            coordinates.len()
        ));
    }
    Ok(())
}

fn check_polygon(rings: &[Vec<Position>]) -> Result<(), String> {
    if rings.is_empty() {
        return Err("Polygon has no rings".to_string());
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(format!(
                "a Polygon ring requires at least 4 points, got {}",
                ring.len()
            ));
        }
        if ring.first() != ring.last() {
            return Err("a Polygon ring must be closed".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(x: f64, y: f64, z: Option<f64>) -> Geometry {
        let mut coordinates = vec![x, y];
        if let Some(z) = z {
            coordinates.push(z);
        }
        Geometry::Point { coordinates }
    }

    #[test]
    fn strip_elevation_truncates_point() {
        let mut geometry = point(1.0, 2.0, Some(3.0));
        geometry.strip_elevation();
        assert_eq!(
            geometry,
            Geometry::Point {
                coordinates: vec![1.0, 2.0]
            }
        );
    }

    #[test]
    fn strip_elevation_is_idempotent() {
        let mut once = Geometry::LineString {
            coordinates: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        };
        once.strip_elevation();
        let mut twice = once.clone();
        twice.strip_elevation();
        assert_eq!(once, twice);
    }

    #[test]
    fn strip_elevation_recurses_into_polygons() {
        let mut geometry = Geometry::MultiPolygon {
            coordinates: vec![vec![vec![
                vec![0.0, 0.0, 9.0],
                vec![1.0, 0.0, 9.0],
                vec![1.0, 1.0, 9.0],
                vec![0.0, 0.0, 9.0],
            ]]],
        };
        geometry.strip_elevation();
        if let Geometry::MultiPolygon { coordinates } = &geometry {
            for position in coordinates.iter().flatten().flatten() {
                assert_eq!(position.len(), 2);
            }
        } else {
            unreachable!();
        }
    }

    #[test]
    fn strip_elevation_recurses_into_collections() {
        let mut geometry = Geometry::GeometryCollection {
            geometries: vec![point(1.0, 2.0, Some(3.0))],
        };
        geometry.strip_elevation();
        assert_eq!(
            geometry,
            Geometry::GeometryCollection {
                geometries: vec![point(1.0, 2.0, None)],
            }
        );
    }

    #[test]
    fn nesting_mismatch_fails_to_deserialize() {
        // Point coordinates where LineString nesting was declared
        let value = json!({"type": "LineString", "coordinates": [1.0, 2.0]});
        assert!(serde_json::from_value::<Geometry>(value).is_err());
    }

    #[test]
    fn single_coordinate_position_fails_validation() {
        let geometry = Geometry::Point {
            coordinates: vec![1.0],
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn open_ring_fails_construct_check() {
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 1.0],
            ]],
        };
        assert!(geometry.construct_check().is_err());
    }

    #[test]
    fn valid_polygon_passes_construct_check() {
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]],
        };
        assert!(geometry.construct_check().is_ok());
    }
}
