// Vertex-averaged centroids over GeoJSON coordinate trees.
use serde::Deserialize;

/// A longitude/latitude pair. Extra values of a GeoJSON position (altitude) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "Vec<f64>")]
pub struct Position {
    pub lng: f64,
    pub lat: f64,
}

impl Position {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl TryFrom<Vec<f64>> for Position {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [lng, lat, ..] => Ok(Self::new(*lng, *lat)),
            _ => Err(format!(
                "a position needs at least two numbers, got {}",
                values.len()
            )),
        }
    }
}

/// The `coordinates` member of a GeoJSON geometry: either a single position or an
/// arbitrarily nested sequence of them (rings, polygons, multipolygons).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinates {
    Point(Position),
    Nested(Vec<Coordinates>),
}

#[derive(Default)]
struct Accumulator {
    lng: f64,
    lat: f64,
    count: usize,
}

impl Coordinates {
    /// Arithmetic mean of every position reachable at any depth.
    ///
    /// This is not area weighted; it is only good enough to re-center a viewport.
    /// Returns `None` when the tree holds no positions at all.
    pub fn centroid(&self) -> Option<Position> {
        let mut acc = Accumulator::default();
        self.accumulate(&mut acc);
        if acc.count == 0 {
            return None;
        }
        let count = acc.count as f64;
        Some(Position::new(acc.lng / count, acc.lat / count))
    }

    pub fn point_count(&self) -> usize {
        match self {
            Coordinates::Point(_) => 1,
            Coordinates::Nested(children) => {
                children.iter().map(Coordinates::point_count).sum()
            }
        }
    }

    /// Every innermost run of positions, in document order.
    ///
    /// For polygons these are the rings; a bare point yields a one-element run.
    pub fn rings(&self) -> Vec<Vec<Position>> {
        let mut rings = Vec::new();
        self.collect_rings(&mut rings);
        rings
    }

    fn accumulate(&self, acc: &mut Accumulator) {
        match self {
            Coordinates::Point(position) => {
                acc.lng += position.lng;
                acc.lat += position.lat;
                acc.count += 1;
            }
            Coordinates::Nested(children) => {
                for child in children {
                    child.accumulate(acc);
                }
            }
        }
    }

    fn collect_rings(&self, rings: &mut Vec<Vec<Position>>) {
        match self {
            Coordinates::Point(position) => rings.push(vec![*position]),
            Coordinates::Nested(children) => {
                let positions: Option<Vec<Position>> = children
                    .iter()
                    .map(|child| match child {
                        Coordinates::Point(position) => Some(*position),
                        Coordinates::Nested(_) => None,
                    })
                    .collect();
                match positions {
                    Some(ring) if !ring.is_empty() => rings.push(ring),
                    Some(_) => {}
                    None => {
                        for child in children {
                            child.collect_rings(rings);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn parse(raw: &str) -> Coordinates {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn centroid__single_point_is_itself() {
        // given
        let coordinates = parse("[10, 20]");

        // when
        let centroid = coordinates.centroid();

        // then
        assert_eq!(centroid, Some(Position::new(10.0, 20.0)));
    }

    #[test]
    fn centroid__square_ring_averages_to_its_center() {
        // given
        let coordinates = parse("[[[0, 0], [0, 2], [2, 2], [2, 0]]]");

        // when
        let centroid = coordinates.centroid();

        // then
        assert_eq!(centroid, Some(Position::new(1.0, 1.0)));
    }

    #[test]
    fn centroid__multipolygon_weights_every_vertex_equally() {
        // given
        let coordinates =
            parse("[[[[0, 0], [0, 2], [2, 2], [2, 0]]], [[[10, 10], [10, 12]]]]");

        // when
        let centroid = coordinates.centroid().unwrap();

        // then
        assert_eq!(coordinates.point_count(), 6);
        assert!((centroid.lng - 24.0 / 6.0).abs() < 1e-9);
        assert!((centroid.lat - 26.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn centroid__empty_tree_has_no_centroid() {
        // given
        let coordinates = parse("[[], [[]]]");

        // when
        let centroid = coordinates.centroid();

        // then
        assert_eq!(centroid, None);
        assert_eq!(coordinates.point_count(), 0);
    }

    #[test]
    fn deserialize__altitude_is_ignored() {
        let coordinates = parse("[[1.5, 2.5, 300.0]]");

        assert_eq!(
            coordinates,
            Coordinates::Nested(vec![Coordinates::Point(Position::new(1.5, 2.5))])
        );
    }

    #[test]
    fn deserialize__lone_number_is_rejected() {
        let result = serde_json::from_str::<Coordinates>("[[1]]");

        assert!(result.is_err());
    }

    #[test]
    fn rings__returns_innermost_runs_for_a_multipolygon() {
        // given
        let coordinates = parse(
            "[[[[0, 0], [0, 1], [1, 1]], [[0.2, 0.2], [0.3, 0.3]]], [[[5, 5], [6, 6]]]]",
        );

        // when
        let rings = coordinates.rings();

        // then
        assert_eq!(rings.len(), 3);
        assert_eq!(rings[0].len(), 3);
        assert_eq!(rings[1][0], Position::new(0.2, 0.2));
        assert_eq!(rings[2], vec![Position::new(5.0, 5.0), Position::new(6.0, 6.0)]);
    }
}
