use geo::{Coord, EuclideanLength, LineString, MultiLineString};
use geos::{Geom, Geometry as GeosGeometry};

use crate::commons::error::{MorphoError, MorphoResult};

/// Street network segment read from a `<settlement>_str` layer
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    pub geometry: LineString<f64>,
    /// Part of the manually flagged seashore street (`case == 1`)
    pub case: bool,
}

impl LineSegment {
    pub fn new(geometry: LineString<f64>, case: bool) -> Self {
        LineSegment { geometry, case }
    }

    pub fn seashore(geometry: LineString<f64>) -> Self {
        Self::new(geometry, true)
    }
}

/// Sew polylines sharing endpoints into maximal paths with the GEOS line
/// merger.
///
/// Paths only run through nodes where exactly two segments meet; a node of
/// degree one or three and more ends them. Isolated cycles come out closed.
/// Zero-length segments are ignored. The order of the returned paths is the
/// one GEOS produces.
pub fn line_merge(lines: &[LineString<f64>]) -> MorphoResult<Vec<LineString<f64>>> {
    let multi = MultiLineString::new(
        lines
            .iter()
            .filter(|line| line.0.len() >= 2)
            .cloned()
            .collect(),
    );
    if multi.0.is_empty() {
        return Ok(Vec::new());
    }

    let geos_lines: GeosGeometry = multi
        .try_into()
        .map_err(|e: geos::Error| MorphoError::Geometry(format!("to GEOS: {}", e)))?;
    let merged = geos_lines
        .line_merge()
        .map_err(|e| MorphoError::Geometry(format!("line merge: {}", e)))?;
    if merged
        .is_empty()
        .map_err(|e| MorphoError::Geometry(e.to_string()))?
    {
        return Ok(Vec::new());
    }

    let merged: geo::Geometry<f64> = merged
        .try_into()
        .map_err(|e: geos::Error| MorphoError::Geometry(format!("from GEOS: {}", e)))?;
    Ok(match merged {
        geo::Geometry::LineString(line) => vec![line],
        geo::Geometry::MultiLineString(multi) => multi.0,
        geo::Geometry::GeometryCollection(collection) => collection
            .0
            .into_iter()
            .filter_map(|geometry| match geometry {
                geo::Geometry::LineString(line) => Some(line),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Position of the first input segment carried by `path`; a segment is
/// carried when two consecutive distinct vertices of it are consecutive
/// vertices of the path, in either direction
fn discovery_rank(path: &LineString<f64>, lines: &[LineString<f64>]) -> usize {
    let carries = |a: Coord<f64>, b: Coord<f64>| {
        path.lines()
            .any(|leg| (leg.start == a && leg.end == b) || (leg.start == b && leg.end == a))
    };
    lines
        .iter()
        .position(|line| {
            line.lines()
                .find(|leg| leg.start != leg.end)
                .map_or(false, |leg| carries(leg.start, leg.end))
        })
        .unwrap_or(lines.len())
}

/// Merge the seashore segments and keep the longest resulting path.
///
/// Equal lengths keep the path holding the earliest input segment.
pub fn canonical_path(lines: &[LineString<f64>]) -> MorphoResult<LineString<f64>> {
    let mut paths: Vec<(usize, LineString<f64>)> = line_merge(lines)?
        .into_iter()
        .map(|path| (discovery_rank(&path, lines), path))
        .collect();
    paths.sort_by_key(|(rank, _)| *rank);

    let mut best: Option<(f64, LineString<f64>)> = None;
    for (_, path) in paths {
        let length = path.euclidean_length();
        let longer = match &best {
            Some((best_length, _)) => length > *best_length,
            None => true,
        };
        if longer {
            best = Some((length, path));
        }
    }

    best.map(|(_, path)| path)
        .ok_or_else(|| MorphoError::EmptyInput("merged seashore street".to_string()))
}
