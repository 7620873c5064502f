use geo::LineString;
use serde::{Deserialize, Serialize};

use crate::collect::global_variables::SW_WIND_ANGLE;
use crate::commons::error::{MorphoError, MorphoResult};
use crate::geometric::street::{canonical_path, LineSegment};

/// One row of `wind_relation.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindRelationRow {
    pub place: String,
    pub winddev: f64,
}

/// Bearing of a path from its first to its last coordinate, in degrees
/// clockwise from north, within (-180, 180]
pub fn bearing(line: &LineString<f64>) -> MorphoResult<f64> {
    let (first, last) = match (line.0.first(), line.0.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(MorphoError::Geometry("empty line string".to_string())),
    };
    let dx = last.x - first.x;
    let dy = last.y - first.y;
    // atan2(dx, dy) rather than atan2(dy, dx): measured from north
    Ok(dx.atan2(dy).to_degrees())
}

/// Normalized deviation of an undirected bearing from the reference angle:
/// 0 when parallel, 1 when perpendicular.
///
/// `reference_angle` is expected in [0, 180).
pub fn deviation_from_bearing(bearing: f64, reference_angle: f64) -> f64 {
    let mut azimuth = bearing;
    if azimuth < reference_angle {
        azimuth += 180.0;
    }
    azimuth = (azimuth - reference_angle).abs();
    if azimuth > 90.0 && azimuth <= 180.0 {
        azimuth -= 2.0 * (azimuth - 90.0);
    }
    azimuth / 90.0
}

/// Deviation of the seashore street from the wind direction.
///
/// Only segments flagged `case` take part. They are line-merged and the
/// longest merged path gives the street direction.
pub fn wind_deviation(segments: &[LineSegment], reference_angle: f64) -> MorphoResult<f64> {
    let seashore: Vec<LineString<f64>> = segments
        .iter()
        .filter(|segment| segment.case)
        .map(|segment| segment.geometry.clone())
        .collect();
    if seashore.is_empty() {
        return Err(MorphoError::EmptyInput(
            "seashore street segments (case == 1)".to_string(),
        ));
    }

    let path = canonical_path(&seashore)?;
    Ok(deviation_from_bearing(bearing(&path)?, reference_angle))
}

/// `wind_deviation` against the south-west wind
pub fn sw_wind_deviation(segments: &[LineSegment]) -> MorphoResult<f64> {
    wind_deviation(segments, SW_WIND_ANGLE)
}
