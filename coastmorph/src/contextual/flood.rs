use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::collect::global_variables::{ELEVATION_NODATA, FLOOD_SCENARIO_ELEVATION};
use crate::commons::basic_functions::nodata_to_none;
use crate::commons::statistics::median;
use crate::contextual::summative::GroupKey;
use crate::geometric::dem::ZonalStats;

/// Building footprint with what the flood model needs to know about it
#[derive(Debug, Clone, PartialEq)]
pub struct FloodBuilding {
    pub footprint: Polygon<f64>,
    pub part: Option<String>,
    /// Tessellation cell in the first row facing the sea
    pub main: bool,
    /// Lowest terrain elevation under the footprint
    pub min_elevation: Option<f64>,
}

impl FloodBuilding {
    pub fn new(footprint: Polygon<f64>) -> Self {
        FloodBuilding {
            footprint,
            part: None,
            main: false,
            min_elevation: None,
        }
    }

    pub fn with_part(mut self, part: Option<String>) -> Self {
        self.part = part;
        self
    }

    pub fn with_main(mut self, main: bool) -> Self {
        self.main = main;
        self
    }

    /// Set the elevation, `-999` meaning no terrain under the footprint
    pub fn with_min_elevation(mut self, min: Option<f64>) -> Self {
        self.min_elevation = nodata_to_none(min, ELEVATION_NODATA);
        self
    }

    /// Take the elevation from the zonal statistics of the footprint
    pub fn set_zonal_stats(&mut self, stats: &ZonalStats) {
        self.min_elevation = nodata_to_none(stats.min, ELEVATION_NODATA);
    }

    pub fn is_flooded(&self, threshold: f64) -> bool {
        self.min_elevation.map_or(false, |min| min < threshold)
    }
}

/// One row of `waterrelation_data.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterRelationRow {
    pub place: String,
    /// Lowest elevation among the seafront buildings
    pub min_min: f64,
    /// Median of the seafront buildings' lowest elevations
    pub min_med: f64,
    /// Share of all buildings below the flood scenario elevation
    pub flooded_perc: f64,
}

/// Flood exposure of a settlement, one row per part (or one row when the
/// settlement is not split).
///
/// `min_min` and `min_med` look at the seafront (`main`) buildings only,
/// `flooded_perc` at every building of the group. Buildings without an
/// elevation stay in the denominator of `flooded_perc`. A group without
/// seafront elevations gets NaN for the first two.
pub fn water_relation(
    settlement: &str,
    buildings: &[FloodBuilding],
    threshold: f64,
) -> Vec<WaterRelationRow> {
    let mut order: Vec<Option<String>> = Vec::new();
    let mut groups: HashMap<Option<String>, Vec<&FloodBuilding>> = HashMap::new();
    for building in buildings {
        let members = groups.entry(building.part.clone()).or_insert_with(|| {
            order.push(building.part.clone());
            Vec::new()
        });
        members.push(building);
    }

    order
        .into_iter()
        .map(|part| {
            let members = &groups[&part];
            let seafront: Vec<f64> = members
                .iter()
                .filter(|b| b.main)
                .filter_map(|b| b.min_elevation)
                .collect();
            let min_min = seafront
                .iter()
                .copied()
                .reduce(f64::min)
                .unwrap_or(f64::NAN);
            let min_med = median(&seafront).unwrap_or(f64::NAN);
            let flooded = members.iter().filter(|b| b.is_flooded(threshold)).count();

            WaterRelationRow {
                place: GroupKey::new(settlement, part).label(),
                min_min,
                min_med,
                flooded_perc: flooded as f64 / members.len() as f64,
            }
        })
        .collect()
}

/// `water_relation` under the +5 m scenario
pub fn water_relation_default(settlement: &str, buildings: &[FloodBuilding]) -> Vec<WaterRelationRow> {
    water_relation(settlement, buildings, FLOOD_SCENARIO_ELEVATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn building(part: Option<&str>, main: bool, min: Option<f64>) -> FloodBuilding {
        let footprint = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        FloodBuilding::new(footprint)
            .with_part(part.map(|p| p.to_string()))
            .with_main(main)
            .with_min_elevation(min)
    }

    #[test]
    fn test_single_settlement() {
        let buildings = vec![
            building(None, true, Some(2.0)),
            building(None, true, Some(6.0)),
            building(None, true, Some(3.0)),
            building(None, false, Some(12.0)),
        ];
        let rows = water_relation_default("furadouro", &buildings);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].place, "furadouro");
        assert_eq!(rows[0].min_min, 2.0);
        assert_eq!(rows[0].min_med, 3.0);
        assert_eq!(rows[0].flooded_perc, 0.5);
    }

    #[test]
    fn test_nodata_counts_in_denominator_only() {
        let buildings = vec![
            building(None, true, Some(-999.0)),
            building(None, true, Some(1.0)),
            building(None, false, None),
            building(None, false, Some(20.0)),
        ];
        let rows = water_relation_default("costa_nova", &buildings);
        assert_eq!(rows[0].min_min, 1.0);
        assert_eq!(rows[0].flooded_perc, 0.25);
    }

    #[test]
    fn test_parts_are_separate_rows() {
        let buildings = vec![
            building(Some("1"), true, Some(4.0)),
            building(Some("2"), false, Some(9.0)),
            building(Some("1"), false, Some(8.0)),
        ];
        let rows = water_relation_default("vieira", &buildings);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].place, "vieira1");
        assert_eq!(rows[0].flooded_perc, 0.5);
        assert_eq!(rows[1].place, "vieira2");
        assert!(rows[1].min_min.is_nan());
        assert!(rows[1].min_med.is_nan());
        assert_eq!(rows[1].flooded_perc, 0.0);
    }

    #[test]
    fn test_zonal_stats_update() {
        let mut b = building(None, true, None);
        b.set_zonal_stats(&ZonalStats::from_values(&[3.0, 7.0]));
        assert_eq!(b.min_elevation, Some(3.0));
        assert!(b.is_flooded(5.0));
        b.set_zonal_stats(&ZonalStats::from_values(&[]));
        assert_eq!(b.min_elevation, None);
    }
}
