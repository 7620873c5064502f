use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use geo::{LineString, Polygon};
use geojson::{Feature, GeoJson};
use serde::Serialize;
use std::path::Path;

use crate::commons::basic_functions::{
    format_cell, parse_cell, parse_flag, property_f64, property_flag, property_label,
};
use crate::contextual::flood::FloodBuilding;
use crate::contextual::summative::{GroupKey, MeasurementTable, SummaryTable};
use crate::geometric::street::LineSegment;

/// Columns of a measurement CSV that are attributes rather than characters
const SETTLEMENT_COLUMN: &str = "settlement";
const PART_COLUMN: &str = "part";
const CASE_COLUMN: &str = "case";
/// Identifier columns carried over from the morphometric step
const ID_COLUMNS: [&str; 4] = ["uID", "nID", "bID", "fid"];

fn parse_geojson(bytes: &[u8], what: &str) -> Result<Vec<Feature>> {
    let text = std::str::from_utf8(bytes).context("GeoJSON data is not valid UTF-8")?;
    let geojson: GeoJson = text
        .parse()
        .context(format!("Failed to parse GeoJSON {}", what))?;

    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc.features),
        GeoJson::Feature(f) => Ok(vec![f]),
        _ => anyhow::bail!("GeoJSON {} must be a Feature or FeatureCollection", what),
    }
}

fn feature_geometry(feature: &Feature) -> Result<Option<geo::Geometry<f64>>> {
    let geometry = match feature.geometry.as_ref() {
        Some(geometry) => geometry,
        None => return Ok(None),
    };
    let geo_geom: geo::Geometry<f64> = geometry
        .try_into()
        .context("Failed to convert GeoJSON geometry to geo::Geometry")?;
    Ok(Some(geo_geom))
}

/// Street segments from GeoJSON bytes
/// MultiLineStrings are exploded, non-linear features skipped
pub fn street_segments_from_geojson(bytes: &[u8]) -> Result<Vec<LineSegment>> {
    let mut segments = Vec::new();
    for feature in parse_geojson(bytes, "street layer")? {
        let case = feature
            .properties
            .as_ref()
            .map_or(false, |props| property_flag(props, "case"));

        let lines: Vec<LineString<f64>> = match feature_geometry(&feature) {
            Ok(Some(geo::Geometry::LineString(line))) => vec![line],
            Ok(Some(geo::Geometry::MultiLineString(multi))) => multi.0,
            Ok(_) => continue,
            Err(e) => {
                eprintln!("Warning: Failed to process street feature: {}", e);
                continue;
            }
        };
        segments.extend(lines.into_iter().map(|line| LineSegment::new(line, case)));
    }
    Ok(segments)
}

pub fn read_street_layer<P: AsRef<Path>>(path: P) -> Result<Vec<LineSegment>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).context(format!("Failed to read street layer: {:?}", path))?;
    street_segments_from_geojson(&bytes).context(format!("Invalid street layer: {:?}", path))
}

/// Building footprints from GeoJSON bytes with their `part`, `main` and
/// `min` attributes. MultiPolygons are exploded.
pub fn flood_buildings_from_geojson(bytes: &[u8]) -> Result<Vec<FloodBuilding>> {
    let mut buildings = Vec::new();
    for feature in parse_geojson(bytes, "building layer")? {
        let polygons: Vec<Polygon<f64>> = match feature_geometry(&feature) {
            Ok(Some(geo::Geometry::Polygon(poly))) => vec![poly],
            Ok(Some(geo::Geometry::MultiPolygon(multi))) => multi.0,
            Ok(_) => continue,
            Err(e) => {
                eprintln!("Warning: Failed to process building feature: {}", e);
                continue;
            }
        };

        let (part, main, min) = match feature.properties.as_ref() {
            Some(props) => (
                property_label(props, PART_COLUMN),
                property_flag(props, "main"),
                property_f64(props, "min"),
            ),
            None => (None, false, None),
        };
        buildings.extend(polygons.into_iter().map(|footprint| {
            FloodBuilding::new(footprint)
                .with_part(part.clone())
                .with_main(main)
                .with_min_elevation(min)
        }));
    }
    Ok(buildings)
}

pub fn read_building_layer<P: AsRef<Path>>(path: P) -> Result<Vec<FloodBuilding>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).context(format!("Failed to read building layer: {:?}", path))?;
    flood_buildings_from_geojson(&bytes).context(format!("Invalid building layer: {:?}", path))
}

/// Measurement table from CSV text (comma separated, header row).
///
/// `settlement` names the rows unless the file has a `settlement` column.
/// `part` and `case` columns are attributes, identifier columns are
/// dropped, every other column is a character; cells that do not parse are
/// missing values.
pub fn measurements_from_csv<R: std::io::Read>(reader: R, settlement: &str) -> Result<MeasurementTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: StringRecord = rdr.headers().context("Failed to read CSV header")?.clone();
    let settlement_idx = headers.iter().position(|h| h == SETTLEMENT_COLUMN);
    let part_idx = headers.iter().position(|h| h == PART_COLUMN);
    let case_idx = headers.iter().position(|h| h == CASE_COLUMN);

    let metric_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, name)| {
            Some(*idx) != settlement_idx
                && Some(*idx) != part_idx
                && Some(*idx) != case_idx
                && !name.is_empty()
                && !ID_COLUMNS.contains(name)
        })
        .map(|(idx, name)| (idx, name.to_string()))
        .collect();

    let mut table =
        MeasurementTable::new(metric_columns.iter().map(|(_, name)| name.clone()).collect());

    for (line, result) in rdr.records().enumerate() {
        let record = result.context(format!("Failed to read CSV record {}", line + 1))?;
        let name = settlement_idx
            .and_then(|idx| record.get(idx))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(settlement);
        let part = part_idx
            .and_then(|idx| record.get(idx))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(part_label);
        let case = case_idx
            .and_then(|idx| record.get(idx))
            .map_or(false, parse_flag);
        let values = metric_columns
            .iter()
            .map(|(idx, _)| record.get(*idx).and_then(parse_cell))
            .collect();

        table.push_row(GroupKey::new(name, part), case, values)?;
    }

    Ok(table)
}

/// `2.0` and `2` name the same part
fn part_label(cell: &str) -> String {
    match cell.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => format!("{}", v as i64),
        _ => cell.to_string(),
    }
}

pub fn read_measurement_csv<P: AsRef<Path>>(path: P, settlement: &str) -> Result<MeasurementTable> {
    let path = path.as_ref();
    let file =
        std::fs::File::open(path).context(format!("Failed to open measurement CSV: {:?}", path))?;
    measurements_from_csv(std::io::BufReader::new(file), settlement)
        .context(format!("Invalid measurement CSV: {:?}", path))
}

/// Serialize rows to a CSV file, header taken from the field names
pub fn write_rows_csv<P: AsRef<Path>, S: Serialize>(path: P, rows: &[S]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        csv::Writer::from_path(path).context(format!("Failed to create CSV: {:?}", path))?;
    for row in rows {
        wtr.serialize(row).context("Failed to write CSV row")?;
    }
    wtr.flush().context(format!("Failed to flush CSV: {:?}", path))?;
    println!("Saved {} row(s) to: {:?}", rows.len(), path);
    Ok(())
}

/// Write a labelled matrix; the first header cell is left empty like an
/// index column
pub fn write_matrix_csv<P: AsRef<Path>>(
    path: P,
    columns: &[String],
    labels: &[String],
    matrix: &[Vec<f64>],
) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .context(format!("Failed to create CSV: {:?}", path))?;

    let mut header = vec![String::new()];
    header.extend(columns.iter().cloned());
    wtr.write_record(&header).context("Failed to write CSV header")?;

    for (label, row) in labels.iter().zip(matrix) {
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|v| format_cell(*v)));
        wtr.write_record(&record).context("Failed to write CSV row")?;
    }
    wtr.flush().context(format!("Failed to flush CSV: {:?}", path))?;
    println!("Saved {} row(s) to: {:?}", labels.len(), path);
    Ok(())
}

/// `summative_data.csv`: one row per settlement (part), three columns per
/// character
pub fn write_summary_csv<P: AsRef<Path>>(path: P, summary: &SummaryTable) -> Result<()> {
    write_matrix_csv(path, &summary.columns(), &summary.labels(), &summary.matrix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contextual::summative::{summarize, SummaryOptions};

    const STREETS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"case": 1},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
            {"type": "Feature", "properties": {"case": 0},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [0, 5]]}},
            {"type": "Feature", "properties": {"case": "1"},
             "geometry": {"type": "MultiLineString", "coordinates": [[[1, 1], [2, 2]], [[5, 5], [6, 6]]]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Point", "coordinates": [0, 0]}}
        ]
    }"#;

    const BUILDINGS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"part": 1, "main": 1, "min": 2.5},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}},
            {"type": "Feature", "properties": {"part": 2, "main": 0, "min": -999},
             "geometry": {"type": "Polygon", "coordinates": [[[2, 0], [3, 0], [3, 1], [2, 0]]]}}
        ]
    }"#;

    #[test]
    fn test_street_segments_from_geojson() {
        let segments = street_segments_from_geojson(STREETS.as_bytes()).unwrap();
        assert_eq!(segments.len(), 4);
        assert_eq!(segments.iter().filter(|s| s.case).count(), 3);
    }

    #[test]
    fn test_flood_buildings_from_geojson() {
        let buildings = flood_buildings_from_geojson(BUILDINGS.as_bytes()).unwrap();
        assert_eq!(buildings.len(), 2);
        assert_eq!(buildings[0].part.as_deref(), Some("1"));
        assert!(buildings[0].main);
        assert_eq!(buildings[0].min_elevation, Some(2.5));
        assert_eq!(buildings[1].min_elevation, None);
    }

    #[test]
    fn test_rejects_bare_geometry() {
        let point = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(street_segments_from_geojson(point.as_bytes()).is_err());
    }

    #[test]
    fn test_measurements_from_csv() {
        let csv = "uID,sdbAre,sdsLen,part,case\n1,10,5,1.0,1\n2,,7,1.0,0\n3,30,,2,True\n";
        let table = measurements_from_csv(csv.as_bytes(), "sines").unwrap();
        assert_eq!(table.columns(), &["sdbAre", "sdsLen"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].key, GroupKey::new("sines", Some("1".to_string())));
        assert!(table.rows()[0].case);
        assert_eq!(table.rows()[1].values, vec![None, Some(7.0)]);
        assert_eq!(table.rows()[2].key.label(), "sines2");
        assert!(table.rows()[2].case);
    }

    #[test]
    fn test_measurements_settlement_column() {
        let csv = "settlement,sdbAre\nnazare,1\n,2\n";
        let table = measurements_from_csv(csv.as_bytes(), "fallback").unwrap();
        assert_eq!(table.rows()[0].key.settlement, "nazare");
        assert_eq!(table.rows()[1].key.settlement, "fallback");
    }

    #[test]
    fn test_write_summary_csv() {
        let csv = "sdbAre\n1\n2\n3\n4\n5\n6\n7\n8\n9\n";
        let table = measurements_from_csv(csv.as_bytes(), "nazare").unwrap();
        let summary = summarize(&table, &SummaryOptions::new(&["sdbAre"], &[])).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summative_data.csv");
        write_summary_csv(&path, &summary).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next(),
            Some(",sdbAre_meanIQ,sdbAre_rangeIQ,sdbAre_TheilID")
        );
        assert!(lines.next().unwrap().starts_with("nazare,5,4,"));
    }

    #[test]
    fn test_write_rows_csv() {
        #[derive(Serialize)]
        struct Row {
            place: String,
            winddev: f64,
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wind_relation.csv");
        write_rows_csv(
            &path,
            &[Row {
                place: "nazare".to_string(),
                winddev: 0.25,
            }],
        )
        .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "place,winddev\nnazare,0.25\n");
    }
}
