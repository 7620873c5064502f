use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cluster::ward::{cluster_settlements, ClusterAssignment};
use crate::collect::global_variables::{
    get_data_path, get_output_path, BUILDINGS_SUFFIX, CLUSTER_DISTANCE_THRESHOLD,
    DATA_SUFFIX, FLOOD_SCENARIO_ELEVATION, REGIONS, SEASHORE_METRICS, STREETS_SUFFIX,
    SUMMATIVE_METRICS, SW_WIND_ANGLE,
};
use crate::collect::layers::{
    read_building_layer, read_measurement_csv, read_street_layer, write_matrix_csv,
    write_rows_csv, write_summary_csv,
};
use crate::contextual::flood::{water_relation, WaterRelationRow};
use crate::contextual::summative::{summarize, SummaryOptions, SummaryTable, UndefinedPolicy};
use crate::geo_core::GeoCore;
use crate::geometric::dem::Dtm;
use crate::geometric::street::LineSegment;
use crate::geometric::wind::{wind_deviation, WindRelationRow};

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

pub const WIND_RELATION_CSV: &str = "wind_relation.csv";
pub const SUMMATIVE_CSV: &str = "summative_data.csv";
pub const SUMMATIVE_NORM_CSV: &str = "summative_data_norm.csv";
pub const WATER_RELATION_CSV: &str = "waterrelation_data.csv";
pub const CLUSTERS_CSV: &str = "clusters.csv";

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Tunable parameters of a study run.
///
/// Every field has a default, so a JSON file only needs the keys it
/// overrides:
///
/// ```json
/// { "regions": ["atlantic"], "flood_threshold": 3.0, "undefined_policy": "fail" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyOptions {
    pub regions: Vec<String>,
    /// Wind bearing the seashore streets are compared against
    pub wind_angle: f64,
    /// Sea level scenario for `flooded_perc`
    pub flood_threshold: f64,
    /// Cut height of the Ward dendrogram
    pub cluster_threshold: f64,
    pub metrics: Vec<String>,
    /// Characters summarised over the seashore rows only
    pub restricted_metrics: Vec<String>,
    pub undefined_policy: UndefinedPolicy,
    /// EPSG of the input layers when they are not in the study CRS
    pub source_epsg: Option<i32>,
}

impl Default for StudyOptions {
    fn default() -> Self {
        StudyOptions {
            regions: REGIONS.iter().map(|r| r.to_string()).collect(),
            wind_angle: SW_WIND_ANGLE,
            flood_threshold: FLOOD_SCENARIO_ELEVATION,
            cluster_threshold: CLUSTER_DISTANCE_THRESHOLD,
            metrics: SUMMATIVE_METRICS.iter().map(|m| m.to_string()).collect(),
            restricted_metrics: SEASHORE_METRICS.iter().map(|m| m.to_string()).collect(),
            undefined_policy: UndefinedPolicy::Nan,
            source_epsg: None,
        }
    }
}

impl StudyOptions {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse study options")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("Failed to read study options: {:?}", path))?;
        Self::from_json_str(&text)
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            metrics: self.metrics.clone(),
            restricted_metrics: self.restricted_metrics.clone(),
            policy: self.undefined_policy,
        }
    }
}

/// One settlement of a region folder and the paths of its layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub region: String,
    pub name: String,
    dir: PathBuf,
}

impl Settlement {
    pub fn new(region: impl Into<String>, name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Settlement {
            region: region.into(),
            name: name.into(),
            dir: dir.into(),
        }
    }

    fn layer(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.name, suffix))
    }

    pub fn buildings_path(&self) -> PathBuf {
        self.layer(BUILDINGS_SUFFIX)
    }

    pub fn streets_path(&self) -> PathBuf {
        self.layer(STREETS_SUFFIX)
    }

    pub fn data_path(&self) -> PathBuf {
        self.layer(DATA_SUFFIX)
    }
}

/// Batch analysis of every settlement under a data folder laid out as
/// `<data>/<region>/<settlement>_{blg,str}.geojson` plus
/// `<settlement>_data.csv`.
///
/// Each stage writes its CSV into the output folder. A settlement whose
/// layers fail to load or to compute is reported on stderr and left out.
pub struct Study {
    data_path: PathBuf,
    pub options: StudyOptions,
    /// Working CRS of every metric and output folder
    pub geo_core: GeoCore,
}

impl Study {
    pub fn new(data_path: Option<String>, output_path: Option<String>) -> Self {
        Self::with_options(data_path, output_path, StudyOptions::default())
    }

    pub fn with_options(
        data_path: Option<String>,
        output_path: Option<String>,
        options: StudyOptions,
    ) -> Self {
        let data_path = data_path.map(PathBuf::from).unwrap_or_else(get_data_path);
        let output_path = output_path
            .map(PathBuf::from)
            .unwrap_or_else(get_output_path);
        let mut geo_core = GeoCore::default();
        geo_core.set_output_path(Some(output_path.to_string_lossy().into_owned()));

        Study {
            data_path,
            options,
            geo_core,
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Output folder held by the geo core, the default one when unset
    pub fn output_path(&self) -> PathBuf {
        self.geo_core
            .get_output_path()
            .map(PathBuf::from)
            .unwrap_or_else(get_output_path)
    }

    fn output_file(&self, name: &str) -> Result<PathBuf> {
        let output_path = self.output_path();
        std::fs::create_dir_all(&output_path).context(format!(
            "Failed to create output directory: {:?}",
            output_path
        ))?;
        Ok(output_path.join(name))
    }

    /// Settlements with a building layer, region by region, names sorted
    /// within a region. Missing region folders are skipped.
    pub fn settlements(&self) -> Result<Vec<Settlement>> {
        let mut settlements = Vec::new();
        for region in &self.options.regions {
            let dir = self.data_path.join(region);
            if !dir.is_dir() {
                eprintln!("Warning: region folder not found: {:?}", dir);
                continue;
            }
            let mut names: Vec<String> = std::fs::read_dir(&dir)
                .context(format!("Failed to list region folder: {:?}", dir))?
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| {
                    let file_name = entry.file_name().to_string_lossy().into_owned();
                    file_name
                        .strip_suffix(BUILDINGS_SUFFIX)
                        .filter(|name| !name.is_empty())
                        .map(|name| name.to_string())
                })
                .collect();
            names.sort();
            settlements.extend(
                names
                    .into_iter()
                    .map(|name| Settlement::new(region.clone(), name, dir.clone())),
            );
        }
        Ok(settlements)
    }

    /// Run `stage` over every settlement, skipping the ones that fail
    fn each_settlement<T, F>(&self, label: &str, mut stage: F) -> Result<Vec<T>>
    where
        F: FnMut(&Settlement) -> Result<T>,
    {
        let settlements = self.settlements()?;
        println!("{}: {} settlement(s)", label, settlements.len());

        #[cfg(feature = "indicatif")]
        let pb = {
            let pb = ProgressBar::new(settlements.len() as u64);
            pb.set_style(progress_style());
            pb.set_message(label.to_string());
            pb
        };

        let mut results = Vec::with_capacity(settlements.len());
        for settlement in &settlements {
            match stage(settlement) {
                Ok(result) => results.push(result),
                Err(e) => eprintln!(
                    "Warning: skipping {} ({}) in {}: {:#}",
                    settlement.name, settlement.region, label, e
                ),
            }
            #[cfg(feature = "indicatif")]
            pb.inc(1);
        }

        #[cfg(feature = "indicatif")]
        pb.finish_and_clear();

        Ok(results)
    }

    /// Bring the seashore segments into the working CRS when the layers
    /// come from another one
    fn street_segments(&self, settlement: &Settlement) -> Result<Vec<LineSegment>> {
        let mut segments = read_street_layer(settlement.streets_path())?;
        if let Some(epsg) = self.options.source_epsg {
            for segment in segments.iter_mut() {
                segment.geometry = self.geo_core.reproject_line_string(&segment.geometry, epsg)?;
            }
        }
        Ok(segments)
    }

    /// Deviation of each settlement's seashore street from the wind,
    /// written to `wind_relation.csv`
    pub fn wind_relation(&self) -> Result<Vec<WindRelationRow>> {
        let angle = self.options.wind_angle;
        let rows = self.each_settlement("wind relation", |settlement| {
            let segments = self.street_segments(settlement)?;
            let winddev = wind_deviation(&segments, angle)?;
            Ok(WindRelationRow {
                place: settlement.name.clone(),
                winddev,
            })
        })?;

        write_rows_csv(self.output_file(WIND_RELATION_CSV)?, &rows)?;
        Ok(rows)
    }

    /// Summative characters of every settlement (part), written to
    /// `summative_data.csv`
    pub fn summative(&self) -> Result<SummaryTable> {
        let options = self.options.summary_options();
        let tables = self.each_settlement("summative characters", |settlement| {
            let table = read_measurement_csv(settlement.data_path(), &settlement.name)?;
            Ok(summarize(&table, &options)?)
        })?;

        let mut summary = SummaryTable::default();
        for table in tables {
            summary.append(table)?;
        }

        write_summary_csv(self.output_file(SUMMATIVE_CSV)?, &summary)?;
        Ok(summary)
    }

    /// Flood exposure per settlement (part), written to
    /// `waterrelation_data.csv`.
    ///
    /// With a DTM the building elevations are recomputed from it, otherwise
    /// the `min` attribute of the building layer is used.
    pub fn water_relation(&self, dtm: Option<&Dtm>) -> Result<Vec<WaterRelationRow>> {
        let threshold = self.options.flood_threshold;
        let groups = self.each_settlement("water relation", |settlement| {
            let mut buildings = read_building_layer(settlement.buildings_path())?;
            if let Some(epsg) = self.options.source_epsg {
                for building in buildings.iter_mut() {
                    building.footprint = self.geo_core.reproject_polygon(&building.footprint, epsg)?;
                }
            }
            if let Some(dtm) = dtm {
                let footprints: Vec<_> = buildings.iter().map(|b| b.footprint.clone()).collect();
                for (building, stats) in buildings.iter_mut().zip(dtm.building_elevations(&footprints)) {
                    building.set_zonal_stats(&stats);
                }
            }
            Ok(water_relation(&settlement.name, &buildings, threshold))
        })?;

        let rows: Vec<WaterRelationRow> = groups.into_iter().flatten().collect();
        write_rows_csv(self.output_file(WATER_RELATION_CSV)?, &rows)?;
        Ok(rows)
    }

    /// Settlement types from the Ward clustering of the standardised
    /// summary, written to `summative_data_norm.csv` and `clusters.csv`.
    ///
    /// Rows with an undefined statistic cannot be placed in the dendrogram
    /// and are left out.
    pub fn cluster(&self, summary: &SummaryTable) -> Result<Vec<ClusterAssignment>> {
        let mut complete = summary.clone();
        for label in complete.retain_complete() {
            eprintln!("Warning: {} has undefined characters, not clustered", label);
        }

        let (standardized, assignments) =
            cluster_settlements(&complete, self.options.cluster_threshold)
                .context("Failed to cluster settlements")?;

        write_matrix_csv(
            self.output_file(SUMMATIVE_NORM_CSV)?,
            &complete.columns(),
            &complete.labels(),
            &standardized,
        )?;
        write_rows_csv(self.output_file(CLUSTERS_CSV)?, &assignments)?;

        let types = assignments.iter().map(|a| a.cl).max().unwrap_or(0);
        println!("{} settlement(s) in {} type(s)", assignments.len(), types);
        Ok(assignments)
    }

    /// Every stage in turn
    pub fn run(&self, dtm: Option<&Dtm>) -> Result<()> {
        self.wind_relation()?;
        let summary = self.summative()?;
        self.water_relation(dtm)?;
        if summary.is_empty() {
            eprintln!("Warning: no summative characters, clustering skipped");
        } else {
            self.cluster(&summary)?;
        }
        Ok(())
    }
}
