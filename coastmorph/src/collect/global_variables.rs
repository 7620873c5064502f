use std::path::PathBuf;

/// Root folder holding one sub-folder of layers per region
pub const DATA_PATH: &str = "./data";

/// Folder receiving the CSV outputs of a study run
pub const OUTPUT_PATH: &str = "./data";

/// Regional partitions of the Portuguese coast (Ribeiro, 1945)
pub const REGIONS: [&str; 4] = ["atlantic", "preatl", "premed", "med"];

/// ETRS89 / Portugal TM06, projected in metres
pub const STUDY_EPSG: i32 = 3763;

/// Bearing of the prevailing south-west wind, degrees from north
pub const SW_WIND_ANGLE: f64 = 45.0;

/// "What if" sea level rise scenario, metres above the DTM datum
pub const FLOOD_SCENARIO_ELEVATION: f64 = 5.0;

/// Nodata written by the zonal statistics step into building layers
pub const ELEVATION_NODATA: f64 = -999.0;

/// Ward distance at which the dendrogram is cut into settlement types
pub const CLUSTER_DISTANCE_THRESHOLD: f64 = 18.0;

/// Layer suffixes inside a region folder
pub const BUILDINGS_SUFFIX: &str = "_blg.geojson";
pub const STREETS_SUFFIX: &str = "_str.geojson";
pub const DATA_SUFFIX: &str = "_data.csv";

/// Characters summarised for every building, street segment, cell and block
pub const SUMMATIVE_METRICS: &[&str] = &[
    "sdbAre",
    "sdbPer",
    "ssbCCo",
    "ssbCor",
    "ssbSqu",
    "ssbERI",
    "ssbElo",
    "ssbCCD",
    "stbCeA",
    "mtbSWR",
    "mtbAli",
    "mtbNDi",
    "ldbPWL",
    "stbSAl",
    "ltcBuA",
    "sssLin",
    "sdsSPW",
    "stsOpe",
    "svsSDe",
    "sdsAre",
    "sdsBAr",
    "sisBpM",
    "sdcLAL",
    "sdcAre",
    "sscERI",
    "sicCAR",
    "stcSAl",
    "ldkAre",
    "lskElo",
    "likGra",
    "meshedness",
];

/// Characters only meaningful along the seashore street (`case == 1`)
pub const SEASHORE_METRICS: &[&str] = &["sdsLen"];

pub fn get_data_path() -> PathBuf {
    PathBuf::from(DATA_PATH)
}

pub fn get_output_path() -> PathBuf {
    PathBuf::from(OUTPUT_PATH)
}
