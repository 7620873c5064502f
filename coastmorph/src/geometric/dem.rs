use anyhow::{Context, Result};
use geo::{BoundingRect, Contains, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "gdal")]
use gdal::Dataset;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::commons::error::{MorphoError, MorphoResult};
use crate::commons::statistics::median;
use crate::geo_core::BoundingBox;

const DEFAULT_NODATA: f64 = -9999.0;

/// Terrain model tile, usually an ESRI ASCII grid (`.asc`)
/// Row 0 is the northern edge of the tile
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    pub ncols: usize,
    pub nrows: usize,
    /// Lower-left corner of the lower-left cell
    pub xll: f64,
    pub yll: f64,
    pub cellsize: f64,
    pub nodata: f64,
    values: Vec<f64>,
}

impl AsciiGrid {
    /// Build a grid from row-major values, northern row first
    pub fn new(
        ncols: usize,
        nrows: usize,
        xll: f64,
        yll: f64,
        cellsize: f64,
        nodata: f64,
        values: Vec<f64>,
    ) -> MorphoResult<Self> {
        if ncols == 0 || nrows == 0 {
            return Err(MorphoError::Grid("grid has no cells".to_string()));
        }
        if !(cellsize.is_finite() && cellsize > 0.0) {
            return Err(MorphoError::Grid(format!("invalid cellsize {}", cellsize)));
        }
        let cells = ncols.checked_mul(nrows).ok_or_else(|| {
            MorphoError::Grid(format!("{} x {} cells overflow the grid size", ncols, nrows))
        })?;
        if values.len() != cells {
            return Err(MorphoError::Grid(format!(
                "expected {} values ({} x {}), found {}",
                cells,
                ncols,
                nrows,
                values.len()
            )));
        }
        Ok(AsciiGrid {
            ncols,
            nrows,
            xll,
            yll,
            cellsize,
            nodata,
            values,
        })
    }

    /// Read the first band of a raster tile through GDAL.
    ///
    /// The tile must be north-up with square cells; the band nodata value is
    /// kept, `-9999` when the band has none.
    #[cfg(feature = "gdal")]
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dataset = Dataset::open(path).context(format!("Failed to open DTM tile: {:?}", path))?;
        let (width, height) = dataset.raster_size();
        let gt = dataset
            .geo_transform()
            .context(format!("DTM tile has no geotransform: {:?}", path))?;
        if gt[2] != 0.0 || gt[4] != 0.0 {
            anyhow::bail!("Rotated DTM tile not supported: {:?}", path);
        }
        if (gt[1] + gt[5]).abs() > 1e-9 * gt[1].abs() {
            anyhow::bail!(
                "DTM tile cells are not square ({} x {}): {:?}",
                gt[1],
                -gt[5],
                path
            );
        }

        let band = dataset.rasterband(1).context("Failed to get band 1")?;
        let nodata = band.no_data_value().unwrap_or(DEFAULT_NODATA);
        let buffer = band
            .read_as::<f64>((0, 0), (width, height), (width, height), None)
            .context(format!("Failed to read DTM tile: {:?}", path))?;

        let cellsize = gt[1];
        let yll = gt[3] + gt[5] * height as f64;
        AsciiGrid::new(
            width,
            height,
            gt[0],
            yll,
            cellsize,
            nodata,
            buffer.data().to_vec(),
        )
        .context(format!("Invalid DTM tile: {:?}", path))
    }

    pub fn extent(&self) -> BoundingBox {
        BoundingBox::new(
            self.xll,
            self.yll,
            self.xll + self.ncols as f64 * self.cellsize,
            self.yll + self.nrows as f64 * self.cellsize,
        )
    }

    pub fn cell_centre(&self, row: usize, col: usize) -> Point<f64> {
        Point::new(
            self.xll + (col as f64 + 0.5) * self.cellsize,
            self.yll + (self.nrows as f64 - row as f64 - 0.5) * self.cellsize,
        )
    }

    /// Elevation of a cell, `None` for nodata
    pub fn value(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        let v = self.values[row * self.ncols + col];
        if v.is_finite() && v != self.nodata {
            Some(v)
        } else {
            None
        }
    }

    /// Valid cells whose centre lies strictly inside the polygon
    fn cells_within(&self, polygon: &Polygon<f64>, out: &mut Vec<f64>) {
        let rect = match polygon.bounding_rect() {
            Some(rect) => rect,
            None => return,
        };
        let cs = self.cellsize;
        let last_col = self.ncols as f64 - 1.0;
        let last_row = self.nrows as f64 - 1.0;

        let col_min = ((rect.min().x - self.xll) / cs - 0.5).ceil().max(0.0);
        let col_max = ((rect.max().x - self.xll) / cs - 0.5).floor().min(last_col);
        let row_min = (self.nrows as f64 - 0.5 - (rect.max().y - self.yll) / cs)
            .ceil()
            .max(0.0);
        let row_max = (self.nrows as f64 - 0.5 - (rect.min().y - self.yll) / cs)
            .floor()
            .min(last_row);
        if col_min > col_max || row_min > row_max {
            return;
        }

        for row in row_min as usize..=row_max as usize {
            for col in col_min as usize..=col_max as usize {
                if let Some(v) = self.value(row, col) {
                    if polygon.contains(&self.cell_centre(row, col)) {
                        out.push(v);
                    }
                }
            }
        }
    }
}

/// Elevation summary of the cells under a footprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonalStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub count: usize,
}

impl ZonalStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return ZonalStats {
                min: None,
                max: None,
                mean: None,
                median: None,
                count: 0,
            };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        ZonalStats {
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
            median: median(values),
            count: values.len(),
        }
    }
}

/// Zonal statistics of a polygon over non-overlapping tiles.
///
/// A cell counts when its centre falls inside the polygon and it is not
/// nodata. Cells from every tile are pooled, as if the tiles were mosaicked.
pub fn zonal_stats<'a, I>(polygon: &Polygon<f64>, tiles: I) -> ZonalStats
where
    I: IntoIterator<Item = &'a AsciiGrid>,
{
    let mut values = Vec::new();
    for tile in tiles {
        tile.cells_within(polygon, &mut values);
    }
    ZonalStats::from_values(&values)
}

/// Digital terrain model made of raster tiles
pub struct Dtm {
    tiles: Vec<AsciiGrid>,
    /// Source files, parallel to `tiles` when loaded from disk
    paths: Vec<PathBuf>,
}

impl Dtm {
    pub fn new(tiles: Vec<AsciiGrid>) -> Self {
        Dtm {
            tiles,
            paths: Vec::new(),
        }
    }

    /// Load every tile, failing on the first unreadable one
    #[cfg(feature = "gdal")]
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut tiles = Vec::with_capacity(paths.len());
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            tiles.push(AsciiGrid::from_path(path)?);
            sources.push(path.as_ref().to_path_buf());
        }
        println!("Loaded {} DTM tile(s)", tiles.len());
        Ok(Dtm {
            tiles,
            paths: sources,
        })
    }

    /// Load every `*.asc` file of a folder, in file name order
    #[cfg(feature = "gdal")]
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .context(format!("Failed to list DTM folder: {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("asc"))
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            anyhow::bail!("No .asc tiles found in {:?}", dir);
        }
        Self::from_paths(&paths)
    }

    pub fn tiles(&self) -> &[AsciiGrid] {
        &self.tiles
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Tiles whose extent touches the area of interest
    pub fn tiles_for(&self, area: &BoundingBox) -> Vec<&AsciiGrid> {
        self.tiles
            .iter()
            .filter(|tile| tile.extent().intersects(area))
            .collect()
    }

    /// Zonal statistics for each footprint, in input order.
    ///
    /// Tiles are picked by the combined extent of the footprints rather than
    /// by the case area, so a tile touching only that extent is still read.
    /// Cells only count under a footprint, which leaves the statistics
    /// unchanged.
    pub fn building_elevations(&self, footprints: &[Polygon<f64>]) -> Vec<ZonalStats> {
        let area = footprints
            .iter()
            .filter_map(BoundingBox::of_polygon)
            .reduce(|a, b| a.union(&b));
        let tiles = match area {
            Some(area) => self.tiles_for(&area),
            None => Vec::new(),
        };

        #[cfg(feature = "rayon")]
        let stats = footprints
            .par_iter()
            .map(|footprint| zonal_stats(footprint, tiles.iter().copied()))
            .collect();

        #[cfg(not(feature = "rayon"))]
        let stats = footprints
            .iter()
            .map(|footprint| zonal_stats(footprint, tiles.iter().copied()))
            .collect();

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    const NODATA: f64 = -9999.0;

    /// 4 x 3 tile with one nodata cell, lower-left corner at (100, 200)
    fn grid() -> AsciiGrid {
        let values = vec![
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, NODATA, 8.0, //
            9.0, 10.0, 11.0, 12.0,
        ];
        AsciiGrid::new(4, 3, 100.0, 200.0, 1.0, NODATA, values).unwrap()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    #[test]
    fn test_grid_values_and_extent() {
        let grid = grid();
        assert_eq!(grid.ncols, 4);
        assert_eq!(grid.nrows, 3);
        assert_eq!(grid.value(0, 0), Some(1.0));
        assert_eq!(grid.value(1, 2), None);
        assert_eq!(grid.value(2, 3), Some(12.0));
        assert_eq!(grid.value(3, 0), None);
        assert_eq!(grid.extent(), BoundingBox::new(100.0, 200.0, 104.0, 203.0));
    }

    #[test]
    fn test_cell_centre_row_zero_is_north() {
        let grid = grid();
        assert_eq!(grid.cell_centre(0, 0), Point::new(100.5, 202.5));
        assert_eq!(grid.cell_centre(2, 3), Point::new(103.5, 200.5));
    }

    #[test]
    fn test_new_rejects_wrong_value_count() {
        let result = AsciiGrid::new(2, 2, 0.0, 0.0, 1.0, NODATA, vec![1.0, 2.0, 3.0]);
        assert!(matches!(result, Err(MorphoError::Grid(_))));
        assert!(AsciiGrid::new(0, 2, 0.0, 0.0, 1.0, NODATA, Vec::new()).is_err());
        assert!(AsciiGrid::new(1, 1, 0.0, 0.0, 0.0, NODATA, vec![1.0]).is_err());
    }

    #[test]
    fn test_new_rejects_overflowing_dimensions() {
        let result = AsciiGrid::new(usize::MAX / 2, 3, 0.0, 0.0, 1.0, NODATA, vec![1.0]);
        assert!(matches!(result, Err(MorphoError::Grid(_))));
    }

    #[test]
    fn test_zonal_stats_skips_nodata() {
        let grid = grid();
        // covers the two middle columns of the two upper rows
        let stats = zonal_stats(&square(101.0, 201.0, 103.0, 203.0), [&grid]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(6.0));
        assert_eq!(stats.median, Some(3.0));
        assert!((stats.mean.unwrap() - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_zonal_stats_outside_grid() {
        let grid = grid();
        let stats = zonal_stats(&square(0.0, 0.0, 5.0, 5.0), [&grid]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, None);
    }

    #[test]
    fn test_zonal_stats_pools_tiles() {
        let west = AsciiGrid::new(1, 1, 0.0, 0.0, 1.0, NODATA, vec![4.0]).unwrap();
        let east = AsciiGrid::new(1, 1, 1.0, 0.0, 1.0, NODATA, vec![2.0]).unwrap();
        let stats = zonal_stats(&square(0.0, 0.0, 2.0, 1.0), [&west, &east]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, Some(2.0));
    }

    #[test]
    fn test_dtm_building_elevations() {
        let west = AsciiGrid::new(1, 1, 0.0, 0.0, 1.0, NODATA, vec![4.0]).unwrap();
        let far = AsciiGrid::new(1, 1, 500.0, 500.0, 1.0, NODATA, vec![1.0]).unwrap();
        let dtm = Dtm::new(vec![west, far]);
        assert_eq!(dtm.tiles_for(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).len(), 1);

        let stats = dtm.building_elevations(&[square(0.0, 0.0, 1.0, 1.0)]);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].min, Some(4.0));
    }

    #[test]
    fn test_dtm_tiles_beyond_footprints_leave_stats_unchanged() {
        // the second footprint spans the gap, so both tiles are read
        let west = AsciiGrid::new(1, 1, 0.0, 0.0, 1.0, NODATA, vec![4.0]).unwrap();
        let east = AsciiGrid::new(1, 1, 9.0, 0.0, 1.0, NODATA, vec![1.0]).unwrap();
        let dtm = Dtm::new(vec![west, east]);
        let footprints = [square(0.0, 0.0, 1.0, 1.0), square(5.0, 0.0, 10.0, 1.0)];
        let stats = dtm.building_elevations(&footprints);
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[0].min, Some(4.0));
        assert_eq!(stats[1].count, 1);
        assert_eq!(stats[1].min, Some(1.0));
    }

    #[cfg(feature = "gdal")]
    const ASC: &str = "ncols 4
nrows 3
xllcorner 100.0
yllcorner 200.0
cellsize 1.0
NODATA_value -9999
1 2 3 4
5 6 -9999 8
9 10 11 12
";

    #[cfg(feature = "gdal")]
    #[test]
    fn test_from_path_reads_ascii_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.asc");
        std::fs::write(&path, ASC).unwrap();
        let tile = AsciiGrid::from_path(&path).unwrap();
        assert_eq!((tile.ncols, tile.nrows), (4, 3));
        assert_eq!(tile.cellsize, 1.0);
        assert_eq!(tile.extent(), BoundingBox::new(100.0, 200.0, 104.0, 203.0));
        assert_eq!(tile.value(0, 0), Some(1.0));
        assert_eq!(tile.value(1, 2), None);
        assert_eq!(tile.value(2, 3), Some(12.0));
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_dtm_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002_1_55-top_orto.asc"), ASC).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a grid").unwrap();
        let dtm = Dtm::from_dir(dir.path()).unwrap();
        assert_eq!(dtm.tiles().len(), 1);
        assert_eq!(dtm.paths().len(), 1);
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_dtm_from_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Dtm::from_dir(dir.path()).is_err());
    }
}
