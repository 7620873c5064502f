use anyhow::Result;
use geo::{BoundingRect, Coord, LineString, Polygon};
#[cfg(feature = "proj")]
use anyhow::Context;
#[cfg(feature = "proj")]
use proj::Proj;

use crate::collect::global_variables::STUDY_EPSG;

/// CRS and output location shared by the study stages
/// Every metric in the crate assumes projected coordinates in metres
#[derive(Debug, Clone)]
pub struct GeoCore {
    /// EPSG code of the working CRS
    pub epsg: i32,
    /// Folder receiving the outputs
    pub output_path: Option<String>,
}

impl Default for GeoCore {
    /// Portugal TM06, the CRS of the study layers
    fn default() -> Self {
        GeoCore::new(STUDY_EPSG)
    }
}

impl GeoCore {
    pub fn new(epsg: i32) -> Self {
        GeoCore {
            epsg,
            output_path: None,
        }
    }

    pub fn get_epsg(&self) -> i32 {
        self.epsg
    }

    pub fn set_epsg(&mut self, epsg: i32) {
        self.epsg = epsg;
    }

    pub fn get_output_path(&self) -> Option<&String> {
        self.output_path.as_ref()
    }

    pub fn set_output_path(&mut self, output_path: Option<String>) {
        self.output_path = output_path;
    }

    /// Transform coordinates from one CRS to another
    #[cfg(feature = "proj")]
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        let from_crs = format!("EPSG:{}", from_epsg);
        let to_crs = format!("EPSG:{}", to_epsg);

        let proj = Proj::new_known_crs(&from_crs, &to_crs, None)
            .context("Failed to create Proj transformation")?;

        proj.convert((x, y))
            .context("Failed to transform coordinates")
    }

    #[cfg(not(feature = "proj"))]
    pub fn transform_coords(from_epsg: i32, to_epsg: i32, x: f64, y: f64) -> Result<(f64, f64)> {
        if from_epsg == to_epsg {
            return Ok((x, y));
        }
        anyhow::bail!(
            "Reprojection from EPSG:{} to EPSG:{} needs the `proj` feature",
            from_epsg,
            to_epsg
        )
    }

    /// Reproject a polyline into this CRS
    /// Lines already in the working CRS are returned as they are
    pub fn reproject_line_string(
        &self,
        line: &LineString<f64>,
        from_epsg: i32,
    ) -> Result<LineString<f64>> {
        if from_epsg == self.epsg {
            return Ok(line.clone());
        }
        let coords = line
            .coords()
            .map(|c| {
                Self::transform_coords(from_epsg, self.epsg, c.x, c.y).map(|(x, y)| Coord { x, y })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LineString::new(coords))
    }

    /// Reproject a polygon (exterior and holes) into this CRS
    pub fn reproject_polygon(&self, polygon: &Polygon<f64>, from_epsg: i32) -> Result<Polygon<f64>> {
        if from_epsg == self.epsg {
            return Ok(polygon.clone());
        }
        let exterior = self.reproject_line_string(polygon.exterior(), from_epsg)?;
        let interiors = polygon
            .interiors()
            .iter()
            .map(|ring| self.reproject_line_string(ring, from_epsg))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }
}

/// Axis aligned extent in the working CRS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Extent of a polygon, `None` when it has no coordinates
    pub fn of_polygon(polygon: &Polygon<f64>) -> Option<Self> {
        polygon
            .bounding_rect()
            .map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Closed-interval overlap test, touching edges count
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, polygon};

    #[test]
    fn test_geo_core_default() {
        let gc = GeoCore::default();
        assert_eq!(gc.get_epsg(), 3763);
        assert!(gc.get_output_path().is_none());
    }

    #[test]
    fn test_geo_core_output_path() {
        let mut gc = GeoCore::new(4326);
        gc.set_output_path(Some("out".to_string()));
        assert_eq!(gc.get_output_path().map(String::as_str), Some("out"));
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 5.0, 20.0, 6.0);
        let c = BoundingBox::new(11.0, 0.0, 12.0, 1.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&c), BoundingBox::new(0.0, 0.0, 12.0, 10.0));
    }

    #[test]
    fn test_bounding_box_of_polygon() {
        let poly = polygon![
            (x: 1.0, y: 2.0),
            (x: 4.0, y: 2.0),
            (x: 4.0, y: 5.0),
            (x: 1.0, y: 2.0),
        ];
        assert_eq!(
            BoundingBox::of_polygon(&poly),
            Some(BoundingBox::new(1.0, 2.0, 4.0, 5.0))
        );
    }

    #[test]
    fn test_reproject_same_crs_is_identity() {
        let gc = GeoCore::default();
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        assert_eq!(gc.reproject_line_string(&line, 3763).unwrap(), line);
    }

    #[test]
    fn test_transform_coords() {
        // Needs PROJ data when the feature is on, so only sanity-check the output
        let result = GeoCore::transform_coords(4326, 3763, -8.6, 41.1);
        if let Ok((x, y)) = result {
            assert!(x.is_finite());
            assert!(y.is_finite());
        }
    }
}
