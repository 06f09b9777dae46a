//! Product identity, geometry and the user-facing load/stack entry points.
//!
//! A `Product` is one acquisition on disk: classified from its name alone,
//! carrying its band mapping table and the runtime configuration it was
//! opened with. Geometry (extent, footprint) is computed lazily and cached
//! per instance.
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::core::bands::{self, BandMapping, PhysicalBand};
use crate::core::config::RuntimeConfig;
use crate::core::geometry::{Extent, Polygon, simplify_footprint};
use crate::core::params::{LoadOptions, StackOptions};
use crate::core::processing::pipeline::{self, BandSet};
use crate::core::processing::stack::{self, Stack};
use crate::error::{Error, Result};
use crate::io::raster;
use crate::types::{BandId, DType, ProductType, SensorType};

/// Maximum edge, in pixels, of the decimated read backing `footprint()`.
const FOOTPRINT_READ_EDGE: usize = 512;

/// One satellite acquisition rooted at a directory (or archive) on disk.
#[derive(Debug)]
pub struct Product {
    /// Raw product name, as delivered.
    pub name: String,
    pub product_type: ProductType,
    pub sensor_type: SensorType,
    pub acquisition: DateTime<Utc>,
    /// Tile or grid cell identifier, when the naming convention carries one.
    pub tile: Option<String>,
    /// Native ground sample distance in dataset units.
    pub resolution: f64,
    /// True when the product is still a .zip/.tar archive.
    pub is_archived: bool,
    pub path: PathBuf,
    /// Writable directory for stacks and temporaries.
    pub output: Option<PathBuf>,
    pub config: RuntimeConfig,
    mapping: BandMapping,
    extent_cache: Mutex<Option<Extent>>,
    footprint_cache: Mutex<Option<Polygon>>,
}

impl Product {
    /// Open a product rooted at `path`, classifying it from its name.
    pub fn open(path: &Path, config: RuntimeConfig) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::InvalidProduct(format!("Unusable product path: {}", path.display()))
            })?;
        Self::from_name(&name, path, config)
    }

    /// Build a product from an explicit name, for layouts where the
    /// directory name is not the delivered product name.
    pub fn from_name(name: &str, path: &Path, config: RuntimeConfig) -> Result<Self> {
        let product_type = ProductType::from_name(name)?;
        let acquisition = parse_acquisition(name).ok_or_else(|| {
            Error::InvalidProduct(format!("No acquisition datetime in product name: {name}"))
        })?;
        let is_archived = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("zip") | Some("tar")
        );
        let product = Self {
            name: name.to_string(),
            product_type,
            sensor_type: product_type.sensor_type(),
            acquisition,
            tile: parse_tile(name),
            resolution: product_type.native_resolution(),
            is_archived,
            path: path.to_path_buf(),
            output: None,
            config,
            mapping: bands::mapping_for(product_type),
            extent_cache: Mutex::new(None),
            footprint_cache: Mutex::new(None),
        };
        info!(
            "Opened {} ({}, {})",
            product.condensed_name(),
            product.product_type,
            product.sensor_type
        );
        Ok(product)
    }

    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = Some(output);
        self
    }

    /// Deterministic short identity: acquisition timestamp, product tag and
    /// tile when present.
    pub fn condensed_name(&self) -> String {
        let stamp = self.acquisition.format("%Y%m%dT%H%M%S");
        match &self.tile {
            Some(tile) => format!("{stamp}_{}_{tile}", self.product_type.tag()),
            None => format!("{stamp}_{}", self.product_type.tag()),
        }
    }

    pub fn mapping(&self) -> &BandMapping {
        &self.mapping
    }

    /// Whether `band` can be produced for this product. Pure and O(1):
    /// terrain bands additionally need a resolvable DEM, everything else
    /// is a mapping-table lookup.
    pub fn has_band(&self, band: BandId) -> bool {
        if !self.mapping.contains(band) {
            return false;
        }
        if band.is_terrain() {
            return self.config.dem_resolvable();
        }
        true
    }

    /// Default pixel size when the caller gives neither a pixel size nor
    /// an array size. SAR products get a fixed coarse resolution; optical
    /// products a multiple of their native one.
    pub fn default_pixel_size(&self) -> f64 {
        match self.sensor_type {
            SensorType::Sar => self.config.sar_default_resolution,
            SensorType::Optical => self.resolution * self.config.optical_preview_factor,
        }
    }

    /// The product's main raster: the first mapped single-file measurement
    /// band, or, for sub-band layouts, the first non-mask raster found.
    pub fn main_raster(&self) -> Result<PathBuf> {
        for band in self.mapping.supported() {
            if band == BandId::Clouds {
                continue;
            }
            if let Some(PhysicalBand::File(token)) = self.mapping.get(band) {
                return pipeline::find_band_file(&self.path, token);
            }
        }
        find_main_raster(&self.path)
    }

    /// Georeferenced bounding box, cached after the first call.
    pub fn extent(&self) -> Result<Extent> {
        if let Some(extent) = lock(&self.extent_cache).clone() {
            return Ok(extent);
        }
        let extent = raster::dataset_extent(&self.main_raster()?)?;
        *lock(&self.extent_cache) = Some(extent.clone());
        Ok(extent)
    }

    /// Valid-data footprint, cached after the first call.
    ///
    /// Computed from a decimated masked read of the main raster, then
    /// simplified with a pixel-size-scaled tolerance.
    pub fn footprint(&self) -> Result<Polygon> {
        if let Some(footprint) = lock(&self.footprint_cache).clone() {
            return Ok(footprint);
        }

        let path = self.main_raster()?;
        let extent = self.extent()?;
        let aspect = extent.width() / extent.height().max(f64::EPSILON);
        let (cols, rows) = if aspect >= 1.0 {
            (
                FOOTPRINT_READ_EDGE,
                ((FOOTPRINT_READ_EDGE as f64 / aspect).round() as usize).max(1),
            )
        } else {
            (
                ((FOOTPRINT_READ_EDGE as f64 * aspect).round() as usize).max(1),
                FOOTPRINT_READ_EDGE,
            )
        };
        let coarse = raster::read(
            &path,
            &raster::ReadOptions {
                size: Some((cols, rows)),
                ..Default::default()
            },
        )?;

        let mut min_row = usize::MAX;
        let mut max_row = 0usize;
        let mut min_col = usize::MAX;
        let mut max_col = 0usize;
        for ((row, col), &v) in coarse.data.indexed_iter() {
            if v.is_finite() {
                min_row = min_row.min(row);
                max_row = max_row.max(row);
                min_col = min_col.min(col);
                max_col = max_col.max(col);
            }
        }
        if min_row == usize::MAX {
            return Err(Error::InvalidProduct(format!(
                "No valid pixels in {}",
                path.display()
            )));
        }

        let t = coarse.transform;
        let geo = |col: f64, row: f64| (t[0] + col * t[1] + row * t[2], t[3] + col * t[4] + row * t[5]);
        let (x0, y0) = geo(min_col as f64, min_row as f64);
        let (x1, y1) = geo((max_col + 1) as f64, (max_row + 1) as f64);
        let raw = Polygon::from_extent(&Extent {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
            projection: coarse.projection.clone(),
        });
        let (px, _) = coarse.pixel_size();
        let footprint = simplify_footprint(&raw, px);
        debug!(
            "Footprint of {}: {} vertices",
            self.condensed_name(),
            footprint.exterior.len()
        );
        *lock(&self.footprint_cache) = Some(footprint.clone());
        Ok(footprint)
    }

    /// Load bands on a common grid. See the pipeline module for the
    /// resolution and derivation rules.
    pub fn load(&self, bands: &[BandId], opts: &LoadOptions) -> Result<BandSet> {
        pipeline::load(self, bands, opts)
    }

    /// Load, assemble and write a stack of `bands` to `path`.
    pub fn stack(
        &self,
        bands: &[BandId],
        pixel_size: Option<f64>,
        path: &Path,
        opts: &StackOptions,
    ) -> Result<(Stack, DType)> {
        let load_opts = LoadOptions {
            pixel_size,
            resampling: opts.resampling,
            clean_optical: opts.clean_optical,
            ..Default::default()
        };
        let band_set = self.load(bands, &load_opts)?;
        stack::stack(&band_set, opts, path)
    }

    /// Temp directory for intermediates, under the output dir.
    pub fn tmp_dir(&self) -> Option<PathBuf> {
        self.output
            .as_ref()
            .map(|out| out.join(format!(".{}_tmp", self.condensed_name())))
    }

    /// Drop cached geometry and delete the temp directory.
    pub fn clear(&self) -> Result<()> {
        *lock(&self.extent_cache) = None;
        *lock(&self.footprint_cache) = None;
        if let Some(tmp) = self.tmp_dir() {
            if tmp.exists() {
                std::fs::remove_dir_all(&tmp)?;
                debug!("Removed temp dir: {}", tmp.display());
            }
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// First `%Y%m%dT%H%M%S` token in the name, falling back to a bare
/// `%Y%m%d` date at midnight. Naming conventions differ per vendor but
/// all carry one of these two forms.
fn parse_acquisition(name: &str) -> Option<DateTime<Utc>> {
    for token in name.split(['_', '-', '.']) {
        if token.len() == 15 {
            if let Ok(dt) = NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S") {
                return Some(dt.and_utc());
            }
        }
    }
    for token in name.split(['_', '-', '.']) {
        if token.len() == 8 && token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(date) = NaiveDate::parse_from_str(token, "%Y%m%d") {
                return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
    }
    None
}

/// MGRS-style tile token (`T` + 2 digits + 3 letters), as used by the
/// Sentinel-2 naming convention.
fn parse_tile(name: &str) -> Option<String> {
    name.split('_')
        .find(|token| {
            let bytes = token.as_bytes();
            bytes.len() == 6
                && bytes[0] == b'T'
                && bytes[1..3].iter().all(u8::is_ascii_digit)
                && bytes[3..].iter().all(u8::is_ascii_uppercase)
        })
        .map(str::to_string)
}

/// Fallback main raster for sub-band layouts: first raster in the tree
/// that is not a usability/cloud mask.
fn find_main_raster(root: &Path) -> Result<PathBuf> {
    fn walk(dir: &Path, hit: &mut Option<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, hit)?;
            } else if hit.is_none() {
                let name = entry.file_name().to_string_lossy().to_lowercase();
                let is_raster = name.ends_with(".tif") || name.ends_with(".tiff") || name.ends_with(".jp2");
                if is_raster && !name.contains("udm") {
                    *hit = Some(path);
                }
            }
            if hit.is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    let mut hit = None;
    walk(root, &mut hit)?;
    hit.ok_or_else(|| {
        Error::InvalidProduct(format!("No measurement raster under {}", root.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const S2_NAME: &str = "S2B_MSIL2A_20200114T065229_N0213_R020_T40REQ_20200114T094749";
    const S1_NAME: &str = "S1A_IW_GRDH_1SDV_20191215T060906_20191215T060931_030355_0378F7_3696";
    const LANDSAT_NAME: &str = "LC08_L1TP_200030_20201220_20210310_02_T1";

    fn product(name: &str) -> Product {
        Product::from_name(name, Path::new("/data").join(name).as_path(), RuntimeConfig::default())
            .unwrap()
    }

    #[test]
    fn condensed_name_is_stable() {
        assert_eq!(product(S2_NAME).condensed_name(), "20200114T065229_S2_MSI_T40REQ");
        assert_eq!(product(S1_NAME).condensed_name(), "20191215T060906_S1_IW_GRD");
        assert_eq!(product(LANDSAT_NAME).condensed_name(), "20201220T000000_L_OLI");
    }

    #[test]
    fn acquisition_parsing() {
        assert_eq!(
            parse_acquisition(S2_NAME),
            NaiveDate::from_ymd_opt(2020, 1, 14)
                .and_then(|d| d.and_hms_opt(6, 52, 29))
                .map(|dt| dt.and_utc())
        );
        assert_eq!(
            parse_acquisition(LANDSAT_NAME),
            NaiveDate::from_ymd_opt(2020, 12, 20)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        );
        assert_eq!(parse_acquisition("no_date_here"), None);
    }

    #[test]
    fn tile_parsing() {
        assert_eq!(parse_tile(S2_NAME), Some("T40REQ".to_string()));
        assert_eq!(parse_tile(S1_NAME), None);
    }

    #[test]
    fn has_band_respects_mapping_and_dem() {
        let p = product(S2_NAME);
        assert!(p.has_band(BandId::Red));
        assert!(p.has_band(BandId::Clouds));
        assert!(!p.has_band(BandId::Vv));
        // Default config resolves a DEM through the local store
        assert_eq!(p.has_band(BandId::Slope), p.config.dem_resolvable());

        let mut no_dem = Product::from_name(S2_NAME, Path::new("/data/x"), RuntimeConfig::default()).unwrap();
        no_dem.config.dem_path = None;
        no_dem.config.data_root = None;
        assert!(!no_dem.has_band(BandId::Slope));
        assert!(no_dem.has_band(BandId::Red));
    }

    #[test]
    fn default_pixel_size_policy() {
        let sar = product(S1_NAME);
        assert_eq!(sar.default_pixel_size(), sar.config.sar_default_resolution);

        let optical = product(S2_NAME);
        assert_eq!(
            optical.default_pixel_size(),
            10.0 * optical.config.optical_preview_factor
        );
    }

    #[test]
    fn archives_are_flagged() {
        let zipped = Product::open(
            Path::new("/data").join(format!("{S2_NAME}.zip")).as_path(),
            RuntimeConfig::default(),
        )
        .unwrap();
        assert!(zipped.is_archived);
        assert_eq!(zipped.name, S2_NAME);
        assert!(!product(S2_NAME).is_archived);
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            Product::open(Path::new("/data/random_dir"), RuntimeConfig::default()),
            Err(Error::InvalidProduct(_))
        ));
    }

    #[test]
    fn clear_removes_tmp_dir() {
        let out = tempfile::tempdir().unwrap();
        let p = product(S2_NAME).with_output(out.path().to_path_buf());
        let tmp = p.tmp_dir().unwrap();
        std::fs::create_dir_all(&tmp).unwrap();
        std::fs::write(tmp.join("scratch.tif"), b"x").unwrap();
        p.clear().unwrap();
        assert!(!tmp.exists());
    }
}
