//! Runtime configuration resolved from the environment.
//!
//! `RuntimeConfig::from_env()` is the single initialization point, meant to
//! be called once at the start of a batch run. The resulting value is
//! threaded explicitly through `Product` and the pipeline; nothing in the
//! crate reads the environment at arbitrary depth.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable names, each backing exactly one [`RuntimeConfig`]
/// field.
pub mod env_vars {
    /// Explicit DEM raster path override.
    pub const DEM_PATH: &str = "EOSTACK_DEM_PATH";
    /// Local reference data store root.
    pub const DATA_ROOT: &str = "EOSTACK_DATA_ROOT";
    /// Remote (S3/HTTP) reference data root.
    pub const S3_DB_URL_ROOT: &str = "EOSTACK_S3_DB_URL_ROOT";
    /// Force the DEM to come from the remote root ("1"/"true" to enable).
    pub const USE_S3_DB: &str = "EOSTACK_USE_S3_DB";
    /// Tile edge length for chunked raster I/O.
    pub const TILE_SIZE: &str = "EOSTACK_TILE_SIZE";
    /// Toggle tiled reads ("0"/"false" to disable).
    pub const TILED_READS: &str = "EOSTACK_TILED_READS";
    /// Default pixel size forced for SAR products.
    pub const SAR_DEFAULT_RES: &str = "EOSTACK_SAR_DEFAULT_RES";
    /// Multiplier applied to the native optical resolution for default loads.
    pub const OPTICAL_PREVIEW_FACTOR: &str = "EOSTACK_OPTICAL_PREVIEW_FACTOR";
}

pub const DEFAULT_TILE_SIZE: usize = 2048;
pub const DEFAULT_SAR_RESOLUTION: f64 = 1000.0;
pub const DEFAULT_OPTICAL_PREVIEW_FACTOR: f64 = 50.0;

/// Options resolved from the environment at init time.
///
/// Each field has one documented default and one override mechanism (the
/// env var of the same concern, or direct mutation before handing the
/// config to a `Product`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit DEM raster; takes precedence over any store lookup.
    pub dem_path: Option<PathBuf>,
    /// Local reference data store root.
    pub data_root: Option<PathBuf>,
    /// Remote reference data root, required when `use_remote_dem` is set.
    pub s3_root: Option<String>,
    /// When set, the default DEM must come from the remote root.
    pub use_remote_dem: bool,
    /// Tile edge length for chunked reads/writes.
    pub tile_size: usize,
    /// Whether raster I/O proceeds tile by tile.
    pub tiled_reads: bool,
    /// Pixel size forced for SAR acquisitions (bounds orthorectification
    /// and speckle-filtering cost). Calibration constant, not physics.
    pub sar_default_resolution: f64,
    /// Native-resolution multiplier for default optical loads. Calibration
    /// constant tuned for fast validation runs.
    pub optical_preview_factor: f64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dem_path: None,
            data_root: dirs::data_dir().map(|d| d.join("eostack")),
            s3_root: None,
            use_remote_dem: false,
            tile_size: DEFAULT_TILE_SIZE,
            tiled_reads: true,
            sar_default_resolution: DEFAULT_SAR_RESOLUTION,
            optical_preview_factor: DEFAULT_OPTICAL_PREVIEW_FACTOR,
        }
    }
}

fn env_truthy(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "t" | "y" | "yes"
    )
}

impl RuntimeConfig {
    /// Resolve the configuration from the environment.
    ///
    /// Call once at the start of a run and thread the value through; the
    /// pipeline never re-reads the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var(env_vars::DEM_PATH) {
            config.dem_path = Some(PathBuf::from(path));
        }
        if let Ok(root) = std::env::var(env_vars::DATA_ROOT) {
            config.data_root = Some(PathBuf::from(root));
        }
        if let Ok(root) = std::env::var(env_vars::S3_DB_URL_ROOT) {
            config.s3_root = Some(root);
        }
        if let Ok(flag) = std::env::var(env_vars::USE_S3_DB) {
            config.use_remote_dem = env_truthy(&flag);
        }
        if let Ok(size) = std::env::var(env_vars::TILE_SIZE) {
            if let Ok(size) = size.parse::<usize>() {
                if size > 0 {
                    config.tile_size = size;
                }
            }
        }
        if let Ok(flag) = std::env::var(env_vars::TILED_READS) {
            config.tiled_reads = env_truthy(&flag);
        }
        if let Ok(res) = std::env::var(env_vars::SAR_DEFAULT_RES) {
            if let Ok(res) = res.parse::<f64>() {
                config.sar_default_resolution = res;
            }
        }
        if let Ok(factor) = std::env::var(env_vars::OPTICAL_PREVIEW_FACTOR) {
            if let Ok(factor) = factor.parse::<f64>() {
                config.optical_preview_factor = factor;
            }
        }
        config
    }

    /// True when a DEM is resolvable in principle, without touching disk.
    pub fn dem_resolvable(&self) -> bool {
        if self.use_remote_dem {
            self.s3_root.is_some()
        } else {
            self.dem_path.is_some() || self.data_root.is_some()
        }
    }
}
