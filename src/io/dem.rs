//! DEM source resolution policy.
//!
//! Orthorectification and terrain-derived bands need an elevation raster.
//! Resolution order: explicit path (validated), then the well-known
//! dataset in the local reference store, or a remote reference when
//! remote-only mode is set. Configuration failures surface before any I/O.
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::config::RuntimeConfig;
use crate::core::geometry::Extent;
use crate::error::{Error, Result};
use crate::io::raster::{self, BandArray, ReadOptions};

/// Well-known default elevation dataset inside the reference store.
pub const DEFAULT_DEM_SUB_PATH: [&str; 3] = [
    "GLOBAL",
    "MERIT_Hydrologically_Adjusted_Elevations",
    "MERIT_DEM.vrt",
];

/// A resolved elevation dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemSource {
    Local(PathBuf),
    Remote(String),
}

impl DemSource {
    /// Locator understood by the raster engine.
    pub fn gdal_path(&self) -> PathBuf {
        match self {
            DemSource::Local(path) => path.clone(),
            DemSource::Remote(url) => PathBuf::from(format!("/vsicurl/{url}")),
        }
    }
}

/// Resolve the DEM for subsequent operations.
///
/// An explicit path must exist. Without one, remote-only mode requires the
/// configured remote root; otherwise the default dataset under the local
/// reference store is used.
pub fn resolve_dem(config: &RuntimeConfig) -> Result<DemSource> {
    if let Some(path) = &config.dem_path {
        if !path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Not existing DEM: {}", path.display()),
            )));
        }
        debug!("Using explicit DEM: {}", path.display());
        return Ok(DemSource::Local(path.clone()));
    }

    if config.use_remote_dem {
        let root = config.s3_root.as_ref().ok_or_else(|| {
            Error::Configuration(format!(
                "Remote DEM requested but {} is not set",
                crate::core::config::env_vars::S3_DB_URL_ROOT
            ))
        })?;
        let url = format!(
            "{}/{}",
            root.trim_end_matches('/'),
            DEFAULT_DEM_SUB_PATH.join("/")
        );
        info!("Using remote DEM: {url}");
        return Ok(DemSource::Remote(url));
    }

    let root = config.data_root.as_ref().ok_or_else(|| {
        Error::Configuration(format!(
            "No DEM configured: set {} or {}",
            crate::core::config::env_vars::DEM_PATH,
            crate::core::config::env_vars::DATA_ROOT
        ))
    })?;
    let mut path = root.clone();
    for part in DEFAULT_DEM_SUB_PATH {
        path.push(part);
    }
    debug!("Using default DEM: {}", path.display());
    Ok(DemSource::Local(path))
}

/// Read the DEM over `extent`, resampled onto a (rows x cols) grid so the
/// result is pixel-aligned with the band being derived.
pub fn read_dem_window(
    source: &DemSource,
    extent: &Extent,
    rows: usize,
    cols: usize,
    config: &RuntimeConfig,
) -> Result<BandArray> {
    let path = source.gdal_path();
    let dem_extent = raster::dataset_extent(&path)?;
    // Window in DEM pixel coordinates covering the requested extent
    let window = {
        let ds = raster::open_dataset(&path)?;
        let (dem_cols, dem_rows) = ds.raster_size();
        let col_scale = dem_cols as f64 / dem_extent.width().max(f64::EPSILON);
        let row_scale = dem_rows as f64 / dem_extent.height().max(f64::EPSILON);
        let col_off = ((extent.min_x - dem_extent.min_x) * col_scale).floor().max(0.0) as usize;
        let row_off = ((dem_extent.max_y - extent.max_y) * row_scale).floor().max(0.0) as usize;
        let win_cols = ((extent.width() * col_scale).ceil() as usize)
            .max(1)
            .min(dem_cols.saturating_sub(col_off).max(1));
        let win_rows = ((extent.height() * row_scale).ceil() as usize)
            .max(1)
            .min(dem_rows.saturating_sub(row_off).max(1));
        raster::RasterWindow {
            col_off,
            row_off,
            cols: win_cols,
            rows: win_rows,
        }
    };

    raster::read(
        &path,
        &ReadOptions {
            size: Some((cols, rows)),
            window: Some(window),
            resampling: gdal::raster::ResampleAlg::Bilinear,
            tile_size: config.tile_size,
            tiled: config.tiled_reads,
            ..Default::default()
        },
    )
}

/// Default DEM location under a reference store root.
pub fn default_dem_path(root: &Path) -> PathBuf {
    let mut path = root.to_path_buf();
    for part in DEFAULT_DEM_SUB_PATH {
        path.push(part);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RuntimeConfig {
        RuntimeConfig {
            data_root: None,
            ..Default::default()
        }
    }

    #[test]
    fn explicit_dem_must_exist() {
        let config = RuntimeConfig {
            dem_path: Some(PathBuf::from("/definitely/not/here.tif")),
            ..base_config()
        };
        match resolve_dem(&config) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn explicit_dem_wins_over_store() {
        let dir = tempfile::tempdir().unwrap();
        let dem = dir.path().join("dem.tif");
        std::fs::write(&dem, b"stub").unwrap();
        let config = RuntimeConfig {
            dem_path: Some(dem.clone()),
            data_root: Some(dir.path().to_path_buf()),
            ..base_config()
        };
        assert_eq!(resolve_dem(&config).unwrap(), DemSource::Local(dem));
    }

    #[test]
    fn remote_mode_requires_root() {
        let config = RuntimeConfig {
            use_remote_dem: true,
            ..base_config()
        };
        match resolve_dem(&config) {
            Err(Error::Configuration(msg)) => assert!(msg.contains("S3_DB_URL_ROOT")),
            other => panic!("expected Configuration, got {other:?}"),
        }
    }

    #[test]
    fn remote_mode_builds_url() {
        let config = RuntimeConfig {
            use_remote_dem: true,
            s3_root: Some("https://db.example.com/data/".to_string()),
            ..base_config()
        };
        match resolve_dem(&config).unwrap() {
            DemSource::Remote(url) => {
                assert!(url.starts_with("https://db.example.com/data/GLOBAL/"));
                assert!(url.ends_with("MERIT_DEM.vrt"));
            }
            other => panic!("expected Remote, got {other:?}"),
        }
    }

    #[test]
    fn default_store_path() {
        let config = RuntimeConfig {
            data_root: Some(PathBuf::from("/db")),
            ..base_config()
        };
        match resolve_dem(&config).unwrap() {
            DemSource::Local(path) => assert_eq!(path, default_dem_path(Path::new("/db"))),
            other => panic!("expected Local, got {other:?}"),
        }
    }

    #[test]
    fn remote_gdal_path_uses_vsicurl() {
        let source = DemSource::Remote("https://x/y.vrt".to_string());
        assert_eq!(source.gdal_path(), PathBuf::from("/vsicurl/https://x/y.vrt"));
    }
}
