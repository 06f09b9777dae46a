//! GDAL-backed raster I/O honoring the pipeline's read/write contract.
//!
//! `read` returns a masked, grid-aligned `BandArray` at a caller-chosen
//! pixel size or array size; reads walk the output in tiles so large
//! rasters never have to be resident at once. `write_stack` serializes one
//! multi-band GeoTIFF under a per-path write lock and removes partial
//! output on failure.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use gdal::raster::{Buffer, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, Array3};
use tracing::{debug, warn};

use crate::core::processing::stack::Stack;
use crate::core::processing::tiling::TileGrid;
use crate::error::{Error, Result};
use crate::types::DType;

/// Read window in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

/// One loaded band: pixel values on the requested grid, missing pixels as
/// NaN, plus the declared nodata sentinel and georeferencing.
#[derive(Debug, Clone)]
pub struct BandArray {
    /// (rows, cols) with NaN marking missing measurements.
    pub data: Array2<f32>,
    /// Sentinel used when the array is encoded/written.
    pub nodata: f32,
    /// Affine geotransform of this grid.
    pub transform: [f64; 6],
    /// Projection (WKT or EPSG code).
    pub projection: String,
    /// True once values have been scaled/filled for storage.
    pub encoded: bool,
}

impl BandArray {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Pixel size (x, y magnitude) of this grid.
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.transform[1].abs(), self.transform[5].abs())
    }
}

/// Options for a single raster read.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Target pixel size in dataset units; wins over `size` if both set.
    pub pixel_size: Option<f64>,
    /// Target array size (width, height).
    pub size: Option<(usize, usize)>,
    pub resampling: ResampleAlg,
    pub window: Option<RasterWindow>,
    /// 1-based band index within the source file.
    pub index: usize,
    pub tile_size: usize,
    pub tiled: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            pixel_size: None,
            size: None,
            resampling: ResampleAlg::NearestNeighbour,
            window: None,
            index: 1,
            tile_size: crate::core::config::DEFAULT_TILE_SIZE,
            tiled: true,
        }
    }
}

fn is_known_raster_ext(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("tif") | Some("tiff") | Some("jp2")
    )
}

/// Open a dataset, mapping failures on existing raster files to
/// `InvalidProduct` ("known corruption") while re-raising anything else
/// unchanged.
pub fn open_dataset(path: &Path) -> Result<Dataset> {
    Dataset::open(path).map_err(|err| {
        if is_known_raster_ext(path) && path.exists() {
            Error::InvalidProduct(format!("Corrupted file: {}", path.display()))
        } else {
            Error::Gdal(err)
        }
    })
}

/// Georeferenced extent of a raster file, without reading pixels.
pub fn dataset_extent(path: &Path) -> Result<crate::core::geometry::Extent> {
    let ds = open_dataset(path)?;
    let (cols, rows) = ds.raster_size();
    let gt = ds.geo_transform().unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    let corners = [
        (0.0, 0.0),
        (cols as f64, 0.0),
        (0.0, rows as f64),
        (cols as f64, rows as f64),
    ];
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (px, py) in corners {
        let x = gt[0] + px * gt[1] + py * gt[2];
        let y = gt[3] + px * gt[4] + py * gt[5];
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Ok(crate::core::geometry::Extent {
        min_x,
        min_y,
        max_x,
        max_y,
        projection: ds.projection(),
    })
}

/// Read one band of a raster as a masked `BandArray`.
///
/// Exactly one of `pixel_size`/`size` is honored (pixel size wins).
/// Unscaled reads are chunked over the output grid when tiling is
/// enabled; a resampled read is always one raster-I/O call, so kernel
/// support and pixel-center mapping never depend on chunk layout and
/// results are identical for any tile size.
pub fn read(path: &Path, opts: &ReadOptions) -> Result<BandArray> {
    let ds = open_dataset(path)?;
    let (src_cols, src_rows) = ds.raster_size();
    let band_count = ds.raster_count() as usize;
    if opts.index == 0 || opts.index > band_count {
        return Err(Error::Processing(format!(
            "Band index {} out of range for {} ({} bands)",
            opts.index,
            path.display(),
            band_count
        )));
    }

    let gt = ds.geo_transform().unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
    let window = opts.window.unwrap_or(RasterWindow {
        col_off: 0,
        row_off: 0,
        cols: src_cols,
        rows: src_rows,
    });

    // Output grid: explicit resolution takes priority over a target size
    let (out_cols, out_rows) = if let Some(pixel_size) = opts.pixel_size {
        let px_x = gt[1].abs().max(f64::EPSILON);
        let px_y = gt[5].abs().max(f64::EPSILON);
        (
            ((window.cols as f64 * px_x / pixel_size).round() as usize).max(1),
            ((window.rows as f64 * px_y / pixel_size).round() as usize).max(1),
        )
    } else if let Some((width, height)) = opts.size {
        (width.max(1), height.max(1))
    } else {
        (window.cols, window.rows)
    };

    // Geotransform of the resampled window
    let scale_x = window.cols as f64 / out_cols as f64;
    let scale_y = window.rows as f64 / out_rows as f64;
    let transform = [
        gt[0] + window.col_off as f64 * gt[1],
        gt[1] * scale_x,
        gt[2],
        gt[3] + window.row_off as f64 * gt[5],
        gt[4],
        gt[5] * scale_y,
    ];

    let band = ds.rasterband(opts.index)?;
    let nodata = band.no_data_value();
    let scale = band.scale().unwrap_or(1.0);
    let offset = band.offset().unwrap_or(0.0);

    // Chunk only when the output grid is 1:1 with the source window.
    // A scaled read goes through a single raster-I/O call: splitting it
    // would hand the resampling kernel per-tile sub-windows with their
    // own rounding of the source/output ratio and no source context
    // past the tile edge, shifting values with the tile size.
    let resampled = (out_cols, out_rows) != (window.cols, window.rows);
    let grid = if opts.tiled && !resampled {
        TileGrid::new(out_rows, out_cols, opts.tile_size)
    } else {
        TileGrid::whole(out_rows, out_cols)
    };
    debug!(
        "Reading {} band {} as {}x{} in {} tile(s)",
        path.display(),
        opts.index,
        out_cols,
        out_rows,
        grid.tile_count()
    );

    let mut data = Array2::<f32>::zeros((out_rows, out_cols));
    for tile in grid.tiles() {
        // Source sub-window backing this output tile. Tiled grids are
        // 1:1 with the source window so this is a plain offset; the
        // whole-grid case maps the full window in one call.
        let src_x0 = window.col_off + tile.col_off * window.cols / out_cols;
        let src_x1 = window.col_off + (tile.col_off + tile.cols) * window.cols / out_cols;
        let src_y0 = window.row_off + tile.row_off * window.rows / out_rows;
        let src_y1 = window.row_off + (tile.row_off + tile.rows) * window.rows / out_rows;
        let src_w = (src_x1 - src_x0).max(1);
        let src_h = (src_y1 - src_y0).max(1);

        let buf = band.read_as::<f32>(
            (src_x0 as isize, src_y0 as isize),
            (src_w, src_h),
            (tile.cols, tile.rows),
            Some(opts.resampling),
        )?;
        let values = buf.data();
        for r in 0..tile.rows {
            for c in 0..tile.cols {
                let mut v = values[r * tile.cols + c];
                let missing = match nodata {
                    Some(nd) => (v as f64 - nd).abs() < f64::EPSILON || !v.is_finite(),
                    None => !v.is_finite(),
                };
                if missing {
                    v = f32::NAN;
                } else if scale != 1.0 || offset != 0.0 {
                    v = (v as f64 * scale + offset) as f32;
                }
                data[(tile.row_off + r, tile.col_off + c)] = v;
            }
        }
    }

    Ok(BandArray {
        data,
        nodata: nodata.unwrap_or(f64::from(crate::core::processing::stack::UINT16_NODATA)) as f32,
        transform,
        projection: ds.projection(),
        encoded: false,
    })
}

/// A multi-band raster file read back in full.
///
/// The band axis is renumbered to a dense 1..N sequence: array position is
/// band identity within this read, regardless of any upstream sub-band
/// numbering.
#[derive(Debug, Clone)]
pub struct StackFile {
    pub data: Array3<f32>,
    /// Band descriptions, or "1".."N" when the file carries none.
    pub band_names: Vec<String>,
    pub nodata: Option<f64>,
    pub dtype: DType,
    pub transform: [f64; 6],
    pub projection: String,
}

/// Read every band of a multi-band raster.
pub fn read_stack(path: &Path) -> Result<StackFile> {
    let ds = open_dataset(path)?;
    let (cols, rows) = ds.raster_size();
    let band_count = ds.raster_count() as usize;
    let gt = ds.geo_transform().unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    let mut data = Array3::<f32>::zeros((band_count, rows, cols));
    let mut band_names = Vec::with_capacity(band_count);
    let mut nodata = None;
    let mut dtype = DType::Float32;
    for idx in 1..=band_count {
        let band = ds.rasterband(idx)?;
        if idx == 1 {
            nodata = band.no_data_value();
            dtype = match band.band_type() {
                gdal::raster::GdalDataType::UInt16 => DType::Uint16,
                _ => DType::Float32,
            };
        }
        let description = band.description().unwrap_or_default();
        band_names.push(if description.is_empty() {
            idx.to_string()
        } else {
            description
        });
        let buf = band.read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)?;
        let plane = Array2::from_shape_vec((rows, cols), buf.data().to_vec())
            .map_err(|e| Error::Processing(format!("Band {idx} shape mismatch: {e}")))?;
        data.index_axis_mut(ndarray::Axis(0), idx - 1).assign(&plane);
    }

    Ok(StackFile {
        data,
        band_names,
        nodata,
        dtype,
        transform: gt,
        projection: ds.projection(),
    })
}

/// Per-path write locks, acquired only at write time.
///
/// Two concurrent stack calls targeting the same output file serialize
/// here; reads never take the lock.
fn write_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let locks = LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

#[derive(serde::Serialize)]
struct StackSidecar<'a> {
    bands: Vec<String>,
    nodata: f32,
    dtype: &'a str,
}

/// Write an assembled stack to one multi-band GeoTIFF, bands in stack
/// order, with descriptions, a single nodata value and a JSON sidecar.
/// Partial output is removed on any failure.
pub fn write_stack(stack: &Stack, dtype: DType, path: &Path) -> Result<()> {
    let lock = write_lock(path);
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let result = write_stack_inner(stack, dtype, path);
    if result.is_err() {
        // No partial stacks on disk
        if std::fs::remove_file(path).is_ok() {
            warn!("Removed partial stack output: {}", path.display());
        }
    }
    result
}

fn write_stack_inner(stack: &Stack, dtype: DType, path: &Path) -> Result<()> {
    let (band_count, rows, cols) = stack.data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;

    let mut ds = match dtype {
        DType::Uint16 => driver.create_with_band_type::<u16, _>(path, cols, rows, band_count)?,
        DType::Float32 => driver.create_with_band_type::<f32, _>(path, cols, rows, band_count)?,
    };
    ds.set_geo_transform(&stack.transform)?;
    if !stack.projection.is_empty() {
        ds.set_projection(&stack.projection)?;
    }

    for (i, &band_id) in stack.bands.iter().enumerate() {
        let plane = stack.data.index_axis(ndarray::Axis(0), i);
        let mut band = ds.rasterband(i + 1)?;
        band.set_description(&band_id.to_string())?;
        band.set_no_data_value(Some(f64::from(stack.nodata)))?;
        match dtype {
            DType::Uint16 => {
                let values: Vec<u16> = plane
                    .iter()
                    .map(|&v| v.round().clamp(0.0, 65535.0) as u16)
                    .collect();
                let mut buf = Buffer::new((cols, rows), values);
                band.write((0, 0), (cols, rows), &mut buf)?;
            }
            DType::Float32 => {
                let values: Vec<f32> = plane.iter().copied().collect();
                let mut buf = Buffer::new((cols, rows), values);
                band.write((0, 0), (cols, rows), &mut buf)?;
            }
        }
    }
    ds.flush_cache()?;

    let sidecar = StackSidecar {
        bands: stack.bands.iter().map(|b| b.to_string()).collect(),
        nodata: stack.nodata,
        dtype: match dtype {
            DType::Float32 => "float32",
            DType::Uint16 => "uint16",
        },
    };
    let sidecar_path = path.with_extension("json");
    let file = std::fs::File::create(&sidecar_path)?;
    serde_json::to_writer_pretty(file, &sidecar)
        .map_err(|e| Error::Processing(format!("Sidecar write failed: {e}")))?;
    debug!("Stack written: {}", path.display());
    Ok(())
}
