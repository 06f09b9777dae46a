//! I/O layer: GDAL raster reads/writes and DEM source resolution.
pub mod dem;
pub mod raster;

pub use raster::{BandArray, RasterWindow, ReadOptions, StackFile};
