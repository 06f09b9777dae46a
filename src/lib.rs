#![doc = r#"
EOSTACK — multi-sensor satellite band loading and stacking.

This crate opens optical and SAR products straight from their delivered
directories, resolves logical band names (`RED`, `VV`, `SLOPE`, `NDVI`, ...)
to whatever the sensor actually ships, loads them masked onto a common
pixel grid, and writes analysis-ready multi-band GeoTIFF stacks. It powers
the `eostack` CLI and can be embedded in other Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: stack three bands of a Sentinel-2 product
------------------------------------------------------
```rust,no_run
use std::path::Path;
use eostack::{BandId, Product, RuntimeConfig, StackOptions};

fn main() -> eostack::Result<()> {
    let config = RuntimeConfig::from_env();
    let product = Product::open(
        Path::new("/data/S2B_MSIL2A_20200114T065229_N0213_R020_T40REQ_20200114T094749"),
        config,
    )?;

    let opts = StackOptions {
        save_as_int: true,
        ..Default::default()
    };
    let (_stack, dtype) = product.stack(
        &[BandId::Red, BandId::Nir, BandId::Ndvi],
        Some(20.0),
        Path::new("/out/stack.tif"),
        &opts,
    )?;
    println!("written as {dtype}");
    Ok(())
}
```

Loading bands without writing
-----------------------------
```rust,no_run
use std::path::Path;
use eostack::{BandId, LoadOptions, Product, RuntimeConfig};

fn main() -> eostack::Result<()> {
    let product = Product::open(Path::new("/data/S1A_IW_GRDH_1SDV_20191215T060906_20191215T060931_030355_0378F7_3696"), RuntimeConfig::from_env())?;
    let bands = product.load(
        &[BandId::Vv, BandId::VvDspk],
        &LoadOptions::with_pixel_size(100.0),
    )?;
    for (band, array) in bands.iter() {
        println!("{band}: {:?}", array.shape());
    }
    Ok(())
}
```

Error handling
--------------
All public functions return `eostack::Result<T>`; match on `eostack::Error`
to handle specific cases, e.g. an unmapped band or a missing DEM.

Useful modules
--------------
- [`core::product`] — product identity and the load/stack entry points.
- [`core::bands`] — per-sensor band mapping tables.
- [`types`] — enums and core types (`BandId`, `ProductType`, ...).
- [`io`] — GDAL raster reads/writes and DEM resolution.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::config::RuntimeConfig;
pub use core::params::{LoadOptions, StackOptions};
pub use error::{Error, Result};
pub use types::{BandId, CleanMethod, DType, ProductType, Resampling, SensorType};

// Products and geometry
pub use core::geometry::{Extent, Polygon};
pub use core::product::Product;

// Pipeline outputs
pub use core::processing::pipeline::BandSet;
pub use core::processing::stack::{FLOAT_NODATA, REFLECTANCE_SCALE, Stack, UINT16_NODATA};
pub use io::raster::{BandArray, StackFile, read_stack};
