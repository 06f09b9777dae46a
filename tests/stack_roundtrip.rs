//! End-to-end stacking on synthetic products: load masking, band order,
//! the uint16 conversion policy, and reading written stacks back.
use std::path::{Path, PathBuf};

use gdal::DriverManager;
use gdal::raster::Buffer;

use eostack::{
    BandId, CleanMethod, DType, Error, FLOAT_NODATA, LoadOptions, Product, Resampling,
    RuntimeConfig, StackOptions, UINT16_NODATA, read_stack,
};

const PRODUCT_NAME: &str = "S2B_MSIL2A_20200114T065229_N0213_R020_T40REQ_20200114T094749";
const COLS: usize = 4;
const ROWS: usize = 4;
const MASKED_PIXEL: usize = 5;

fn write_tiff(path: &Path, values: Vec<f32>, nodata: Option<f64>) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut ds = driver
        .create_with_band_type::<f32, _>(path, COLS, ROWS, 1)
        .unwrap();
    ds.set_geo_transform(&[400000.0, 10.0, 0.0, 5000000.0, 0.0, -10.0])
        .unwrap();
    let mut band = ds.rasterband(1).unwrap();
    if let Some(nd) = nodata {
        band.set_no_data_value(Some(nd)).unwrap();
    }
    let mut buf = Buffer::new((COLS, ROWS), values);
    band.write((0, 0), (COLS, ROWS), &mut buf).unwrap();
    ds.flush_cache().unwrap();
}

fn red_values() -> Vec<f32> {
    let mut values: Vec<f32> = (0..COLS * ROWS)
        .map(|i| 0.1 + 0.02 * i as f32)
        .collect();
    values[MASKED_PIXEL] = 65535.0;
    values
}

fn nir_values() -> Vec<f32> {
    (0..COLS * ROWS).map(|i| 0.4 + 0.01 * i as f32).collect()
}

fn make_product(root: &Path) -> PathBuf {
    let dir = root.join(PRODUCT_NAME);
    std::fs::create_dir_all(&dir).unwrap();
    write_tiff(
        &dir.join("T40REQ_20200114T065229_B04_10m.tif"),
        red_values(),
        Some(65535.0),
    );
    write_tiff(
        &dir.join("T40REQ_20200114T065229_B08_10m.tif"),
        nir_values(),
        Some(65535.0),
    );
    dir
}

fn config() -> RuntimeConfig {
    RuntimeConfig {
        dem_path: None,
        data_root: None,
        ..RuntimeConfig::default()
    }
}

fn native_load() -> LoadOptions {
    LoadOptions::with_pixel_size(10.0)
}

#[test]
fn load_masks_nodata_and_keeps_shape() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    let bands = product
        .load(&[BandId::Red, BandId::Nir], &native_load())
        .unwrap();
    assert_eq!(bands.bands(), vec![BandId::Red, BandId::Nir]);

    let red = bands.get(BandId::Red).unwrap();
    assert_eq!(red.shape(), (ROWS, COLS));
    assert!(red.data[(1, 1)].is_nan(), "nodata pixel must load as NaN");
    assert!((red.data[(0, 0)] - 0.1).abs() < 1e-6);

    let nir = bands.get(BandId::Nir).unwrap();
    assert_eq!(nir.shape(), (ROWS, COLS));
    assert!(nir.data.iter().all(|v| v.is_finite()));
}

#[test]
fn load_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    let first = product.load(&[BandId::Red], &native_load()).unwrap();
    let second = product.load(&[BandId::Red], &native_load()).unwrap();
    let a = &first.get(BandId::Red).unwrap().data;
    let b = &second.get(BandId::Red).unwrap().data;
    assert_eq!(a.dim(), b.dim());
    for (&x, &y) in a.iter().zip(b.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn size_option_sets_output_shape() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    let bands = product
        .load(&[BandId::Red], &LoadOptions::with_size(2, 2))
        .unwrap();
    let red = bands.get(BandId::Red).unwrap();
    assert_eq!(red.shape(), (2, 2));
    // Half the samples each way doubles the pixel size
    let (px, py) = red.pixel_size();
    assert!((px - 20.0).abs() < 1e-9);
    assert!((py - 20.0).abs() < 1e-9);
}

#[test]
fn pixel_size_wins_over_size() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    let opts = LoadOptions {
        pixel_size: Some(10.0),
        ..LoadOptions::with_size(2, 2)
    };
    let bands = product.load(&[BandId::Red], &opts).unwrap();
    let red = bands.get(BandId::Red).unwrap();
    // The 10 m request keeps the native grid; the 2x2 size is ignored
    assert_eq!(red.shape(), (ROWS, COLS));
    let (px, _) = red.pixel_size();
    assert!((px - 10.0).abs() < 1e-9);
}

#[test]
fn resampled_reads_do_not_depend_on_tile_size() {
    let dir = tempfile::tempdir().unwrap();
    let prod_dir = make_product(dir.path());

    let tiny_tiles = RuntimeConfig {
        tile_size: 1,
        ..config()
    };
    let untiled = RuntimeConfig {
        tiled_reads: false,
        ..config()
    };
    // 15 m over a 4x4 10 m grid: 3 output pixels per axis, a ratio no
    // per-tile split could reproduce
    let opts = LoadOptions {
        resampling: Resampling::Bilinear,
        ..LoadOptions::with_pixel_size(15.0)
    };

    let a = Product::open(&prod_dir, tiny_tiles)
        .unwrap()
        .load(&[BandId::Nir], &opts)
        .unwrap();
    let b = Product::open(&prod_dir, untiled)
        .unwrap()
        .load(&[BandId::Nir], &opts)
        .unwrap();

    let a = &a.get(BandId::Nir).unwrap().data;
    let b = &b.get(BandId::Nir).unwrap().data;
    assert_eq!(a.dim(), (3, 3));
    assert_eq!(a.dim(), b.dim());
    for (&x, &y) in a.iter().zip(b.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn unscaled_tiled_read_matches_untiled() {
    let dir = tempfile::tempdir().unwrap();
    let prod_dir = make_product(dir.path());

    let tiny_tiles = RuntimeConfig {
        tile_size: 1,
        ..config()
    };
    let untiled = RuntimeConfig {
        tiled_reads: false,
        ..config()
    };

    let a = Product::open(&prod_dir, tiny_tiles)
        .unwrap()
        .load(&[BandId::Red], &native_load())
        .unwrap();
    let b = Product::open(&prod_dir, untiled)
        .unwrap()
        .load(&[BandId::Red], &native_load())
        .unwrap();

    let a = &a.get(BandId::Red).unwrap().data;
    let b = &b.get(BandId::Red).unwrap().data;
    assert_eq!(a.dim(), (ROWS, COLS));
    for (&x, &y) in a.iter().zip(b.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn clean_mode_masks_negative_reflectance() {
    let dir = tempfile::tempdir().unwrap();
    let prod_dir = dir.path().join(PRODUCT_NAME);
    std::fs::create_dir_all(&prod_dir).unwrap();
    let mut values = red_values();
    values[2] = -0.05;
    write_tiff(
        &prod_dir.join("T40REQ_20200114T065229_B04_10m.tif"),
        values,
        Some(65535.0),
    );
    let product = Product::open(&prod_dir, config()).unwrap();

    let kept = product.load(&[BandId::Red], &native_load()).unwrap();
    assert!((kept.get(BandId::Red).unwrap().data[(0, 2)] + 0.05).abs() < 1e-6);

    let opts = LoadOptions {
        clean_optical: CleanMethod::Clean,
        ..native_load()
    };
    let cleaned = product.load(&[BandId::Red], &opts).unwrap();
    assert!(cleaned.get(BandId::Red).unwrap().data[(0, 2)].is_nan());
}

#[test]
fn derived_index_matches_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    let bands = product.load(&[BandId::Ndvi], &native_load()).unwrap();
    let ndvi = bands.get(BandId::Ndvi).unwrap();
    assert_eq!(ndvi.shape(), (ROWS, COLS));

    let red = red_values();
    let nir = nir_values();
    let expected = (nir[0] - red[0]) / (nir[0] + red[0]);
    assert!((ndvi.data[(0, 0)] - expected).abs() < 1e-6);
    // NDVI over the masked red pixel is missing too
    assert!(ndvi.data[(1, 1)].is_nan());
}

#[test]
fn uint16_stack_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();
    let out = dir.path().join("stack.tif");

    let opts = StackOptions {
        save_as_int: true,
        ..Default::default()
    };
    let (stack, dtype) = product
        .stack(&[BandId::Nir, BandId::Red], Some(10.0), &out, &opts)
        .unwrap();
    assert_eq!(dtype, DType::Uint16);
    assert_eq!(stack.bands, vec![BandId::Nir, BandId::Red]);
    assert_eq!(stack.nodata, UINT16_NODATA);
    assert!(out.exists());
    assert!(out.with_extension("json").exists());

    let file = read_stack(&out).unwrap();
    assert_eq!(file.dtype, DType::Uint16);
    assert_eq!(file.band_names, vec!["NIR".to_string(), "RED".to_string()]);
    assert_eq!(file.nodata, Some(f64::from(UINT16_NODATA)));
    assert_eq!(file.data.dim(), (2, ROWS, COLS));

    // Reflectance scaled by 10000 on the way in
    assert_eq!(file.data[(0, 0, 0)], (nir_values()[0] * 10000.0).round());
    assert_eq!(file.data[(1, 0, 0)], (red_values()[0] * 10000.0).round());
    // Masked red pixel carries the sentinel
    assert_eq!(file.data[(1, 1, 1)], UINT16_NODATA);
}

#[test]
fn float_stack_uses_float_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();
    let out = dir.path().join("stack_f32.tif");

    let (stack, dtype) = product
        .stack(
            &[BandId::Red],
            Some(10.0),
            &out,
            &StackOptions::default(),
        )
        .unwrap();
    assert_eq!(dtype, DType::Float32);
    assert_eq!(stack.nodata, FLOAT_NODATA);

    let file = read_stack(&out).unwrap();
    assert_eq!(file.dtype, DType::Float32);
    assert_eq!(file.data[(0, 1, 1)], FLOAT_NODATA);
    assert!((file.data[(0, 0, 0)] - 0.1).abs() < 1e-6);
}

#[test]
fn unmapped_band_fails_without_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();
    let out = dir.path().join("never.tif");

    let result = product.stack(&[BandId::Vv], Some(10.0), &out, &StackOptions::default());
    match result {
        Err(Error::BandNotFound { band, .. }) => assert_eq!(band, BandId::Vv),
        other => panic!("expected BandNotFound, got {other:?}"),
    }
    assert!(!out.exists());
}

#[test]
fn terrain_band_without_dem_is_missing_auxiliary_data() {
    let dir = tempfile::tempdir().unwrap();
    let product = Product::open(&make_product(dir.path()), config()).unwrap();

    assert!(!product.has_band(BandId::Slope));
    match product.load(&[BandId::Slope], &native_load()) {
        Err(Error::MissingAuxiliaryData { band, .. }) => assert_eq!(band, BandId::Slope),
        other => panic!("expected MissingAuxiliaryData, got {other:?}"),
    }
}
