use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use eostack::{BandId, Product, RuntimeConfig, StackOptions};

use super::args::CliArgs;
use super::errors::AppError;

fn stack_single_product(
    input: &Path,
    output: &Path,
    bands: &[BandId],
    pixel_size: Option<f64>,
    opts: &StackOptions,
    config: &RuntimeConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let product = Product::open(input, config.clone())?;
    info!(
        "Stacking {} band(s) of {} at {}",
        bands.len(),
        product.condensed_name(),
        pixel_size
            .map(|p| format!("{p} m"))
            .unwrap_or_else(|| "default resolution".to_string())
    );

    let (stack, dtype) = product.stack(bands, pixel_size, output, opts)?;
    let (n, rows, cols) = stack.data.dim();
    info!("Written {n}x{rows}x{cols} {dtype} stack: {}", output.display());
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    if args.bands.is_empty() {
        return Err(AppError::NoBands.into());
    }

    let mut config = RuntimeConfig::from_env();
    if let Some(dem) = &args.dem {
        config.dem_path = Some(dem.clone());
    }

    let opts = StackOptions {
        save_as_int: args.save_as_int,
        resampling: args.resampling,
        clean_optical: args.clean_optical,
    };

    let batch_mode = args.batch || args.input_dir.is_some();

    if batch_mode {
        let input_dir = args.input_dir.ok_or(AppError::MissingArgument {
            arg: "--input-dir".to_string(),
        })?;
        let output_dir = args.output_dir.ok_or(AppError::MissingArgument {
            arg: "--output-dir".to_string(),
        })?;

        fs::create_dir_all(&output_dir)?;

        info!("Starting batch stacking from directory: {:?}", input_dir);
        info!("Output directory: {:?}", output_dir);

        let mut processed = 0;
        let mut skipped = 0;
        let mut errors = 0;

        for entry in fs::read_dir(&input_dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                let output_path = batch_output_path(&output_dir, &path);
                info!("Processing: {:?} -> {:?}", path, output_path);

                match stack_single_product(
                    &path,
                    &output_path,
                    &args.bands,
                    args.pixel_size,
                    &opts,
                    &config,
                ) {
                    Ok(()) => {
                        info!("Successfully processed: {:?}\n", path);
                        processed += 1;
                    }
                    Err(e) => {
                        warn!("Error processing {:?}: {}", path, e);
                        errors += 1;
                    }
                }
            } else {
                info!("Skipping non-directory: {:?}", path);
                skipped += 1;
            }
        }

        info!("Batch stacking complete!");
        info!("Processed: {}", processed);
        info!("Skipped: {}", skipped);
        info!("Errors: {}", errors);
    } else {
        let input = args.input.ok_or(AppError::MissingArgument {
            arg: "--input".to_string(),
        })?;
        let output = args.output.ok_or(AppError::MissingArgument {
            arg: "--output".to_string(),
        })?;

        stack_single_product(
            &input,
            &output,
            &args.bands,
            args.pixel_size,
            &opts,
            &config,
        )?;
        info!("Successfully processed: {:?} -> {:?}\n", input, output);
    }

    Ok(())
}

fn batch_output_path(output_dir: &Path, product_dir: &Path) -> PathBuf {
    let name = product_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "stack".to_string());
    output_dir.join(format!("{name}_STACK.tif"))
}
