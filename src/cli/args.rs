use clap::Parser;
use std::path::PathBuf;

use eostack::{BandId, CleanMethod, Resampling};

#[derive(Parser)]
#[command(name = "eostack", version, about = "EOSTACK CLI")]
pub struct CliArgs {
    /// Input product directory (single product mode)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Input directory containing product subdirectories (batch mode)
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output stack filename (single product mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (batch mode)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Bands to stack, in output order (e.g. red,nir,ndvi)
    #[arg(short, long, value_enum, value_delimiter = ',', required = true)]
    pub bands: Vec<BandId>,

    /// Target pixel size in dataset units (defaults to the product policy)
    #[arg(long)]
    pub pixel_size: Option<f64>,

    /// Resampling algorithm for reads
    #[arg(long, value_enum, default_value_t = Resampling::Nearest)]
    pub resampling: Resampling,

    /// Convert the stack to uint16 when the data allows it
    #[arg(long, default_value_t = false)]
    pub save_as_int: bool,

    /// Cleaning mode for optical bands
    #[arg(long, value_enum, default_value_t = CleanMethod::Nodata)]
    pub clean_optical: CleanMethod,

    /// Explicit DEM path for terrain bands (overrides the environment)
    #[arg(long)]
    pub dem: Option<PathBuf>,

    /// Enable logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Batch mode: continue with the other products when one fails
    #[arg(long, default_value_t = false)]
    pub batch: bool,
}
