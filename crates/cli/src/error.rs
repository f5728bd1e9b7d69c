//! CLI-level error taxonomy. Distinct from `firegrowth_core::CoreError`
//! (spec §7): this enum covers argument validation, raster/CSV I/O, and
//! fuel-lookup problems that never reach the simulation core at all.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse CSV {path}: {source}")]
    Csv { path: PathBuf, #[source] source: csv::Error },

    #[error("failed to decode raster {path}: {source}")]
    TiffDecode { path: PathBuf, #[source] source: tiff::TiffError },

    #[error("failed to encode raster {path}: {source}")]
    TiffEncode { path: PathBuf, #[source] source: tiff::TiffError },

    #[error("raster {path} has unsupported sample format (expected 8-bit grayscale)")]
    UnsupportedRaster { path: PathBuf },

    #[error("fuel lookup table references fuel type {0:?} with no known FBP coefficients")]
    UnknownFuelType(String),

    #[error("weather file error: {0}")]
    Weather(String),

    #[error(transparent)]
    Core(#[from] firegrowth_core::CoreError),
}

pub type CliResult<T> = Result<T, CliError>;
