//! Minimal single-band GeoTIFF read/write, the raster I/O spec §1 keeps out
//! of the simulation core but the CLI still needs for fuel/slope/aspect
//! inputs and probability/intensity outputs.

use std::fs::File;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

use crate::error::{CliError, CliResult};

/// A decoded single-band raster: row-major `u8` samples, `rows * columns`
/// long.
#[derive(Debug, Clone)]
pub struct RasterGrid {
    pub rows: i32,
    pub columns: i32,
    pub data: Vec<u8>,
}

impl RasterGrid {
    #[must_use]
    pub fn value_at(&self, row: i32, column: i32) -> u8 {
        if row < 0 || column < 0 || row >= self.rows || column >= self.columns {
            return 0;
        }
        self.data[(row * self.columns + column) as usize]
    }

    pub fn read(path: &Path) -> CliResult<Self> {
        let file = File::open(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
        let mut decoder =
            Decoder::new(file).map_err(|source| CliError::TiffDecode { path: path.to_path_buf(), source })?;
        let (width, height) =
            decoder.dimensions().map_err(|source| CliError::TiffDecode { path: path.to_path_buf(), source })?;
        let image =
            decoder.read_image().map_err(|source| CliError::TiffDecode { path: path.to_path_buf(), source })?;
        let data = match image {
            DecodingResult::U8(bytes) => bytes,
            _ => return Err(CliError::UnsupportedRaster { path: path.to_path_buf() }),
        };
        Ok(RasterGrid { rows: height as i32, columns: width as i32, data })
    }
}

/// Write a row-major `u8` grid as a single-band grayscale GeoTIFF.
pub fn write_gray_u8(path: &Path, rows: i32, columns: i32, data: &[u8]) -> CliResult<()> {
    let file = File::create(path).map_err(|source| CliError::Io { path: path.to_path_buf(), source })?;
    let mut encoder =
        TiffEncoder::new(file).map_err(|source| CliError::TiffEncode { path: path.to_path_buf(), source })?;
    encoder
        .write_image::<colortype::Gray8>(columns as u32, rows as u32, data)
        .map_err(|source| CliError::TiffEncode { path: path.to_path_buf(), source })?;
    Ok(())
}

/// Scale a `[0, 1]` probability grid into a `u8` raster, row-major over
/// `rows x columns`, looking values up by cell hash.
#[must_use]
pub fn probability_to_u8(rows: i32, columns: i32, lookup: impl Fn(i32, i32) -> f64) -> Vec<u8> {
    let mut out = vec![0u8; (rows * columns) as usize];
    for row in 0..rows {
        for column in 0..columns {
            let p = lookup(row, column).clamp(0.0, 1.0);
            out[(row * columns + column) as usize] = (p * 255.0).round() as u8;
        }
    }
    out
}

#[must_use]
pub fn output_path(dir: &Path, prefix: &str, interim: bool, day_offset: i64, date: chrono::NaiveDate) -> PathBuf {
    let tag = if interim { "interim_" } else { "" };
    dir.join(format!("{tag}{prefix}_{day_offset:03}_{date}.tif"))
}
