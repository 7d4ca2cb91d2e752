//! Bar file loading
//!
//! Replay input for the engine. Supported layouts:
//! - `*.csv` / `*.csv.zst`: header `timestamp,open,high,low,close[,volume]`
//! - `*.json` / `*.json.zst`: JSON array of bars
//!
//! A directory is loaded file by file (sorted by name) and the bars are
//! merged in timestamp order.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::BarObservation;

/// CSV row; timestamps may be RFC3339 or `YYYY-MM-DD HH:MM:SS` (UTC)
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "ts_event", alias = "time")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    CsvZst,
    Json,
    JsonZst,
}

fn detect_format(path: &Path) -> Option<Format> {
    let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".csv.zst") {
        Some(Format::CsvZst)
    } else if name.ends_with(".json.zst") {
        Some(Format::JsonZst)
    } else if name.ends_with(".csv") {
        Some(Format::Csv)
    } else if name.ends_with(".json") {
        Some(Format::Json)
    } else {
        None
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Failed to parse timestamp: {}", raw))?;
    Ok(naive.and_utc())
}

fn read_csv<R: Read>(reader: R) -> Result<Vec<BarObservation>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();

    for result in csv_reader.deserialize() {
        let row: CsvRow = result.with_context(|| "Failed to parse CSV row")?;
        bars.push(BarObservation {
            timestamp: parse_timestamp(&row.timestamp)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0),
        });
    }

    Ok(bars)
}

/// Load bars from a single file
pub fn load_bar_file(path: &Path) -> Result<Vec<BarObservation>> {
    let Some(format) = detect_format(path) else {
        bail!("Unsupported bar file: {:?}", path);
    };

    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let reader = BufReader::new(file);

    let bars = match format {
        Format::Csv => read_csv(reader)?,
        Format::CsvZst => {
            let decoder = zstd::stream::Decoder::new(reader)
                .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
            read_csv(BufReader::new(decoder))?
        }
        Format::Json => serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON bars: {:?}", path))?,
        Format::JsonZst => {
            let decoder = zstd::stream::Decoder::new(reader)
                .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
            serde_json::from_reader(BufReader::new(decoder))
                .with_context(|| format!("Failed to parse JSON bars: {:?}", path))?
        }
    };

    debug!("Loaded {} bars from {:?}", bars.len(), path);
    Ok(bars)
}

/// Write bars as zstd-compressed JSON
pub fn save_bars_json_zst(path: &Path, bars: &[BarObservation]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;
    let mut encoder = zstd::stream::Encoder::new(BufWriter::new(file), 3)?;
    serde_json::to_writer(&mut encoder, bars)?;
    encoder.finish()?;
    Ok(())
}

/// Extract an 8-digit date (YYYYMMDD) from a file name, if present
fn date_in_filename(path: &Path) -> Option<String> {
    let filename = path.file_name()?.to_string_lossy();
    filename
        .split(&['-', '_', '.'][..])
        .find(|part| part.len() == 8 && part.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Does the file name match a date filter?
///
/// Filter can be:
/// - Single date: "20250915"
/// - Month prefix: "202509"
/// - Date range: "20250901:20251120" (inclusive)
fn matches_filter(path: &Path, filter: &str) -> bool {
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();

    if let Some((start, end)) = filter.split_once(':') {
        return match date_in_filename(path) {
            Some(date) => date.as_str() >= start && date.as_str() <= end,
            None => false,
        };
    }
    filename.contains(filter)
}

/// Find bar files in a directory, optionally filtered by date
pub fn find_bar_files(dir: &Path, date_filter: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
    {
        let path = entry?.path();
        if detect_format(&path).is_none() {
            continue;
        }
        if let Some(filter) = date_filter {
            if !matches_filter(&path, filter) {
                continue;
            }
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

/// Load bars from a file or a directory of files, in timestamp order
pub fn load_bars(path: &Path, date_filter: Option<&str>) -> Result<Vec<BarObservation>> {
    if !path.is_dir() {
        return load_bar_file(path);
    }

    let files = find_bar_files(path, date_filter)?;
    info!("Loading {} bar files from {:?}", files.len(), path);

    let mut bars = Vec::new();
    for file in &files {
        bars.extend(load_bar_file(file)?);
    }
    // stable: bars sharing a timestamp keep file order
    bars.sort_by_key(|b| b.timestamp);

    info!("Loaded {} bars", bars.len());
    Ok(bars)
}
