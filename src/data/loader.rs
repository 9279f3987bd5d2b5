use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::matdate::datenums_to_datetimes;
use super::model::{Bundle, Channel, ChannelGroup, Dataset, Timestamp};
use crate::units::{split_unit_suffix, unit_text};

// ---------------------------------------------------------------------------
// Bulk loading
// ---------------------------------------------------------------------------

/// Load a list of files into a [`Bundle`].
///
/// A missing file is logged and skipped; a file that fails to parse is
/// logged and skipped; loading always continues with the remaining inputs.
/// Nothing propagates out of here.
pub fn load_files(paths: &[PathBuf]) -> Bundle {
    let mut bundle = Bundle::default();
    for path in paths {
        if !path.exists() {
            log::warn!("File not found: {}", path.display());
            continue;
        }
        match load_file(path) {
            Ok(dataset) => {
                let summary = dataset.summary();
                log::info!(
                    "Loaded {} ({} channels, {} records)",
                    dataset.name,
                    dataset.channel_count(),
                    summary.records
                );
                bundle.insert(dataset);
            }
            Err(e) => {
                log::error!("Error loading {}: {e:#}", path.display());
            }
        }
    }
    bundle
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a single file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` / `.pq` – model result time series (`time` column plus one
///   numeric column per channel)
/// * `.csv`     – same layout as text
/// * `.json`    – observation file: nested named structs where any `Time`
///   field holds MATLAB datenums and its numeric siblings are channels
pub fn load_file(path: &Path) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let groups = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path)?,
        "csv" => load_csv(path)?,
        "json" => load_obs_json(path)?,
        other => bail!("Unsupported file extension: .{other}"),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset")
        .to_string();

    Ok(Dataset {
        name,
        path: path.to_path_buf(),
        groups,
    })
}

// ---------------------------------------------------------------------------
// Timestamp parsing (CSV and string-typed Parquet columns)
// ---------------------------------------------------------------------------

/// Parse one timestamp cell.  Accepts RFC 3339, `%Y-%m-%d %H:%M:%S`
/// (optionally fractional), `%Y-%m-%dT%H:%M:%S`, or a bare date.
fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let t = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Interpret an integer time cell as a Unix epoch value.  Anything beyond
/// ~5000 years in seconds is taken to be milliseconds.
fn epoch_to_timestamp(raw: i64) -> Option<Timestamp> {
    const MILLIS_CUTOFF: i64 = 100_000_000_000;
    let millis = if raw.abs() >= MILLIS_CUTOFF { raw } else { raw.checked_mul(1_000)? };
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Case-insensitive test for the time column of a model result file.
fn is_time_header(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "time" | "datetime" | "date")
}

// ---------------------------------------------------------------------------
// CSV loader (model results)
// ---------------------------------------------------------------------------

/// CSV layout: header row with a `time` column and one numeric column per
/// channel; channel headers may carry a `[unit]` suffix.  Empty cells become
/// NaN so gaps survive into the plot.
fn load_csv(path: &Path) -> Result<Vec<ChannelGroup>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let time_idx = headers
        .iter()
        .position(|h| is_time_header(h))
        .context("CSV missing a 'time' column")?;

    let mut time: Vec<Timestamp> = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let cell = record.get(time_idx).unwrap_or("");
        let ts = parse_timestamp(cell)
            .or_else(|| cell.trim().parse::<i64>().ok().and_then(epoch_to_timestamp))
            .with_context(|| format!("CSV row {row_no}: bad timestamp '{cell}'"))?;
        time.push(ts);

        for (col_idx, value) in record.iter().enumerate() {
            if col_idx == time_idx {
                continue;
            }
            let v = if value.trim().is_empty() {
                f64::NAN
            } else {
                value.trim().parse::<f64>().with_context(|| {
                    format!("CSV row {row_no}, '{}': '{value}' is not a number", headers[col_idx])
                })?
            };
            columns[col_idx].push(v);
        }
    }

    let channels = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(i, header)| {
            let (name, unit) = split_unit_suffix(header);
            let unit = unit.map(|u| unit_text(&u));
            Channel::new(name, unit, std::mem::take(&mut columns[i]))
        })
        .collect();

    Ok(vec![ChannelGroup::new("", time, channels)?])
}

// ---------------------------------------------------------------------------
// Parquet loader (model results)
// ---------------------------------------------------------------------------

/// Load a Parquet model result file.
///
/// Expected schema: a `time` column (Arrow timestamp of any unit, epoch
/// integers, or timestamp strings) and Float/Int channel columns.  Channel
/// headers may carry a `[unit]` suffix, matching what the CSV path accepts.
fn load_parquet(path: &Path) -> Result<Vec<ChannelGroup>> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut time: Vec<Timestamp> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    let mut units: Vec<Option<String>> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let time_idx = schema
            .fields()
            .iter()
            .position(|f| is_time_header(f.name()))
            .context("Parquet file missing a 'time' column")?;

        extract_time_column(batch.column(time_idx), &mut time)?;

        let channel_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != time_idx)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        // First batch fixes the channel layout.
        if names.is_empty() {
            for (_, header) in &channel_cols {
                let (name, unit) = split_unit_suffix(header);
                names.push(name);
                units.push(unit.map(|u| unit_text(&u)));
                columns.push(Vec::new());
            }
        }

        for (slot, (col_idx, header)) in channel_cols.iter().enumerate() {
            let col = batch.column(*col_idx);
            extract_f64_column(col, &mut columns[slot])
                .with_context(|| format!("column '{header}'"))?;
        }
    }

    let channels = names
        .into_iter()
        .zip(units)
        .zip(columns)
        .map(|((name, unit), values)| Channel::new(name, unit, values))
        .collect();

    Ok(vec![ChannelGroup::new("", time, channels)?])
}

// -- Arrow helpers --

/// Append the time column of one batch, whatever its physical type.
fn extract_time_column(col: &Arc<dyn Array>, out: &mut Vec<Timestamp>) -> Result<()> {
    match col.data_type() {
        DataType::Timestamp(unit, _) => {
            for row in 0..col.len() {
                if col.is_null(row) {
                    bail!("null timestamp at row {row}");
                }
                let millis = match unit {
                    TimeUnit::Second => {
                        let arr = col.as_any().downcast_ref::<TimestampSecondArray>().unwrap();
                        arr.value(row) * 1_000
                    }
                    TimeUnit::Millisecond => {
                        let arr = col
                            .as_any()
                            .downcast_ref::<TimestampMillisecondArray>()
                            .unwrap();
                        arr.value(row)
                    }
                    TimeUnit::Microsecond => {
                        let arr = col
                            .as_any()
                            .downcast_ref::<TimestampMicrosecondArray>()
                            .unwrap();
                        arr.value(row) / 1_000
                    }
                    TimeUnit::Nanosecond => {
                        let arr = col
                            .as_any()
                            .downcast_ref::<TimestampNanosecondArray>()
                            .unwrap();
                        arr.value(row) / 1_000_000
                    }
                };
                let ts = DateTime::from_timestamp_millis(millis)
                    .map(|dt| dt.naive_utc())
                    .with_context(|| format!("timestamp out of range at row {row}"))?;
                out.push(ts);
            }
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            for row in 0..arr.len() {
                let ts = epoch_to_timestamp(arr.value(row))
                    .with_context(|| format!("epoch out of range at row {row}"))?;
                out.push(ts);
            }
        }
        DataType::Utf8 => {
            let arr = col.as_any().downcast_ref::<StringArray>().unwrap();
            for row in 0..arr.len() {
                let cell = arr.value(row);
                let ts = parse_timestamp(cell)
                    .with_context(|| format!("bad timestamp '{cell}' at row {row}"))?;
                out.push(ts);
            }
        }
        other => bail!("unsupported time column type {other:?}"),
    }
    Ok(())
}

/// Append a numeric channel column, null → NaN so gaps draw as gaps.
fn extract_f64_column(col: &Arc<dyn Array>, out: &mut Vec<f64>) -> Result<()> {
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(f64::NAN)));
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        out.extend(arr.iter().map(|v| v.map(f64::from).unwrap_or(f64::NAN)));
    } else if let Some(arr) = col.as_any().downcast_ref::<Int64Array>() {
        out.extend(arr.iter().map(|v| v.map(|i| i as f64).unwrap_or(f64::NAN)));
    } else if let Some(arr) = col.as_any().downcast_ref::<Int32Array>() {
        out.extend(arr.iter().map(|v| v.map(f64::from).unwrap_or(f64::NAN)));
    } else {
        bail!("expected a numeric column, got {:?}", col.data_type());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON observation loader
// ---------------------------------------------------------------------------

/// Load an observation file: nested named structures where any struct
/// carrying a `Time` field (case-insensitive, MATLAB datenums) becomes a
/// channel group, and every sibling numeric array of the same length becomes
/// a channel named by its structural path.
///
/// Example:
/// ```json
/// { "profileStruct": { "Bins": [
///     { "Time": [738928.0, ...], "Speed": [0.41, ...] },
///     ...
/// ] } }
/// ```
/// yields groups `profileStruct.Bins[0]`, `profileStruct.Bins[1]`, … each
/// with a `Speed` channel.
fn load_obs_json(path: &Path) -> Result<Vec<ChannelGroup>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let mut groups = Vec::new();
    walk_obs(&root, String::new(), &mut groups)?;
    if groups.is_empty() {
        bail!("no 'Time'-bearing structs found in {}", path.display());
    }
    Ok(groups)
}

fn walk_obs(value: &JsonValue, path: String, groups: &mut Vec<ChannelGroup>) -> Result<()> {
    match value {
        JsonValue::Object(obj) => {
            // A Time field turns this struct into a channel group.
            let time_entry = obj
                .iter()
                .find(|(k, v)| k.to_lowercase() == "time" && v.is_array());
            if let Some((time_key, time_val)) = time_entry {
                let datenums = numeric_array(time_val).with_context(|| {
                    format!("'{path}': Time field is not a numeric array")
                })?;
                let time = datenums_to_datetimes(&datenums).with_context(|| {
                    format!("'{path}': Time field holds invalid datenums")
                })?;

                let mut channels = Vec::new();
                for (key, val) in obj {
                    if key == time_key {
                        continue;
                    }
                    if let Some(values) = numeric_array(val) {
                        if values.len() != time.len() {
                            bail!(
                                "'{path}': '{key}' has {} values but Time has {}",
                                values.len(),
                                time.len()
                            );
                        }
                        channels.push(Channel::new(key.clone(), None, values));
                    }
                }
                if !channels.is_empty() {
                    groups.push(ChannelGroup::new(path.clone(), time, channels)?);
                }
            }
            // Recurse into nested structs either way.
            for (key, val) in obj {
                if key.starts_with("__") {
                    continue; // mat-file header variables
                }
                if val.is_object() || contains_objects(val) {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    walk_obs(val, child, groups)?;
                }
            }
        }
        JsonValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.is_object() || contains_objects(item) {
                    walk_obs(item, format!("{path}[{i}]"), groups)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Read a JSON value as a flat numeric array; nulls become NaN.
fn numeric_array(value: &JsonValue) -> Option<Vec<f64>> {
    let arr = value.as_array()?;
    arr.iter()
        .map(|v| match v {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::Null => Some(f64::NAN),
            _ => None,
        })
        .collect()
}

fn contains_objects(value: &JsonValue) -> bool {
    value
        .as_array()
        .is_some_and(|a| a.iter().any(|v| v.is_object()))
}
