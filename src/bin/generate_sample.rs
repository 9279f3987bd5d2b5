//! Generate sample input files for hydroval: a model result Parquet file
//! with tidal current/level channels and an observation JSON file shaped
//! like an exported ADCP mat-struct (per-bin `Time` datenum arrays).
//!
//! Usage: `cargo run --bin generate_sample [output_dir]`

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parquet::arrow::ArrowWriter;
use serde_json::json;

use hydroval::data::matdate::datetime_to_datenum;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller.
    fn gauss(&mut self, mu: f64, sigma: f64) -> f64 {
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        mu + sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// Depth-averaged tidal current speed: M2 + S2 constituents over a mean
/// flow, never negative.
fn tidal_speed(hours: f64, mean: f64, m2_amp: f64, s2_amp: f64) -> f64 {
    let m2 = m2_amp * (std::f64::consts::TAU * hours / 12.42).sin();
    let s2 = s2_amp * (std::f64::consts::TAU * hours / 12.0).sin();
    (mean + m2 + s2).max(0.0)
}

fn main() -> anyhow::Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_data"));
    std::fs::create_dir_all(&out_dir)?;

    let start = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    write_model_parquet(&out_dir.join("MAOB1.parquet"), start)?;
    write_obs_json(&out_dir.join("MAOB1_adcp.json"), start)?;

    println!("Sample files written to {}", out_dir.display());
    Ok(())
}

/// Model output: 10 days at 30-minute resolution.
fn write_model_parquet(path: &PathBuf, start: NaiveDateTime) -> anyhow::Result<()> {
    let mut rng = SimpleRng::new(42);
    let steps = 10 * 48;

    let mut times = Vec::with_capacity(steps);
    let mut speed = Vec::with_capacity(steps);
    let mut direction = Vec::with_capacity(steps);
    let mut level = Vec::with_capacity(steps);

    for i in 0..steps {
        let t = start + Duration::minutes(30 * i as i64);
        let hours = i as f64 * 0.5;
        times.push(t.and_utc().timestamp_millis());
        speed.push(tidal_speed(hours, 0.45, 0.30, 0.10) + rng.gauss(0.0, 0.02));
        direction.push(
            (180.0 + 160.0 * (std::f64::consts::TAU * hours / 12.42).cos()
                + rng.gauss(0.0, 5.0))
            .rem_euclid(360.0),
        );
        level.push(1.8 * (std::f64::consts::TAU * hours / 12.42).cos() + rng.gauss(0.0, 0.05));
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new(
            "time",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("sur: Current speed [m/s]", DataType::Float64, false),
        Field::new(
            "sur: Current direction (Horizontal) [degree]",
            DataType::Float64,
            false,
        ),
        Field::new("Water Level [m]", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(TimestampMillisecondArray::from(times)) as ArrayRef,
            Arc::new(Float64Array::from(speed)) as ArrayRef,
            Arc::new(Float64Array::from(direction)) as ArrayRef,
            Arc::new(Float64Array::from(level)) as ArrayRef,
        ],
    )?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Observations: three ADCP bins at 10-minute resolution, offset from the
/// model grid so the asof join has work to do.
fn write_obs_json(path: &PathBuf, start: NaiveDateTime) -> anyhow::Result<()> {
    let mut rng = SimpleRng::new(7);
    let steps = 10 * 144;

    let mut bins = Vec::new();
    for (bin, shear) in [(0usize, 0.7), (1, 0.9), (2, 1.05)] {
        let mut time = Vec::with_capacity(steps);
        let mut speed = Vec::with_capacity(steps);
        for i in 0..steps {
            let t = start + Duration::minutes(10 * i as i64) + Duration::minutes(3);
            let hours = (t - start).num_minutes() as f64 / 60.0;
            time.push(datetime_to_datenum(t));
            speed.push(
                (tidal_speed(hours, 0.45, 0.30, 0.10) * shear + rng.gauss(0.0, 0.04)).max(0.0),
            );
        }
        bins.push(json!({
            "Bin": bin,
            "Depth": 2.0 + 3.0 * bin as f64,
            "Time": time,
            "Speed": speed,
        }));
    }

    let doc = json!({
        "__header__": "exported ADCP profile",
        "profileStruct": { "Bins": bins },
    });

    std::fs::write(path, serde_json::to_string(&doc)?)?;
    Ok(())
}
