use std::str::FromStr;

use chrono::Duration;

use crate::data::error::DataError;
use crate::data::model::{TimeSeries, Timestamp};

// ---------------------------------------------------------------------------
// Alignment options
// ---------------------------------------------------------------------------

/// How two independently-sampled series are put on a common time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMethod {
    /// Exact timestamp intersection.
    Inner,
    /// Union of timestamps, missing sides marked NaN.  Because every NaN row
    /// is dropped afterwards this ends up row-for-row identical to `Inner`;
    /// the original scripts behave the same way and the behavior is kept
    /// rather than fixed.
    Outer,
    /// Nearest observed timestamp within tolerance, per model timestamp.
    Asof,
}

impl AlignMethod {
    pub const ALL: [AlignMethod; 3] = [AlignMethod::Asof, AlignMethod::Inner, AlignMethod::Outer];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlignMethod::Inner => "inner",
            AlignMethod::Outer => "outer",
            AlignMethod::Asof => "asof",
        }
    }
}

impl FromStr for AlignMethod {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inner" => Ok(AlignMethod::Inner),
            "outer" => Ok(AlignMethod::Outer),
            "asof" => Ok(AlignMethod::Asof),
            other => Err(DataError::UnknownMethod(other.to_string())),
        }
    }
}

/// Per-bucket aggregation used when resampling onto a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResampleAgg {
    Mean,
    Median,
    Sum,
}

impl ResampleAgg {
    pub const ALL: [ResampleAgg; 3] = [ResampleAgg::Mean, ResampleAgg::Median, ResampleAgg::Sum];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResampleAgg::Mean => "mean",
            ResampleAgg::Median => "median",
            ResampleAgg::Sum => "sum",
        }
    }

    /// Aggregate the finite values of one bucket.  NaNs are skipped;
    /// mean/median of nothing is NaN, sum of nothing is 0.
    fn apply(&self, values: &[f64]) -> f64 {
        let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        match self {
            ResampleAgg::Sum => finite.iter().sum(),
            ResampleAgg::Mean => {
                if finite.is_empty() {
                    f64::NAN
                } else {
                    finite.iter().sum::<f64>() / finite.len() as f64
                }
            }
            ResampleAgg::Median => {
                if finite.is_empty() {
                    return f64::NAN;
                }
                finite.sort_by(f64::total_cmp);
                let mid = finite.len() / 2;
                if finite.len() % 2 == 1 {
                    finite[mid]
                } else {
                    (finite[mid - 1] + finite[mid]) / 2.0
                }
            }
        }
    }
}

impl FromStr for ResampleAgg {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(ResampleAgg::Mean),
            "median" => Ok(ResampleAgg::Median),
            "sum" => Ok(ResampleAgg::Sum),
            other => Err(DataError::UnknownAggregation(other.to_string())),
        }
    }
}

/// Full alignment configuration.  Resampling and method choice are
/// orthogonal: when `resample` is set, both series are regridded
/// independently before the method runs.
#[derive(Debug, Clone, Copy)]
pub struct AlignOptions {
    pub method: AlignMethod,
    /// Maximum model-to-observation gap accepted by `asof`.
    pub tolerance: Duration,
    /// Optional fixed-width grid applied to both series first.
    pub resample: Option<Duration>,
    pub agg: ResampleAgg,
}

impl Default for AlignOptions {
    fn default() -> Self {
        AlignOptions {
            method: AlignMethod::Asof,
            tolerance: Duration::minutes(10),
            resample: None,
            agg: ResampleAgg::Mean,
        }
    }
}

// ---------------------------------------------------------------------------
// Aligned pair table
// ---------------------------------------------------------------------------

/// One reconciled (timestamp, model, observed) row.  Both values are finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow {
    pub time: Timestamp,
    pub model: f64,
    pub obs: f64,
}

/// The reconciled pair table; rows are in ascending time order.
#[derive(Debug, Clone, Default)]
pub struct AlignedTable {
    pub rows: Vec<AlignedRow>,
}

impl AlignedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn model_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.model).collect()
    }

    pub fn obs_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.obs).collect()
    }
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Regrid a series onto fixed-width buckets, aggregating each bucket.
/// Bucket labels are the floored bucket start, and the grid runs
/// contiguously from the first to the last occupied bucket: a bucket with
/// no samples in between aggregates over nothing (NaN for mean/median,
/// 0 for sum).
pub fn resample(series: &TimeSeries, bucket: Duration, agg: ResampleAgg) -> TimeSeries {
    let bucket_ms = bucket.num_milliseconds().max(1);

    // Input is time-sorted, so each occupied bucket is contiguous.
    let mut occupied: Vec<(i64, Vec<f64>)> = Vec::new();
    for (&t, &v) in series.times.iter().zip(&series.values) {
        let ms = t.and_utc().timestamp_millis();
        let floored = ms.div_euclid(bucket_ms) * bucket_ms;
        match occupied.last_mut() {
            Some((label, values)) if *label == floored => values.push(v),
            _ => occupied.push((floored, vec![v])),
        }
    }

    let mut times = Vec::new();
    let mut values = Vec::new();
    if let (Some(&(first, _)), Some(&(last, _))) = (occupied.first(), occupied.last()) {
        let mut next = occupied.iter().peekable();
        let mut label_ms = first;
        while label_ms <= last {
            let Some(label) =
                chrono::DateTime::from_timestamp_millis(label_ms).map(|dt| dt.naive_utc())
            else {
                break;
            };
            let value = match next.peek() {
                Some((bucket_label, samples)) if *bucket_label == label_ms => {
                    let v = agg.apply(samples);
                    next.next();
                    v
                }
                _ => agg.apply(&[]),
            };
            times.push(label);
            values.push(value);
            label_ms += bucket_ms;
        }
    }

    TimeSeries {
        name: series.name.clone(),
        unit: series.unit.clone(),
        times,
        values,
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// Reconcile a model series and an observed series onto a common time base.
///
/// Whatever the method, any row with a non-finite value on either side is
/// dropped, so every surviving row is a complete finite pair.
pub fn align(model: &TimeSeries, obs: &TimeSeries, options: &AlignOptions) -> AlignedTable {
    let (resampled_model, resampled_obs);
    let (m, o) = match options.resample {
        Some(bucket) => {
            resampled_model = resample(model, bucket, options.agg);
            resampled_obs = resample(obs, bucket, options.agg);
            (&resampled_model, &resampled_obs)
        }
        None => (model, obs),
    };

    let rows = match options.method {
        AlignMethod::Inner => align_inner(m, o),
        AlignMethod::Outer => align_outer(m, o),
        AlignMethod::Asof => align_asof(m, o, options.tolerance),
    };

    AlignedTable {
        rows: rows
            .into_iter()
            .filter(|r| r.model.is_finite() && r.obs.is_finite())
            .collect(),
    }
}

/// Exact timestamp intersection; duplicate timestamps collapse to their
/// first occurrence so no two output rows share a timestamp.
fn align_inner(model: &TimeSeries, obs: &TimeSeries) -> Vec<AlignedRow> {
    let mut rows = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < model.len() && j < obs.len() {
        let (tm, to) = (model.times[i], obs.times[j]);
        if tm < to {
            i += 1;
        } else if tm > to {
            j += 1;
        } else {
            rows.push(AlignedRow {
                time: tm,
                model: model.values[i],
                obs: obs.values[j],
            });
            while i < model.len() && model.times[i] == tm {
                i += 1;
            }
            while j < obs.len() && obs.times[j] == tm {
                j += 1;
            }
        }
    }
    rows
}

/// Union of timestamps, missing sides filled with NaN.  The caller's
/// unconditional NaN drop then reduces this to the intersection.
fn align_outer(model: &TimeSeries, obs: &TimeSeries) -> Vec<AlignedRow> {
    let mut rows = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < model.len() || j < obs.len() {
        let tm = model.times.get(i).copied();
        let to = obs.times.get(j).copied();
        let row = match (tm, to) {
            (Some(tm), Some(to)) if tm == to => {
                let r = AlignedRow {
                    time: tm,
                    model: model.values[i],
                    obs: obs.values[j],
                };
                while i < model.len() && model.times[i] == tm {
                    i += 1;
                }
                while j < obs.len() && obs.times[j] == tm {
                    j += 1;
                }
                r
            }
            (Some(tm), None) => {
                let r = AlignedRow {
                    time: tm,
                    model: model.values[i],
                    obs: f64::NAN,
                };
                i += 1;
                r
            }
            (Some(tm), Some(to)) if tm < to => {
                let r = AlignedRow {
                    time: tm,
                    model: model.values[i],
                    obs: f64::NAN,
                };
                i += 1;
                r
            }
            (_, Some(to)) => {
                let r = AlignedRow {
                    time: to,
                    model: f64::NAN,
                    obs: obs.values[j],
                };
                j += 1;
                r
            }
            (None, None) => break,
        };
        rows.push(row);
    }
    rows
}

/// For every model timestamp, attach the nearest observed timestamp within
/// `tolerance`; ties between equally-near neighbors go to the later one.
/// Model timestamps with no observation in range get NaN (and are then
/// dropped by the caller).
fn align_asof(model: &TimeSeries, obs: &TimeSeries, tolerance: Duration) -> Vec<AlignedRow> {
    model
        .times
        .iter()
        .zip(&model.values)
        .map(|(&tm, &vm)| {
            let obs_value = nearest_within(obs, tm, tolerance);
            AlignedRow {
                time: tm,
                model: vm,
                obs: obs_value.unwrap_or(f64::NAN),
            }
        })
        .collect()
}

fn nearest_within(obs: &TimeSeries, target: Timestamp, tolerance: Duration) -> Option<f64> {
    if obs.is_empty() {
        return None;
    }
    // First observation at or after the target.
    let idx = obs.times.partition_point(|&t| t < target);

    let after = (idx < obs.len()).then(|| (obs.times[idx] - target, idx));
    let before = (idx > 0).then(|| (target - obs.times[idx - 1], idx - 1));

    let (gap, best) = match (before, after) {
        // The earlier neighbor wins only when strictly closer, so an exact
        // tie resolves to the later observation.
        (Some((gb, ib)), Some((ga, ia))) => {
            if gb < ga {
                (gb, ib)
            } else {
                (ga, ia)
            }
        }
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };

    (gap <= tolerance).then(|| obs.values[best])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(min: i64) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(min)
    }

    fn series(points: &[(i64, f64)]) -> TimeSeries {
        TimeSeries::new(
            "s",
            None,
            points.iter().map(|&(m, _)| ts(m)).collect(),
            points.iter().map(|&(_, v)| v).collect(),
        )
        .unwrap()
    }

    // -- method parsing --

    #[test]
    fn method_names_round_trip() {
        for m in AlignMethod::ALL {
            assert_eq!(m.as_str().parse::<AlignMethod>().unwrap(), m);
        }
        assert!(matches!(
            "nearest".parse::<AlignMethod>(),
            Err(DataError::UnknownMethod(_))
        ));
        assert!(matches!(
            "max".parse::<ResampleAgg>(),
            Err(DataError::UnknownAggregation(_))
        ));
    }

    // -- inner --

    #[test]
    fn inner_keeps_exactly_shared_timestamps() {
        let model = series(&[(0, 1.0), (10, 2.0), (20, 3.0)]);
        let obs = series(&[(0, 1.1), (20, 2.9), (30, 4.0)]);
        let opts = AlignOptions {
            method: AlignMethod::Inner,
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].time, ts(0));
        assert_eq!(table.rows[1].time, ts(20));
    }

    #[test]
    fn inner_collapses_duplicate_timestamps() {
        let model = series(&[(0, 1.0), (0, 99.0), (10, 2.0)]);
        let obs = series(&[(0, 1.1), (10, 2.1)]);
        let opts = AlignOptions {
            method: AlignMethod::Inner,
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].model, 1.0);
    }

    #[test]
    fn nan_rows_are_dropped() {
        let model = series(&[(0, 1.0), (10, f64::NAN)]);
        let obs = series(&[(0, 1.1), (10, 2.1)]);
        let opts = AlignOptions {
            method: AlignMethod::Inner,
            ..Default::default()
        };
        assert_eq!(align(&model, &obs, &opts).len(), 1);
    }

    // -- outer --

    #[test]
    fn outer_reduces_to_inner_after_nan_drop() {
        let model = series(&[(0, 1.0), (10, 2.0), (20, 3.0)]);
        let obs = series(&[(10, 2.1), (30, 4.0)]);
        let inner = align(
            &model,
            &obs,
            &AlignOptions {
                method: AlignMethod::Inner,
                ..Default::default()
            },
        );
        let outer = align(
            &model,
            &obs,
            &AlignOptions {
                method: AlignMethod::Outer,
                ..Default::default()
            },
        );
        assert_eq!(inner.rows, outer.rows);
    }

    // -- asof --

    #[test]
    fn asof_respects_tolerance() {
        let model = series(&[(0, 1.0), (60, 2.0)]);
        let obs = series(&[(4, 1.1), (90, 2.1)]);
        let opts = AlignOptions {
            method: AlignMethod::Asof,
            tolerance: Duration::minutes(10),
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        // Model t=0 pairs with obs at t=4; model t=60 has nothing within
        // 10 minutes (nearest is 30 away) and is dropped.
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].time, ts(0));
        assert_eq!(table.rows[0].obs, 1.1);
    }

    #[test]
    fn asof_picks_nearest_neighbor() {
        let model = series(&[(10, 1.0)]);
        let obs = series(&[(2, 5.0), (13, 6.0), (30, 7.0)]);
        let opts = AlignOptions {
            method: AlignMethod::Asof,
            tolerance: Duration::minutes(10),
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.rows[0].obs, 6.0); // 3 min beats 8 min
    }

    #[test]
    fn asof_tie_goes_to_later_observation() {
        let model = series(&[(10, 1.0)]);
        let obs = series(&[(5, 5.0), (15, 6.0)]);
        let opts = AlignOptions {
            method: AlignMethod::Asof,
            tolerance: Duration::minutes(10),
            ..Default::default()
        };
        assert_eq!(align(&model, &obs, &opts).rows[0].obs, 6.0);
    }

    #[test]
    fn asof_half_interval_offset_pairs_consistently() {
        // Model on :00/:30, observations on :15/:45: every model timestamp
        // is exactly equidistant from two observations, and each row must
        // take the later one.
        let model = series(&[(30, 1.0), (60, 2.0), (90, 3.0)]);
        let obs = series(&[(15, 0.15), (45, 0.45), (75, 0.75), (105, 1.05)]);
        let opts = AlignOptions {
            method: AlignMethod::Asof,
            tolerance: Duration::minutes(15),
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.rows.iter().map(|r| r.obs).collect::<Vec<_>>(),
            vec![0.45, 0.75, 1.05]
        );
    }

    // -- resampling --

    #[test]
    fn resample_floors_to_bucket_start() {
        let s = series(&[(5, 1.0), (25, 3.0), (65, 5.0)]);
        let r = resample(&s, Duration::hours(1), ResampleAgg::Mean);
        assert_eq!(r.times, vec![ts(0), ts(60)]);
        assert_eq!(r.values, vec![2.0, 5.0]);
    }

    #[test]
    fn resample_aggregations() {
        let s = series(&[(0, 1.0), (10, 2.0), (20, 6.0)]);
        let hour = Duration::hours(1);
        assert_eq!(resample(&s, hour, ResampleAgg::Mean).values, vec![3.0]);
        assert_eq!(resample(&s, hour, ResampleAgg::Median).values, vec![2.0]);
        assert_eq!(resample(&s, hour, ResampleAgg::Sum).values, vec![9.0]);
    }

    #[test]
    fn resample_fills_gap_buckets_on_the_grid() {
        // Samples in hours 0 and 2 leave hour 1 empty: the grid still
        // carries it, as NaN for mean and as 0 for sum.
        let s = series(&[(10, 2.0), (125, 4.0)]);
        let mean = resample(&s, Duration::hours(1), ResampleAgg::Mean);
        assert_eq!(mean.times, vec![ts(0), ts(60), ts(120)]);
        assert_eq!(mean.values[0], 2.0);
        assert!(mean.values[1].is_nan());
        assert_eq!(mean.values[2], 4.0);

        let sum = resample(&s, Duration::hours(1), ResampleAgg::Sum);
        assert_eq!(sum.values, vec![2.0, 0.0, 4.0]);
    }

    #[test]
    fn sum_resampled_gap_buckets_survive_inner_join() {
        // With sum aggregation an empty bucket is a real 0.0 row on both
        // grids, so the inner join keeps it.
        let model = series(&[(10, 2.0), (125, 4.0)]);
        let obs = series(&[(20, 2.1), (130, 4.1)]);
        let opts = AlignOptions {
            method: AlignMethod::Inner,
            resample: Some(Duration::hours(1)),
            agg: ResampleAgg::Sum,
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[1].time, ts(60));
        assert_eq!((table.rows[1].model, table.rows[1].obs), (0.0, 0.0));
    }

    #[test]
    fn resample_skips_nan_within_bucket() {
        let s = series(&[(0, 1.0), (10, f64::NAN), (20, 3.0)]);
        let r = resample(&s, Duration::hours(1), ResampleAgg::Mean);
        assert_eq!(r.values, vec![2.0]);
    }

    #[test]
    fn coarse_resample_then_inner_counts_common_buckets() {
        // Model covers hours 0-2, observations hours 1-3: two shared hourly
        // buckets with finite aggregates on both sides.
        let model = series(&[(0, 1.0), (30, 2.0), (70, 3.0), (130, 4.0)]);
        let obs = series(&[(65, 2.9), (125, 3.8), (185, 5.0)]);
        let opts = AlignOptions {
            method: AlignMethod::Inner,
            resample: Some(Duration::hours(1)),
            agg: ResampleAgg::Mean,
            ..Default::default()
        };
        let table = align(&model, &obs, &opts);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].time, ts(60));
        assert_eq!(table.rows[1].time, ts(120));
    }
}
