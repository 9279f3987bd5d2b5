use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use super::error::DataError;

/// Timestamps are tz-naive throughout, matching the instrument and model
/// output this tool consumes.
pub type Timestamp = NaiveDateTime;

// ---------------------------------------------------------------------------
// TimeSeries – one extracted channel
// ---------------------------------------------------------------------------

/// A single named channel as parallel time/value vectors, sorted by
/// timestamp. Produced fresh by every extraction; never mutated afterward.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    pub name: String,
    pub unit: Option<String>,
    pub times: Vec<Timestamp>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    /// Build a series, sorting the pairs by timestamp.
    pub fn new(
        name: impl Into<String>,
        unit: Option<String>,
        times: Vec<Timestamp>,
        values: Vec<f64>,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if times.len() != values.len() {
            return Err(DataError::ShapeMismatch {
                channel: name,
                values: values.len(),
                times: times.len(),
            });
        }
        let mut series = TimeSeries {
            name,
            unit,
            times,
            values,
        };
        series.sort_by_time();
        Ok(series)
    }

    fn sort_by_time(&mut self) {
        if self.times.windows(2).all(|w| w[0] <= w[1]) {
            return;
        }
        let mut order: Vec<usize> = (0..self.times.len()).collect();
        order.sort_by_key(|&i| self.times[i]);
        self.times = order.iter().map(|&i| self.times[i]).collect();
        self.values = order.iter().map(|&i| self.values[i]).collect();
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Channel / ChannelGroup – the loaded shape of one file
// ---------------------------------------------------------------------------

/// One value column of a loaded file. The sanitized name is the explicit
/// lookup table replacing the original scripts' dynamic dot-access
/// attributes (`"sur: Current speed"` → `sur_current_speed`).
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub sanitized: String,
    pub unit: Option<String>,
    pub values: Vec<f64>,
}

impl Channel {
    pub fn new(name: impl Into<String>, unit: Option<String>, values: Vec<f64>) -> Self {
        let name = name.into();
        let sanitized = sanitize_name(&name);
        Channel {
            name,
            sanitized,
            unit,
            values,
        }
    }
}

/// Make a channel or file name safe for terse reference: lowercase with
/// separator runs collapsed to single underscores.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_underscore = true; // swallow leading separators
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// A shared time axis and the channels sampled on it.
///
/// Model result files carry exactly one group; observation files carry one
/// group per `Time`-bearing struct, with `path` recording where in the file
/// the group came from (e.g. `profileStruct.Bins[1]`).
#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub path: String,
    pub time: Vec<Timestamp>,
    pub channels: Vec<Channel>,
}

impl ChannelGroup {
    /// Build a group, validating every channel against the time axis.
    pub fn new(
        path: impl Into<String>,
        time: Vec<Timestamp>,
        channels: Vec<Channel>,
    ) -> Result<Self, DataError> {
        for ch in &channels {
            if ch.values.len() != time.len() {
                return Err(DataError::ShapeMismatch {
                    channel: ch.name.clone(),
                    values: ch.values.len(),
                    times: time.len(),
                });
            }
        }
        Ok(ChannelGroup {
            path: path.into(),
            time,
            channels,
        })
    }

    /// Channel name qualified with the group path, as shown to the user.
    pub fn qualified_name(&self, channel: &Channel) -> String {
        if self.path.is_empty() {
            channel.name.clone()
        } else {
            format!("{}.{}", self.path, channel.name)
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – one loaded file
// ---------------------------------------------------------------------------

/// One loaded file: display name, source path, and its channel groups.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub path: PathBuf,
    pub groups: Vec<ChannelGroup>,
}

impl Dataset {
    /// Total channel count across all groups.
    pub fn channel_count(&self) -> usize {
        self.groups.iter().map(|g| g.channels.len()).sum()
    }

    /// All qualified channel names in file order.
    pub fn channel_names(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|g| g.channels.iter().map(|c| g.qualified_name(c)))
            .collect()
    }

    /// Extract a channel as a [`TimeSeries`].
    ///
    /// Lookup order: case-insensitive exact match on the qualified name, the
    /// bare channel name, or the sanitized name; then substring match on the
    /// qualified name. Exact always wins over substring when both would hit.
    pub fn series(&self, query: &str) -> Result<TimeSeries, DataError> {
        let q = query.trim().to_lowercase();
        let q_sanitized = sanitize_name(query);

        let mut exact = None;
        let mut partial = None;
        for group in &self.groups {
            for ch in &group.channels {
                let qualified = group.qualified_name(ch);
                let qualified_lc = qualified.to_lowercase();
                if qualified_lc == q
                    || ch.name.to_lowercase() == q
                    || (!q_sanitized.is_empty() && ch.sanitized == q_sanitized)
                {
                    if exact.is_none() {
                        exact = Some((group, ch, qualified));
                    }
                } else if partial.is_none() && qualified_lc.contains(&q) {
                    partial = Some((group, ch, qualified));
                }
            }
        }

        let (group, ch, qualified) =
            exact.or(partial).ok_or_else(|| DataError::ChannelNotFound {
                query: query.to_string(),
                dataset: self.name.clone(),
                available: self.channel_names(),
            })?;

        TimeSeries::new(
            qualified,
            ch.unit.clone(),
            group.time.clone(),
            ch.values.clone(),
        )
    }

    /// Per-file summary, as logged after load and shown in the side panel.
    pub fn summary(&self) -> DatasetSummary {
        let mut times: Vec<Timestamp> = self
            .groups
            .iter()
            .flat_map(|g| g.time.iter().copied())
            .collect();
        times.sort();

        let records = times.len();
        let start = times.first().copied();
        let end = times.last().copied();

        let steps: Vec<f64> = times
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1_000.0)
            .collect();
        let (mean_dt, min_dt, max_dt) = if steps.is_empty() {
            (None, None, None)
        } else {
            (
                Some(steps.iter().sum::<f64>() / steps.len() as f64),
                Some(steps.iter().copied().fold(f64::INFINITY, f64::min)),
                Some(steps.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            )
        };

        DatasetSummary {
            file: self.name.clone(),
            folder: self
                .path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            records,
            start,
            end,
            mean_dt_s: mean_dt,
            min_dt_s: min_dt,
            max_dt_s: max_dt,
            channels: self
                .groups
                .iter()
                .flat_map(|g| {
                    g.channels
                        .iter()
                        .map(|c| (g.qualified_name(c), c.unit.clone()))
                })
                .collect(),
        }
    }
}

/// Summary facts about one loaded file.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub file: String,
    pub folder: String,
    pub records: usize,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub mean_dt_s: Option<f64>,
    pub min_dt_s: Option<f64>,
    pub max_dt_s: Option<f64>,
    /// (qualified name, unit) per channel.
    pub channels: Vec<(String, Option<String>)>,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:    {}", self.file)?;
        writeln!(f, "Folder:  {}", self.folder)?;
        match (self.start, self.end) {
            (Some(s), Some(e)) => {
                writeln!(f, "Start:   {s}")?;
                writeln!(f, "End:     {e}")?;
                writeln!(f, "Span:    {}", e - s)?;
            }
            _ => writeln!(f, "Span:    (no records)")?,
        }
        writeln!(f, "Records: {}", self.records)?;
        if let (Some(mean), Some(min), Some(max)) = (self.mean_dt_s, self.min_dt_s, self.max_dt_s)
        {
            writeln!(f, "dt (s):  mean={mean:.1}, min={min:.1}, max={max:.1}")?;
        }
        writeln!(f, "Channels ({}):", self.channels.len())?;
        for (name, unit) in &self.channels {
            match unit {
                Some(u) => writeln!(f, "  - {name} [{u}]")?,
                None => writeln!(f, "  - {name}")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bundle – all loaded files, keyed by sanitized file stem
// ---------------------------------------------------------------------------

/// Every loaded file, keyed by sanitized file stem (`MAOB1.dfs0.parquet` →
/// `maob1`). `BTreeMap` keeps listing order stable in the UI.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    datasets: BTreeMap<String, Dataset>,
}

impl Bundle {
    /// Insert a dataset and return the key it landed under.
    pub fn insert(&mut self, dataset: Dataset) -> String {
        let stem = dataset
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&dataset.name);
        // Double extensions like `MAOB1.dfs0.parquet` still leave a marker
        // in the stem; keep only the leading component.
        let stem = stem.split('.').next().unwrap_or(stem);
        let key = sanitize_name(stem);
        self.datasets.insert(key.clone(), dataset);
        key
    }

    pub fn get(&self, key: &str) -> Option<&Dataset> {
        self.datasets.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.datasets.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Dataset)> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Extract a channel from the dataset under `key`.
    ///
    /// An absent key is its own error, listing the keys that do exist; the
    /// channel lookup itself is [`Dataset::series`].
    pub fn series(&self, key: &str, query: &str) -> Result<TimeSeries, DataError> {
        let dataset = self
            .datasets
            .get(key)
            .ok_or_else(|| DataError::DatasetNotFound {
                key: key.to_string(),
                available: self.datasets.keys().cloned().collect(),
            })?;
        dataset.series(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn dataset() -> Dataset {
        let group = ChannelGroup::new(
            "",
            vec![ts(0), ts(1), ts(2)],
            vec![
                Channel::new(
                    "sur: Current speed",
                    Some("m/s".into()),
                    vec![0.4, 0.5, 0.6],
                ),
                Channel::new(
                    "sur: Current direction (Horizontal)",
                    Some("deg".into()),
                    vec![10.0, 20.0, 30.0],
                ),
                Channel::new("Speed of sound", None, vec![1500.0, 1501.0, 1502.0]),
            ],
        )
        .unwrap();
        Dataset {
            name: "MAOB1.parquet".into(),
            path: PathBuf::from("/data/MAOB1.parquet"),
            groups: vec![group],
        }
    }

    // -- sanitization --

    #[test]
    fn sanitize_collapses_separators() {
        assert_eq!(sanitize_name("sur: Current speed"), "sur_current_speed");
        assert_eq!(
            sanitize_name("sur: Current direction (Horizontal)"),
            "sur_current_direction_horizontal"
        );
        assert_eq!(sanitize_name("  Water Level  "), "water_level");
    }

    // -- channel lookup --

    #[test]
    fn exact_match_beats_substring() {
        let ds = dataset();
        // "speed of sound" is an exact hit even though "speed" alone would
        // also substring-match the two current channels.
        let s = ds.series("Speed of Sound").unwrap();
        assert_eq!(s.name, "Speed of sound");

        // Substring fallback picks the first match in file order.
        let s = ds.series("speed").unwrap();
        assert_eq!(s.name, "sur: Current speed");
    }

    #[test]
    fn sanitized_name_counts_as_exact() {
        let ds = dataset();
        let s = ds.series("sur_current_speed").unwrap();
        assert_eq!(s.name, "sur: Current speed");
        assert_eq!(s.unit.as_deref(), Some("m/s"));
    }

    #[test]
    fn missing_channel_lists_available() {
        let ds = dataset();
        let err = ds.series("salinity").unwrap_err();
        match err {
            DataError::ChannelNotFound { available, .. } => {
                assert_eq!(available.len(), 3);
                assert!(available.contains(&"Speed of sound".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_dataset_key_lists_keys() {
        let mut bundle = Bundle::default();
        let key = bundle.insert(dataset());
        assert_eq!(key, "maob1");
        let err = bundle.series("scqn1", "speed").unwrap_err();
        match err {
            DataError::DatasetNotFound { available, .. } => {
                assert_eq!(available, vec!["maob1".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // -- shape validation --

    #[test]
    fn group_rejects_length_mismatch() {
        let err = ChannelGroup::new(
            "",
            vec![ts(0), ts(1)],
            vec![Channel::new("Speed", None, vec![1.0, 2.0, 3.0])],
        )
        .unwrap_err();
        match err {
            DataError::ShapeMismatch { values, times, .. } => {
                assert_eq!((values, times), (3, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    // -- series ordering --

    #[test]
    fn series_sorts_by_time() {
        let s = TimeSeries::new("obs", None, vec![ts(2), ts(0), ts(1)], vec![3.0, 1.0, 2.0])
            .unwrap();
        assert_eq!(s.times, vec![ts(0), ts(1), ts(2)]);
        assert_eq!(s.values, vec![1.0, 2.0, 3.0]);
    }

    // -- summary --

    #[test]
    fn summary_timestep_stats() {
        let s = dataset().summary();
        assert_eq!(s.records, 3);
        assert_eq!(s.mean_dt_s, Some(3600.0));
        assert_eq!(s.min_dt_s, Some(3600.0));
        assert_eq!(s.max_dt_s, Some(3600.0));
        assert_eq!(s.channels.len(), 3);
    }
}
