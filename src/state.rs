use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use eframe::egui::Color32;

use crate::analysis::align::{AlignMethod, AlignOptions, AlignedTable, ResampleAgg};
use crate::analysis::stats::Stats;
use crate::color::ChannelColors;
use crate::data::loader::load_files;
use crate::data::model::Bundle;

// ---------------------------------------------------------------------------
// Chart style – plain presentation configuration
// ---------------------------------------------------------------------------

/// Presentation configuration for the plot.  A plain struct rather than
/// global chart state; the colours follow the original comparison plots.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub line_width: f32,
    pub model_color: Color32,
    pub obs_color: Color32,
    /// HSL parameters for the overlay channel palette.
    pub palette_saturation: f32,
    pub palette_lightness: f32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            line_width: 1.5,
            model_color: Color32::from_rgb(0x1f, 0x77, 0xb4),
            obs_color: Color32::from_rgb(0xd6, 0x27, 0x28),
            palette_saturation: 0.75,
            palette_lightness: 0.55,
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// A cached comparison result, recomputed when the user hits Compare.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub model_label: String,
    pub obs_label: String,
    pub unit: Option<String>,
    pub table: AlignedTable,
    pub stats: Stats,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    /// All loaded files.
    pub bundle: Bundle,

    /// Channel ids (`key/qualified name`) currently drawn as raw overlays.
    pub visible_channels: BTreeSet<String>,

    /// Palette assignment for the overlay channels.
    pub channel_colors: ChannelColors,

    /// Selected model channel: (dataset key, qualified channel name).
    pub model_selection: Option<(String, String)>,

    /// Selected observed channel.
    pub obs_selection: Option<(String, String)>,

    // Alignment controls.
    pub method: AlignMethod,
    pub tolerance_minutes: f64,
    pub resample_enabled: bool,
    pub resample_minutes: f64,
    pub agg: ResampleAgg,

    /// Last comparison, if any.
    pub comparison: Option<Comparison>,

    pub style: ChartStyle,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        let defaults = AlignOptions::default();
        AppState {
            bundle: Bundle::default(),
            visible_channels: BTreeSet::new(),
            channel_colors: ChannelColors::default(),
            model_selection: None,
            obs_selection: None,
            method: defaults.method,
            tolerance_minutes: defaults.tolerance.num_minutes() as f64,
            resample_enabled: false,
            resample_minutes: 60.0,
            agg: defaults.agg,
            comparison: None,
            style: ChartStyle::default(),
            status_message: None,
        }
    }
}

/// Id under which a channel appears in the overlay set and colour map.
pub fn channel_id(key: &str, qualified: &str) -> String {
    format!("{key}/{qualified}")
}

impl AppState {
    /// Bulk-load files into the bundle.  Missing or unreadable files are
    /// logged and skipped inside the loader; whatever loads is merged in.
    pub fn add_files(&mut self, paths: &[PathBuf]) {
        let loaded = load_files(paths);
        if loaded.is_empty() {
            self.status_message = Some("No files could be loaded".to_string());
            return;
        }
        let n = loaded.len();
        for (_, dataset) in loaded.iter() {
            log::info!("\n{}", dataset.summary());
            self.bundle.insert(dataset.clone());
        }
        self.status_message = Some(format!(
            "Loaded {n} of {} file(s); {} total",
            paths.len(),
            self.bundle.len()
        ));
        self.rebuild_colors();
    }

    /// Every channel id in the bundle, in listing order.
    pub fn all_channel_ids(&self) -> Vec<String> {
        self.bundle
            .iter()
            .flat_map(|(key, ds)| {
                ds.channel_names()
                    .into_iter()
                    .map(move |name| channel_id(key, &name))
            })
            .collect()
    }

    /// Reassign overlay colours across all known channels.
    pub fn rebuild_colors(&mut self) {
        let ids = self.all_channel_ids();
        self.channel_colors.rebuild(
            ids.iter().map(String::as_str),
            self.style.palette_saturation,
            self.style.palette_lightness,
        );
    }

    /// Toggle a raw channel overlay on or off.
    pub fn toggle_channel(&mut self, id: &str) {
        if !self.visible_channels.remove(id) {
            self.visible_channels.insert(id.to_string());
        }
    }

    /// Show every channel of one dataset.
    pub fn show_all(&mut self, key: &str) {
        if let Some(ds) = self.bundle.get(key) {
            for name in ds.channel_names() {
                self.visible_channels.insert(channel_id(key, &name));
            }
        }
    }

    /// Hide every channel of one dataset.
    pub fn hide_all(&mut self, key: &str) {
        let prefix = format!("{key}/");
        self.visible_channels.retain(|id| !id.starts_with(&prefix));
    }

    /// The alignment options as currently configured.
    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            method: self.method,
            tolerance: Duration::seconds((self.tolerance_minutes * 60.0).round() as i64),
            resample: self
                .resample_enabled
                .then(|| Duration::seconds((self.resample_minutes * 60.0).round() as i64)),
            agg: self.agg,
        }
    }

    /// Run the comparison for the current selections.
    pub fn run_compare(&mut self) {
        let (Some((mk, mq)), Some((ok, oq))) =
            (self.model_selection.clone(), self.obs_selection.clone())
        else {
            self.status_message = Some("Select a model and an observed channel".to_string());
            return;
        };

        match crate::analysis::compare(&self.bundle, &mk, &mq, &ok, &oq, &self.align_options()) {
            Ok((table, stats)) => {
                let unit = self
                    .bundle
                    .series(&mk, &mq)
                    .ok()
                    .and_then(|s| s.unit);
                self.status_message = if stats.n == 0 {
                    Some("No overlapping records within the alignment settings".to_string())
                } else {
                    None
                };
                self.comparison = Some(Comparison {
                    model_label: format!("Model: {mq}"),
                    obs_label: format!("Observed: {oq}"),
                    unit,
                    table,
                    stats,
                });
            }
            Err(e) => {
                log::error!("Comparison failed: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Write the current aligned pair table to a CSV file.
    pub fn export_aligned_csv(&self, path: &Path) -> Result<()> {
        let comparison = self
            .comparison
            .as_ref()
            .context("no comparison to export")?;

        let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
        writer
            .write_record(["time", "model", "obs"])
            .context("writing CSV header")?;
        for row in &comparison.table.rows {
            writer
                .write_record([
                    row.time.format("%Y-%m-%d %H:%M:%S").to_string(),
                    row.model.to_string(),
                    row.obs.to_string(),
                ])
                .context("writing CSV row")?;
        }
        writer.flush().context("flushing CSV")?;
        log::info!(
            "Exported {} aligned rows to {}",
            comparison.table.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Channel, ChannelGroup, Dataset};
    use chrono::NaiveDate;

    fn state_with_data() -> AppState {
        let mut state = AppState::default();
        let t = vec![
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ];
        state.bundle.insert(Dataset {
            name: "maob1.csv".into(),
            path: PathBuf::from("maob1.csv"),
            groups: vec![ChannelGroup::new(
                "",
                t,
                vec![Channel::new("Current speed", None, vec![0.4])],
            )
            .unwrap()],
        });
        state.rebuild_colors();
        state
    }

    #[test]
    fn toggle_and_hide_all() {
        let mut state = state_with_data();
        let id = channel_id("maob1", "Current speed");
        state.toggle_channel(&id);
        assert!(state.visible_channels.contains(&id));
        state.toggle_channel(&id);
        assert!(state.visible_channels.is_empty());

        state.show_all("maob1");
        assert_eq!(state.visible_channels.len(), 1);
        state.hide_all("maob1");
        assert!(state.visible_channels.is_empty());
    }

    #[test]
    fn align_options_reflect_controls() {
        let mut state = state_with_data();
        state.method = AlignMethod::Inner;
        state.tolerance_minutes = 5.0;
        state.resample_enabled = true;
        state.resample_minutes = 30.0;

        let opts = state.align_options();
        assert_eq!(opts.method, AlignMethod::Inner);
        assert_eq!(opts.tolerance, Duration::minutes(5));
        assert_eq!(opts.resample, Some(Duration::minutes(30)));
    }

    #[test]
    fn compare_without_selection_sets_status() {
        let mut state = state_with_data();
        state.run_compare();
        assert!(state.comparison.is_none());
        assert!(state.status_message.is_some());
    }
}
