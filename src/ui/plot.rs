use chrono::DateTime;
use eframe::egui::Ui;
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::data::model::Timestamp;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Time-series plot (central panel)
// ---------------------------------------------------------------------------

fn to_x(t: Timestamp) -> f64 {
    t.and_utc().timestamp_millis() as f64 / 1_000.0
}

fn format_axis_time(seconds: f64) -> String {
    match DateTime::from_timestamp(seconds.floor() as i64, 0) {
        Some(dt) => dt.naive_utc().format("%Y-%m-%d\n%H:%M").to_string(),
        None => String::new(),
    }
}

/// Render the comparison plot: raw channel overlays plus the aligned
/// model/observed pair of the last comparison.
pub fn timeseries_plot(ui: &mut Ui, state: &AppState) {
    if state.bundle.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open model and observation files to compare  (File → Open…)");
        });
        return;
    }

    let y_label = state
        .comparison
        .as_ref()
        .and_then(|c| c.unit.clone())
        .unwrap_or_else(|| "Value".to_string());

    Plot::new("timeseries_plot")
        .legend(Legend::default())
        .x_axis_label("Time")
        .y_axis_label(y_label)
        .x_axis_formatter(|mark, _range| format_axis_time(mark.value))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            // ---- Raw channel overlays ----
            for id in &state.visible_channels {
                let Some((key, name)) = id.split_once('/') else {
                    continue;
                };
                let Ok(series) = state.bundle.series(key, name) else {
                    continue;
                };
                let points: PlotPoints = series
                    .times
                    .iter()
                    .zip(&series.values)
                    .map(|(&t, &v)| [to_x(t), v])
                    .collect();
                plot_ui.line(
                    Line::new(points)
                        .name(id)
                        .color(state.channel_colors.color_for(id))
                        .width(state.style.line_width),
                );
            }

            // ---- Aligned comparison pair ----
            if let Some(comparison) = &state.comparison {
                let model: PlotPoints = comparison
                    .table
                    .rows
                    .iter()
                    .map(|r| [to_x(r.time), r.model])
                    .collect();
                let obs: PlotPoints = comparison
                    .table
                    .rows
                    .iter()
                    .map(|r| [to_x(r.time), r.obs])
                    .collect();

                plot_ui.line(
                    Line::new(model)
                        .name(&comparison.model_label)
                        .color(state.style.model_color)
                        .width(state.style.line_width),
                );
                plot_ui.line(
                    Line::new(obs)
                        .name(&comparison.obs_label)
                        .color(state.style.obs_color)
                        .width(state.style.line_width),
                );
            }
        });
}
