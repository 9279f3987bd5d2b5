use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::analysis::align::{AlignMethod, ResampleAgg};
use crate::state::{channel_id, AppState};

// ---------------------------------------------------------------------------
// Left side panel – datasets, channel pickers, alignment controls, stats
// ---------------------------------------------------------------------------

/// Render the left control panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Datasets");
    ui.separator();

    if state.bundle.is_empty() {
        ui.label("No files loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            dataset_section(ui, state);
            ui.separator();
            selection_section(ui, state);
            ui.separator();
            alignment_section(ui, state);
            ui.separator();
            stats_section(ui, state);
        });
}

/// One collapsible block per loaded file with its summary and channel list.
fn dataset_section(ui: &mut Ui, state: &mut AppState) {
    // Clone the listing so we can mutate state inside the loop.
    let listing: Vec<(String, Vec<String>)> = state
        .bundle
        .iter()
        .map(|(key, ds)| (key.clone(), ds.channel_names()))
        .collect();

    for (key, channels) in &listing {
        let summary = match state.bundle.get(key) {
            Some(ds) => ds.summary(),
            None => continue,
        };
        let header = format!("{key}  ({} ch, {} rec)", channels.len(), summary.records);

        egui::CollapsingHeader::new(RichText::new(header).strong())
            .id_salt(key)
            .default_open(false)
            .show(ui, |ui: &mut Ui| {
                ui.label(RichText::new(&summary.file).italics());
                if let (Some(start), Some(end)) = (summary.start, summary.end) {
                    ui.label(format!("{start}  →  {end}"));
                }
                if let Some(mean_dt) = summary.mean_dt_s {
                    ui.label(format!("mean dt: {mean_dt:.0} s"));
                }

                ui.horizontal(|ui: &mut Ui| {
                    if ui.small_button("All").clicked() {
                        state.show_all(key);
                    }
                    if ui.small_button("None").clicked() {
                        state.hide_all(key);
                    }
                });

                for name in channels {
                    let id = channel_id(key, name);
                    let mut checked = state.visible_channels.contains(&id);
                    let unit = summary
                        .channels
                        .iter()
                        .find(|(n, _)| n == name)
                        .and_then(|(_, u)| u.clone());
                    let label = match unit {
                        Some(u) => format!("{name} [{u}]"),
                        None => name.clone(),
                    };
                    let text =
                        RichText::new(label).color(state.channel_colors.color_for(&id));

                    ui.horizontal(|ui: &mut Ui| {
                        if ui.checkbox(&mut checked, text).changed() {
                            state.toggle_channel(&id);
                        }
                        if ui.small_button("M").on_hover_text("use as model").clicked() {
                            state.model_selection = Some((key.clone(), name.clone()));
                        }
                        if ui
                            .small_button("O")
                            .on_hover_text("use as observed")
                            .clicked()
                        {
                            state.obs_selection = Some((key.clone(), name.clone()));
                        }
                    });
                }
            });
    }
}

fn selection_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Comparison pair");
    match &state.model_selection {
        Some((key, name)) => ui.label(format!("Model:    {key} / {name}")),
        None => ui.label("Model:    (pick with M)"),
    };
    match &state.obs_selection {
        Some((key, name)) => ui.label(format!("Observed: {key} / {name}")),
        None => ui.label("Observed: (pick with O)"),
    };
}

fn alignment_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Alignment");

    egui::ComboBox::from_label("method")
        .selected_text(state.method.as_str())
        .show_ui(ui, |ui: &mut Ui| {
            for method in AlignMethod::ALL {
                if ui
                    .selectable_label(state.method == method, method.as_str())
                    .clicked()
                {
                    state.method = method;
                }
            }
        });

    if state.method == AlignMethod::Asof {
        ui.horizontal(|ui: &mut Ui| {
            ui.label("tolerance (min)");
            ui.add(
                egui::DragValue::new(&mut state.tolerance_minutes)
                    .range(0.0..=1440.0)
                    .speed(1.0),
            );
        });
    }

    ui.checkbox(&mut state.resample_enabled, "resample first");
    if state.resample_enabled {
        ui.horizontal(|ui: &mut Ui| {
            ui.label("bucket (min)");
            ui.add(
                egui::DragValue::new(&mut state.resample_minutes)
                    .range(1.0..=10080.0)
                    .speed(5.0),
            );
        });
        egui::ComboBox::from_label("aggregation")
            .selected_text(state.agg.as_str())
            .show_ui(ui, |ui: &mut Ui| {
                for agg in ResampleAgg::ALL {
                    if ui.selectable_label(state.agg == agg, agg.as_str()).clicked() {
                        state.agg = agg;
                    }
                }
            });
    }

    if ui.button("Compare").clicked() {
        state.run_compare();
    }
}

/// Goodness-of-fit table for the last comparison.
fn stats_section(ui: &mut Ui, state: &AppState) {
    let Some(comparison) = &state.comparison else {
        ui.label("No comparison yet.");
        return;
    };

    ui.strong("Goodness of fit");
    TableBuilder::new(ui)
        .striped(true)
        .column(Column::auto().at_least(90.0))
        .column(Column::remainder())
        .body(|mut body| {
            for (label, value) in comparison.stats.entries() {
                body.row(16.0, |mut row| {
                    row.col(|ui: &mut Ui| {
                        ui.label(label);
                    });
                    row.col(|ui: &mut Ui| {
                        let text = if label == "N" {
                            format!("{}", value as usize)
                        } else {
                            format!("{value:.4}")
                        };
                        ui.label(text);
                    });
                });
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_files_dialog(state);
                ui.close_menu();
            }
            let can_export = state.comparison.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export aligned CSV…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if !state.bundle.is_empty() {
            ui.label(format!(
                "{} file(s), {} channel(s) visible",
                state.bundle.len(),
                state.visible_channels.len()
            ));
        }

        if let Some(comparison) = &state.comparison {
            ui.separator();
            ui.label(format!("aligned pairs: {}", comparison.stats.n));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_files_dialog(state: &mut AppState) {
    let files = rfd::FileDialog::new()
        .set_title("Open model results and observations")
        .add_filter("Supported files", &["parquet", "pq", "csv", "json"])
        .add_filter("Model results (Parquet/CSV)", &["parquet", "pq", "csv"])
        .add_filter("Observations (JSON)", &["json"])
        .pick_files();

    if let Some(paths) = files {
        state.add_files(&paths);
    }
}

fn export_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Export aligned pairs")
        .add_filter("CSV", &["csv"])
        .set_file_name("aligned.csv")
        .save_file();

    if let Some(path) = file {
        if let Err(e) = state.export_aligned_csv(&path) {
            log::error!("Export failed: {e:#}");
            state.status_message = Some(format!("Export error: {e:#}"));
        } else {
            state.status_message = Some(format!("Exported {}", path.display()));
        }
    }
}
