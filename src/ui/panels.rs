use std::path::Path;

use anyhow::Context;
use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use strum::IntoEnumIterator;

use accident_lens::data::aggregate::Granularity;
use accident_lens::data::model::Column;

use crate::state::{AppState, BivariateMode, Page, PageResult};

// ---------------------------------------------------------------------------
// Left side panel – navigation and filter widgets
// ---------------------------------------------------------------------------

/// Render the left navigation and filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Pages");
    ui.separator();
    for page in Page::iter() {
        if ui.selectable_label(state.page == page, page.to_string()).clicked() {
            state.set_page(page);
        }
    }
    ui.add_space(8.0);

    ui.heading("Filters");
    ui.separator();

    // Hold our own handle so filter toggles can borrow `state` mutably.
    let Some(dataset) = state.dataset.clone() else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for &col in Column::FILTERABLE.iter() {
                let Some(all_values) = dataset.distinct_values(col) else {
                    continue;
                };

                // An empty selection means the column is unconstrained.
                let n_selected = state.filters.selected(col).map_or(0, |s| s.len());
                let n_total = all_values.len();
                let header_text = if n_selected == 0 {
                    format!("{col}  (all {n_total})")
                } else {
                    format!("{col}  ({n_selected}/{n_total})")
                };

                egui::CollapsingHeader::new(RichText::new(header_text).strong())
                    .id_salt(col)
                    .default_open(false)
                    .show(ui, |ui: &mut Ui| {
                        if ui.small_button("Clear").clicked() {
                            state.clear_filter(col);
                        }

                        for val in all_values {
                            let mut text = RichText::new(val.to_string());
                            if col == Column::Severity {
                                if let Some(cm) = &state.severity_colors {
                                    text = text.color(cm.color_for(val));
                                }
                            }

                            let mut checked = state.filters.is_selected(col, val);
                            if ui.checkbox(&mut checked, text).changed() {
                                state.toggle_filter_value(col, val);
                            }
                        }
                    });
            }
        });
}

// ---------------------------------------------------------------------------
// Per-page controls (top of the central panel)
// ---------------------------------------------------------------------------

fn column_combo(ui: &mut Ui, id: &str, current: &mut Column, choices: &[Column]) -> bool {
    let mut changed = false;
    egui::ComboBox::from_id_salt(id)
        .selected_text(current.to_string())
        .show_ui(ui, |ui: &mut Ui| {
            for &col in choices {
                changed |= ui.selectable_value(current, col, col.to_string()).changed();
            }
        });
    changed
}

/// Render the selection widgets of the current page.
pub fn page_controls(ui: &mut Ui, state: &mut AppState) {
    ui.heading(state.page.to_string());

    match state.page {
        Page::Univariate => {
            let choices =
                state.columns_where(|c| c.is_numeric() || c.is_categorical());
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Column");
                if column_combo(ui, "univariate", &mut state.selections.univariate, &choices) {
                    state.mark_dirty();
                }
            });
        }
        Page::Bivariate => {
            ui.horizontal(|ui: &mut Ui| {
                for mode in BivariateMode::iter() {
                    if ui
                        .radio(state.selections.bivariate_mode == mode, mode.to_string())
                        .clicked()
                    {
                        state.set_bivariate_mode(mode);
                    }
                }
            });
            let mode = state.selections.bivariate_mode;
            let x_choices = state.columns_where(|c| mode.accepts(c, true));
            let y_choices = state.columns_where(|c| mode.accepts(c, false));
            ui.horizontal(|ui: &mut Ui| {
                ui.label("X");
                let x = column_combo(ui, "bivariate_x", &mut state.selections.x, &x_choices);
                ui.label("Y");
                let y = column_combo(ui, "bivariate_y", &mut state.selections.y, &y_choices);
                if x || y {
                    state.mark_dirty();
                }
            });
        }
        Page::TimeSeries => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Granularity");
                for g in Granularity::iter() {
                    if ui
                        .selectable_value(&mut state.selections.granularity, g, g.to_string())
                        .changed()
                    {
                        state.mark_dirty();
                    }
                }
            });
        }
        Page::Hotspots => {
            ui.horizontal(|ui: &mut Ui| {
                ui.label("eps (degrees)");
                let eps = ui.add(
                    egui::DragValue::new(&mut state.selections.hotspot.eps)
                        .speed(0.005)
                        .range(0.001..=5.0),
                );
                ui.label("min samples");
                let min = ui.add(
                    egui::DragValue::new(&mut state.selections.hotspot.min_samples)
                        .range(1..=10_000),
                );
                // Re-cluster once dragging stops, not on every intermediate value.
                if eps.drag_stopped() || eps.lost_focus() || min.drag_stopped() || min.lost_focus()
                {
                    state.mark_dirty();
                }
            });
            ui.label(format!(
                "Clustering a sample of up to {} accidents.",
                state.config.hotspot.sample_size
            ));
        }
        Page::DatasetInfo | Page::Geospatial | Page::Correlation => {}
    }
    ui.separator();
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.dataset.is_some(), egui::Button::new("Reload"))
                .clicked()
            {
                state.reload();
                ui.close_menu();
            }
            let can_export = state.result.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export JSON…"))
                .clicked()
            {
                export_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} accidents loaded, {} visible",
                ds.len(),
                state.visible_indices.len()
            ));
            if ds.skipped_rows > 0 {
                ui.label(
                    RichText::new(format!("{} rows skipped", ds.skipped_rows))
                        .color(Color32::YELLOW),
                );
            }
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

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open accident data")
        .add_filter("Supported files", &["csv", "parquet", "pq", "json"])
        .add_filter("CSV", &["csv"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("JSON", &["json"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
        if let Some(ds) = &state.dataset {
            log::info!("Loaded {} accidents with columns {:?}", ds.len(), ds.columns);
        }
    }
}

fn export_dialog(state: &mut AppState) {
    let Some(result) = &state.result else {
        return;
    };
    let file = rfd::FileDialog::new()
        .set_title("Export page data")
        .set_file_name("accident-lens.json")
        .add_filter("JSON", &["json"])
        .save_file();

    if let Some(path) = file {
        match export_json(result, &path) {
            Ok(()) => {
                log::info!("Exported {} to {}", state.page, path.display());
                state.status_message = None;
            }
            Err(e) => {
                log::error!("Export failed: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}

/// Write the current page's result as pretty JSON.
pub fn export_json(result: &PageResult, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(result).context("serializing page result")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use accident_lens::data::aggregate::{FrequencyEntry, FrequencyTable};
    use accident_lens::data::model::CellValue;

    #[test]
    fn test_export_json_writes_tagged_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let result = PageResult::Frequency(FrequencyTable {
            column: Column::State,
            entries: vec![FrequencyEntry {
                value: CellValue::from("CA"),
                count: 3,
            }],
        });

        export_json(&result, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["kind"], "frequency");
        assert_eq!(written["column"], "State");
        assert_eq!(written["entries"][0]["value"], "CA");
        assert_eq!(written["entries"][0]["count"], 3);
    }

    #[test]
    fn test_export_json_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let result = PageResult::Map { points: vec![] };
        let err = export_json(&result, &path).unwrap_err();
        assert!(format!("{err:#}").contains("writing"));
    }
}
