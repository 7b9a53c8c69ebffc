use eframe::egui::{RichText, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use accident_lens::data::filter::DatasetView;
use accident_lens::data::spatial::Hotspot;
use accident_lens::data::stats::{DatasetSummary, NumericSummary};
use accident_lens::data::model::Column;

const ROW_HEIGHT: f32 = 18.0;
const PREVIEW_ROWS: usize = 100;

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "–".to_string(), |v| format!("{v:.3}"))
}

/// First rows of the view, every loaded column.
pub fn data_preview(ui: &mut Ui, view: &DatasetView<'_>) {
    let columns = &view.dataset().columns;
    let rows: Vec<_> = view.iter().take(PREVIEW_ROWS).collect();

    ui.push_id("data_preview", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(300.0)
            .columns(TableColumn::auto().resizable(true), columns.len())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for col in columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(col.to_string());
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                    let accident = rows[row.index()];
                    for &col in columns {
                        row.col(|ui: &mut Ui| {
                            match accident.value(col) {
                                Some(v) => ui.label(v.to_string()),
                                None => ui.weak("NaN"),
                            };
                        });
                    }
                });
            });
    });
}

/// Missing-value counts per column.
pub fn missing_values(ui: &mut Ui, summary: &DatasetSummary) {
    ui.push_id("missing_values", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .column(TableColumn::auto().at_least(140.0))
            .columns(TableColumn::auto(), 2)
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for title in ["Column", "Missing", "Missing %"] {
                    header.col(|ui: &mut Ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for entry in &summary.per_column {
                    body.row(ROW_HEIGHT, |mut row| {
                        row.col(|ui: &mut Ui| {
                            ui.label(entry.column.to_string());
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(entry.missing.to_string());
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(format!("{:.2}", entry.missing_pct));
                        });
                    });
                }
            });
    });
}

/// `describe()`-style block, one row per numeric column.
pub fn numeric_summaries(ui: &mut Ui, summaries: &[(Column, NumericSummary)]) {
    const HEADERS: [&str; 9] = ["", "count", "mean", "std", "min", "25%", "50%", "75%", "max"];
    ui.push_id("numeric_summaries", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .columns(TableColumn::auto(), HEADERS.len())
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for title in HEADERS {
                    header.col(|ui: &mut Ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for (col, s) in summaries {
                    body.row(ROW_HEIGHT, |mut row| {
                        row.col(|ui: &mut Ui| {
                            ui.label(RichText::new(col.to_string()).strong());
                        });
                        let cells = [
                            s.count.to_string(),
                            format!("{:.3}", s.mean),
                            fmt_opt(s.std_dev),
                            format!("{:.3}", s.min),
                            format!("{:.3}", s.q1),
                            format!("{:.3}", s.median),
                            format!("{:.3}", s.q3),
                            format!("{:.3}", s.max),
                        ];
                        for cell in cells {
                            row.col(|ui: &mut Ui| {
                                ui.label(cell);
                            });
                        }
                    });
                }
            });
    });
}

/// Largest clusters with their centroids.
pub fn hotspot_table(ui: &mut Ui, hotspots: &[Hotspot], limit: usize) {
    ui.push_id("hotspots", |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .columns(TableColumn::auto(), 4)
            .header(ROW_HEIGHT + 2.0, |mut header| {
                for title in ["Cluster", "Accidents", "Latitude", "Longitude"] {
                    header.col(|ui: &mut Ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for h in hotspots.iter().take(limit) {
                    body.row(ROW_HEIGHT, |mut row| {
                        row.col(|ui: &mut Ui| {
                            ui.label(h.label.to_string());
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(h.size.to_string());
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(format!("{:.4}", h.centroid_lat));
                        });
                        row.col(|ui: &mut Ui| {
                            ui.label(format!("{:.4}", h.centroid_lng));
                        });
                    });
                }
            });
    });
}
