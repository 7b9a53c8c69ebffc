use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use eframe::egui::{self, Align2, Color32, FontId, RichText, Sense, Ui, Vec2};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Line, Plot, PlotPoints,
    Points,
};

use accident_lens::data::aggregate::{CrossTab, FrequencyTable, Histogram, TimeSeries};
use accident_lens::data::model::CellValue;
use accident_lens::data::spatial::{ClusterAssignment, GeoPoint, NOISE};
use accident_lens::data::stats::{CorrelationMatrix, GroupedDistribution, ScatterSeries};

use crate::color::{self, ColorMap};
use crate::state::{AppState, PageResult};
use crate::ui::table;

const BAR_COLOR: Color32 = Color32::from_rgb(100, 150, 220);
const HOTSPOT_ROWS: usize = 20;

// ---------------------------------------------------------------------------
// Central panel dispatch
// ---------------------------------------------------------------------------

/// Render the current page's result in the central panel.
pub fn page_view(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to explore accidents  (File → Open…)");
        });
        return;
    }
    let Some(result) = &state.result else {
        ui.label("Nothing to show for the current selection.");
        return;
    };

    match result {
        PageResult::Info { summary, numeric } => {
            egui::ScrollArea::vertical().show(ui, |ui: &mut Ui| {
                ui.label(format!(
                    "{} rows × {} columns, {} missing cells",
                    summary.rows, summary.columns, summary.missing_cells
                ));
                ui.add_space(6.0);
                ui.strong("Data sample");
                if let Some(view) = state.view() {
                    table::data_preview(ui, &view);
                }
                ui.add_space(6.0);
                ui.strong("Summary statistics");
                table::numeric_summaries(ui, numeric);
                ui.add_space(6.0);
                ui.strong("Missing values");
                table::missing_values(ui, summary);
            });
        }
        PageResult::Frequency(table) => frequency_chart(ui, table),
        PageResult::Histogram { histogram, summary } => {
            if let Some(s) = summary {
                ui.label(format!(
                    "n = {}   mean = {:.3}   median = {:.3}   min = {:.3}   max = {:.3}",
                    s.count, s.mean, s.median, s.min, s.max
                ));
            }
            histogram_chart(ui, histogram);
        }
        PageResult::Scatter(series) => scatter_chart(ui, series),
        PageResult::Grouped(grouped) => box_chart(ui, grouped),
        PageResult::CrossTab(tab) => cross_tab_grid(ui, tab),
        PageResult::TimeSeries(series) => time_series_chart(ui, series),
        PageResult::Map { points } => accident_map(ui, points, state.severity_colors.as_ref()),
        PageResult::Hotspots {
            points,
            assignment,
            hotspots,
        } => {
            ui.label(format!(
                "{} clusters, {} noise points",
                assignment.n_clusters,
                assignment.noise_count()
            ));
            hotspot_map(ui, points, assignment);
            table::hotspot_table(ui, hotspots, HOTSPOT_ROWS);
        }
        PageResult::Correlation(matrix) => correlation_grid(ui, matrix),
    }
}

/// Axis formatter naming integer ticks `0..labels.len()` and blanking the rest.
fn category_axis(labels: Vec<String>) -> impl Fn(GridMark, &RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let i = mark.value.round();
        if (mark.value - i).abs() > 1e-6 || i < 0.0 {
            return String::new();
        }
        labels.get(i as usize).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// Horizontal bars, most frequent on top.
fn frequency_chart(ui: &mut Ui, table: &FrequencyTable) {
    let n = table.entries.len();
    let labels: Vec<String> = table.entries.iter().map(|e| e.value.to_string()).collect();
    let bars: Vec<Bar> = table
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            Bar::new((n - 1 - i) as f64, e.count as f64)
                .name(e.value.to_string())
                .fill(BAR_COLOR)
        })
        .collect();

    Plot::new("frequency_plot")
        .x_axis_label("Count")
        .y_axis_formatter(category_axis(labels.into_iter().rev().collect()))
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).horizontal().name(table.column.to_string()));
        });
}

fn histogram_chart(ui: &mut Ui, histogram: &Histogram) {
    let bars: Vec<Bar> = histogram
        .bins
        .iter()
        .map(|b| {
            let width = b.upper - b.lower;
            Bar::new(b.lower + width / 2.0, b.count as f64)
                .width(width)
                .fill(BAR_COLOR)
        })
        .collect();

    Plot::new("histogram_plot")
        .x_axis_label(histogram.column.to_string())
        .y_axis_label("Count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(histogram.column.to_string()));
        });
}

// ---------------------------------------------------------------------------
// Two-variable charts
// ---------------------------------------------------------------------------

fn scatter_chart(ui: &mut Ui, series: &ScatterSeries) {
    ui.label(format!("{} points", series.points.len()));
    let points: PlotPoints = series.points.iter().copied().collect();
    Plot::new("scatter_plot")
        .x_axis_label(series.x.to_string())
        .y_axis_label(series.y.to_string())
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).radius(1.5).color(BAR_COLOR.gamma_multiply(0.5)));
        });
}

fn box_chart(ui: &mut Ui, grouped: &GroupedDistribution) {
    let labels: Vec<String> = grouped.groups.iter().map(|g| g.key.to_string()).collect();
    let boxes: Vec<BoxElem> = grouped
        .groups
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let s = &g.summary;
            BoxElem::new(i as f64, BoxSpread::new(s.min, s.q1, s.median, s.q3, s.max))
                .name(g.key.to_string())
                .box_width(0.6)
        })
        .collect();

    Plot::new("box_plot")
        .x_axis_label(grouped.category.to_string())
        .y_axis_label(grouped.numeric.to_string())
        .x_axis_formatter(category_axis(labels))
        .show(ui, |plot_ui| {
            plot_ui.box_plot(BoxPlot::new(boxes).name(grouped.numeric.to_string()));
        });
}

fn time_series_chart(ui: &mut Ui, series: &TimeSeries) {
    let labels: Vec<String> = series.points.iter().map(|p| p.label.clone()).collect();
    let points: PlotPoints = series
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| [i as f64, p.count as f64])
        .collect();

    Plot::new("time_series_plot")
        .x_axis_label(series.granularity.to_string())
        .y_axis_label("Accidents")
        .x_axis_formatter(category_axis(labels))
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).name("Accidents").width(1.5));
        });
}

// ---------------------------------------------------------------------------
// Maps (longitude on x, latitude on y)
// ---------------------------------------------------------------------------

fn legend_row(ui: &mut Ui, colors: &ColorMap, prefix: &str) {
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for (label, c) in colors.legend_entries() {
            ui.label(RichText::new(format!("● {prefix}{label}")).color(c));
        }
    });
}

fn accident_map(ui: &mut Ui, points: &[GeoPoint], colors: Option<&ColorMap>) {
    let mut by_severity: BTreeMap<Option<u8>, Vec<[f64; 2]>> = BTreeMap::new();
    for p in points {
        by_severity.entry(p.severity).or_default().push([p.lng, p.lat]);
    }
    if let Some(cm) = colors {
        legend_row(ui, cm, "Severity ");
    }

    Plot::new("accident_map")
        .data_aspect(1.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .show(ui, |plot_ui| {
            for (severity, coords) in by_severity {
                let color = match (severity, colors) {
                    (Some(s), Some(cm)) => cm.color_for(&CellValue::Integer(i64::from(s))),
                    _ => Color32::GRAY,
                };
                let name = severity.map_or_else(|| "Unknown".to_string(), |s| format!("Severity {s}"));
                let pts: PlotPoints = coords.into_iter().collect();
                plot_ui.points(Points::new(pts).radius(1.5).color(color).name(name));
            }
        });
}

fn hotspot_map(ui: &mut Ui, points: &[[f64; 2]], assignment: &ClusterAssignment) {
    let colors = ColorMap::for_clusters(assignment.n_clusters);
    let mut by_label: BTreeMap<i32, Vec<[f64; 2]>> = BTreeMap::new();
    for (p, &label) in points.iter().zip(&assignment.labels) {
        by_label.entry(label).or_default().push([p[1], p[0]]);
    }

    Plot::new("hotspot_map")
        .data_aspect(1.0)
        .legend(Legend::default())
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .height(ui.available_height() * 0.6)
        .show(ui, |plot_ui| {
            for (label, coords) in by_label {
                let (name, radius) = if label == NOISE {
                    ("Noise".to_string(), 1.0)
                } else {
                    (format!("Cluster {label}"), 2.0)
                };
                let color = colors.color_for(&CellValue::Integer(i64::from(label)));
                let pts: PlotPoints = coords.into_iter().collect();
                plot_ui.points(Points::new(pts).radius(radius).color(color).name(name));
            }
        });
}

// ---------------------------------------------------------------------------
// Heat grids
// ---------------------------------------------------------------------------

const CELL: Vec2 = Vec2::new(64.0, 28.0);

fn heat_cell(ui: &mut Ui, text: &str, fill: Color32, hover: String) {
    let (rect, response) = ui.allocate_exact_size(CELL, Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect.shrink(1.0), 2.0, fill);
    let [r, g, b, _] = fill.to_array();
    let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    let text_color = if luma > 150.0 {
        Color32::BLACK
    } else {
        Color32::WHITE
    };
    painter.text(
        rect.center(),
        Align2::CENTER_CENTER,
        text,
        FontId::proportional(12.0),
        text_color,
    );
    response.on_hover_text(hover);
}

fn correlation_grid(ui: &mut Ui, matrix: &CorrelationMatrix) {
    egui::ScrollArea::both().show(ui, |ui: &mut Ui| {
        egui::Grid::new("correlation_grid")
            .spacing([0.0, 0.0])
            .show(ui, |ui: &mut Ui| {
                ui.label("");
                for col in &matrix.columns {
                    ui.strong(col.to_string());
                }
                ui.end_row();

                for (i, row_col) in matrix.columns.iter().enumerate() {
                    ui.strong(row_col.to_string());
                    for (j, col) in matrix.columns.iter().enumerate() {
                        let r = matrix.values[i][j];
                        let text = r.map_or_else(|| "–".to_string(), |r| format!("{r:.2}"));
                        let hover = format!("{row_col} × {col}: {text}");
                        heat_cell(ui, &text, color::diverging(r), hover);
                    }
                    ui.end_row();
                }
            });
    });
}

fn cross_tab_grid(ui: &mut Ui, tab: &CrossTab) {
    let max = tab.max_count().max(1) as f64;
    ui.label(format!("{} accidents with both values", tab.total()));
    egui::ScrollArea::both().show(ui, |ui: &mut Ui| {
        egui::Grid::new("cross_tab_grid")
            .spacing([0.0, 0.0])
            .show(ui, |ui: &mut Ui| {
                ui.strong(format!("{} \\ {}", tab.row_column, tab.col_column));
                for v in &tab.col_values {
                    ui.strong(v.to_string());
                }
                ui.end_row();

                for (r, row_value) in tab.row_values.iter().enumerate() {
                    ui.strong(row_value.to_string());
                    for (c, col_value) in tab.col_values.iter().enumerate() {
                        let count = tab.counts[r][c];
                        let fill = color::diverging(Some(count as f64 / max));
                        let hover = format!("{row_value} / {col_value}: {count}");
                        heat_cell(ui, &count.to_string(), fill, hover);
                    }
                    ui.end_row();
                }
            });
    });
}
