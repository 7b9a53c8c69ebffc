use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use accident_lens::data::model::{AccidentDataset, CellValue, Column};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_color32(hsl: Hsl) -> Color32 {
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            hsl_to_color32(Hsl::new(hue, 0.75, 0.55))
        })
        .collect()
}

/// Blue for -1, near-white for 0, red for +1. Undefined cells are grey.
pub fn diverging(r: Option<f64>) -> Color32 {
    let Some(r) = r else {
        return Color32::DARK_GRAY;
    };
    let r = r.clamp(-1.0, 1.0) as f32;
    let hue = if r < 0.0 { 225.0 } else { 5.0 };
    hsl_to_color32(Hsl::new(hue, 0.7, 0.95 - 0.45 * r.abs()))
}

// ---------------------------------------------------------------------------
// Color mapping: cell value → Color32
// ---------------------------------------------------------------------------

/// Maps the values of a chosen column (or cluster labels) to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map from the values in display order.
    pub fn new(values: impl IntoIterator<Item = CellValue>) -> Self {
        let values: Vec<CellValue> = values.into_iter().collect();
        let palette = generate_palette(values.len());
        ColorMap {
            mapping: values.into_iter().zip(palette).collect(),
            default_color: Color32::GRAY,
        }
    }

    /// Severity levels of the dataset.
    pub fn for_severity(dataset: &AccidentDataset) -> Self {
        Self::new(
            dataset
                .distinct_values(Column::Severity)
                .into_iter()
                .flatten()
                .cloned(),
        )
    }

    /// Cluster labels `0..n`; noise falls back to the default grey.
    pub fn for_clusters(n_clusters: usize) -> Self {
        Self::new((0..n_clusters as i64).map(CellValue::Integer))
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_colors_leave_noise_grey() {
        let cm = ColorMap::for_clusters(3);
        assert_eq!(cm.legend_entries().len(), 3);
        assert_eq!(cm.color_for(&CellValue::Integer(-1)), Color32::GRAY);
        assert_ne!(cm.color_for(&CellValue::Integer(0)), cm.color_for(&CellValue::Integer(1)));
    }

    #[test]
    fn test_diverging_scale() {
        assert_eq!(diverging(None), Color32::DARK_GRAY);
        let hot = diverging(Some(1.0));
        let cold = diverging(Some(-1.0));
        assert!(hot.r() > hot.b());
        assert!(cold.b() > cold.r());
    }
}
