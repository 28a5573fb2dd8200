//! Theme-aware chart colors.

use parley_core::{AxisStyle, ChartType, Paint, SeriesStyle, ThemeVariant};

type Rgb = (u8, u8, u8);

const LIGHT: [Rgb; 7] = [
    (25, 118, 210),
    (56, 142, 60),
    (245, 124, 0),
    (123, 31, 162),
    (211, 47, 47),
    (0, 151, 167),
    (93, 64, 55),
];

const DARK: [Rgb; 7] = [
    (100, 181, 246),
    (129, 199, 132),
    (255, 183, 77),
    (186, 104, 200),
    (229, 115, 115),
    (77, 208, 225),
    (161, 136, 127),
];

fn palette(theme: ThemeVariant) -> &'static [Rgb; 7] {
    match theme {
        ThemeVariant::Light => &LIGHT,
        ThemeVariant::Dark => &DARK,
    }
}

fn fill((r, g, b): Rgb) -> String {
    format!("rgba({}, {}, {}, 0.7)", r, g, b)
}

fn stroke((r, g, b): Rgb) -> String {
    format!("rgba({}, {}, {}, 1)", r, g, b)
}

/// Palette style for one series.
///
/// Bar and pie charts get one color per category, cycling through the
/// palette. Line charts get a single color chosen by series position.
pub fn series_style(
    theme: ThemeVariant,
    chart_type: ChartType,
    label_count: usize,
    series_index: usize,
) -> SeriesStyle {
    let colors = palette(theme);
    if chart_type.colors_per_category() {
        let picks: Vec<Rgb> = (0..label_count).map(|i| colors[i % colors.len()]).collect();
        SeriesStyle {
            fill: Paint::PerCategory(picks.iter().copied().map(fill).collect()),
            stroke: Paint::PerCategory(picks.iter().copied().map(stroke).collect()),
        }
    } else {
        let pick = colors[series_index % colors.len()];
        SeriesStyle {
            fill: Paint::Single(fill(pick)),
            stroke: Paint::Single(stroke(pick)),
        }
    }
}

/// Title, legend and tick text color.
pub fn text_color(theme: ThemeVariant) -> &'static str {
    match theme {
        ThemeVariant::Light => "#212529",
        ThemeVariant::Dark => "#E0E0E0",
    }
}

pub fn grid_color(theme: ThemeVariant) -> &'static str {
    match theme {
        ThemeVariant::Light => "rgba(0, 0, 0, 0.1)",
        ThemeVariant::Dark => "rgba(255, 255, 255, 0.1)",
    }
}

/// Axis colors, or `None` for charts without axes.
pub fn axis_style(theme: ThemeVariant, chart_type: ChartType) -> Option<AxisStyle> {
    match chart_type {
        ChartType::Pie => None,
        ChartType::Bar | ChartType::Line => Some(AxisStyle {
            text_color: text_color(theme).to_string(),
            grid_color: grid_color(theme).to_string(),
        }),
    }
}
