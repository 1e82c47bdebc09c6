//! Chart models derived from an extracted [`ChartPayload`].
//!
//! The models carry resolved colors, scaled values and geometry; painting
//! them into terminal widgets happens in [`crate::ui::paint`].

mod bar;
mod radar;

pub use bar::{bar_max_value, BarChartModel, BarGroup, BarValue};
pub use radar::{
    normalize_radar_value, radar_point, Point, RadarAxis, RadarChartModel, RadarPolygon,
    RADAR_CENTER, RADAR_LABEL_FACTOR, RADAR_RADIUS, RADAR_RING_FRACTIONS, RADAR_SCALE,
    RADAR_VIEWPORT,
};

use crate::core::payload::{ChartKind, ChartPayload, ChartSeries};

/// Fallback series colors, assigned by series position.
pub const PALETTE: [&str; 5] = ["#ec4899", "#3b82f6", "#eab308", "#22c55e", "#a855f7"];

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartVisual {
    Bar(BarChartModel),
    Radar(RadarChartModel),
}

impl ChartVisual {
    pub fn title(&self) -> Option<&str> {
        match self {
            ChartVisual::Bar(model) => model.title.as_deref(),
            ChartVisual::Radar(model) => model.title.as_deref(),
        }
    }

    pub fn legend(&self) -> &[LegendEntry] {
        match self {
            ChartVisual::Bar(model) => &model.legend,
            ChartVisual::Radar(model) => &model.legend,
        }
    }
}

pub fn series_color(series: &ChartSeries, index: usize) -> String {
    series
        .color
        .as_deref()
        .map(str::trim)
        .filter(|color| !color.is_empty())
        .unwrap_or(PALETTE[index % PALETTE.len()])
        .to_string()
}

fn legend(payload: &ChartPayload) -> Vec<LegendEntry> {
    payload
        .series
        .iter()
        .enumerate()
        .map(|(index, series)| LegendEntry {
            label: series.label.clone(),
            color: series_color(series, index),
        })
        .collect()
}

/// Builds the chart model for `payload`; `None` when it has no series.
pub fn render_chart(payload: &ChartPayload) -> Option<ChartVisual> {
    if payload.series.is_empty() {
        return None;
    }
    Some(match payload.kind {
        ChartKind::Bar => ChartVisual::Bar(bar::build(payload)),
        ChartKind::Radar => ChartVisual::Radar(radar::build(payload)),
    })
}
