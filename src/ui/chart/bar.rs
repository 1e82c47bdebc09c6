use crate::core::payload::ChartPayload;

use super::{legend, series_color, LegendEntry};

const HEADROOM: f64 = 1.1;
const MIN_MAX_VALUE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BarValue {
    pub label: String,
    pub value: f64,
    /// Fraction of the full bar height, in `0.0..=1.0`.
    pub height: f64,
    pub color: String,
}

/// All bars of one category, one per series.
#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub category: String,
    pub bars: Vec<BarValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChartModel {
    pub title: Option<String>,
    pub max_value: f64,
    pub groups: Vec<BarGroup>,
    pub legend: Vec<LegendEntry>,
}

/// Top of the value axis: the largest value plus 10% headroom, or 10 when
/// that is not a positive number.
pub fn bar_max_value(payload: &ChartPayload) -> f64 {
    let largest = payload
        .series
        .iter()
        .flat_map(|series| series.data.iter().copied())
        .filter(|value| value.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let max = largest * HEADROOM;
    if max.is_finite() && max > 0.0 {
        max
    } else {
        MIN_MAX_VALUE
    }
}

pub(super) fn build(payload: &ChartPayload) -> BarChartModel {
    let max_value = bar_max_value(payload);
    let groups = payload
        .categories
        .iter()
        .enumerate()
        .map(|(index, category)| BarGroup {
            category: category.clone(),
            bars: payload
                .series
                .iter()
                .enumerate()
                .map(|(series_index, series)| {
                    let value = series.value_at(index);
                    BarValue {
                        label: series.label.clone(),
                        value,
                        height: (value / max_value).clamp(0.0, 1.0),
                        color: series_color(series, series_index),
                    }
                })
                .collect(),
        })
        .collect();

    BarChartModel {
        title: payload.title.clone(),
        max_value,
        groups,
        legend: legend(payload),
    }
}
