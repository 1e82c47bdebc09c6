use std::f64::consts::PI;

use crate::core::payload::ChartPayload;

use super::{legend, series_color, LegendEntry};

pub const RADAR_VIEWPORT: f64 = 300.0;
pub const RADAR_CENTER: f64 = 150.0;
pub const RADAR_RADIUS: f64 = 110.0;
pub const RADAR_SCALE: f64 = 10.0;
pub const RADAR_LABEL_FACTOR: f64 = 1.15;
pub const RADAR_RING_FRACTIONS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

/// Viewport coordinates with `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarAxis {
    pub label: String,
    pub end: Point,
    pub label_at: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarPolygon {
    pub label: String,
    pub color: String,
    /// Values on the `0..=10` scale, one per category.
    pub values: Vec<f64>,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarChartModel {
    pub title: Option<String>,
    pub rings: Vec<Vec<Point>>,
    pub axes: Vec<RadarAxis>,
    pub polygons: Vec<RadarPolygon>,
    pub legend: Vec<LegendEntry>,
}

/// Maps a raw value onto the 0–10 radar scale. Values above 100 are read as
/// parts of 10000, values in `(10, 100]` as percentages, anything else as
/// already scaled.
pub fn normalize_radar_value(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scaled = if value > 100.0 {
        value / 10_000.0 * RADAR_SCALE
    } else if value > 10.0 {
        value / 100.0 * RADAR_SCALE
    } else {
        value
    };
    scaled.clamp(0.0, RADAR_SCALE)
}

/// Point on axis `index` of `count`, at `fraction` of the radius. The first
/// axis points straight up and axes advance clockwise.
pub fn radar_point(index: usize, count: usize, fraction: f64) -> Point {
    let angle_step = 2.0 * PI / count.max(1) as f64;
    let angle = -PI / 2.0 + angle_step * index as f64;
    let r = RADAR_RADIUS * fraction;
    Point {
        x: RADAR_CENTER + r * angle.cos(),
        y: RADAR_CENTER + r * angle.sin(),
    }
}

pub(super) fn build(payload: &ChartPayload) -> RadarChartModel {
    let count = payload.categories.len();

    let rings = RADAR_RING_FRACTIONS
        .iter()
        .map(|&fraction| (0..count).map(|i| radar_point(i, count, fraction)).collect())
        .collect();

    let axes = payload
        .categories
        .iter()
        .enumerate()
        .map(|(i, label)| RadarAxis {
            label: label.clone(),
            end: radar_point(i, count, 1.0),
            label_at: radar_point(i, count, RADAR_LABEL_FACTOR),
        })
        .collect();

    let polygons = payload
        .series
        .iter()
        .enumerate()
        .map(|(series_index, series)| {
            let values: Vec<f64> = (0..count)
                .map(|i| normalize_radar_value(series.value_at(i)))
                .collect();
            let points = values
                .iter()
                .enumerate()
                .map(|(i, value)| radar_point(i, count, value / RADAR_SCALE))
                .collect();
            RadarPolygon {
                label: series.label.clone(),
                color: series_color(series, series_index),
                values,
                points,
            }
        })
        .collect();

    RadarChartModel {
        title: payload.title.clone(),
        rings,
        axes,
        polygons,
        legend: legend(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::{ChartKind, ChartSeries};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn normalization_boundaries() {
        assert!(close(normalize_radar_value(200.0), 0.2));
        assert!(close(normalize_radar_value(100.0), 10.0));
        assert!(close(normalize_radar_value(50.0), 5.0));
        assert!(close(normalize_radar_value(10.0), 10.0));
        assert!(close(normalize_radar_value(7.5), 7.5));
        assert!(close(normalize_radar_value(-3.0), 0.0));
        assert!(close(normalize_radar_value(50_000.0), 10.0));
        assert!(close(normalize_radar_value(f64::NAN), 0.0));
    }

    #[test]
    fn first_axis_points_up_and_turns_clockwise() {
        let top = radar_point(0, 4, 1.0);
        assert!(close(top.x, 150.0) && close(top.y, 40.0));
        let right = radar_point(1, 4, 1.0);
        assert!(close(right.x, 260.0) && close(right.y, 150.0));
        let label = radar_point(0, 4, RADAR_LABEL_FACTOR);
        assert!(close(label.y, 150.0 - 110.0 * 1.15));
    }

    #[test]
    fn model_has_rings_axes_and_polygons() {
        let payload = ChartPayload {
            kind: ChartKind::Radar,
            title: None,
            categories: vec!["Sweet".into(), "Sour".into(), "Crunch".into()],
            series: vec![ChartSeries {
                label: "A".into(),
                data: vec![10.0, 50.0],
                color: None,
            }],
        };
        let model = build(&payload);
        assert_eq!(model.rings.len(), 4);
        assert!(model.rings.iter().all(|ring| ring.len() == 3));
        assert_eq!(model.axes.len(), 3);
        let polygon = &model.polygons[0];
        assert_eq!(polygon.values, vec![10.0, 5.0, 0.0]);
        assert_eq!(polygon.points[0], radar_point(0, 3, 1.0));
        assert_eq!(polygon.points[2], Point { x: 150.0, y: 150.0 });
    }
}
