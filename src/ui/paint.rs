//! Paints render nodes, chart models and sources into styled terminal lines.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Context, Line as CanvasLine};
use ratatui::widgets::{Bar, BarChart, BarGroup as WidgetBarGroup, Block, Widget};
use unicode_width::UnicodeWidthStr;

use crate::core::assembly::ResponseSnapshot;
use crate::core::message::Source;
use crate::core::prompt::Language;
use crate::ui::chart::{
    render_chart, BarChartModel, ChartVisual, LegendEntry, Point, RadarChartModel, RADAR_VIEWPORT,
};
use crate::ui::markdown::{self, image_placeholder, Cell, InlineSpan, RenderNode};
use crate::ui::theme::Theme;
use crate::ui::wrap::wrap_spans;
use crate::utils::color::parse_color;

const MIN_WIDTH: u16 = 20;
const BAR_CHART_HEIGHT: u16 = 14;
const BAR_SCALE: u64 = 1000;
const RADAR_MAX_WIDTH: u16 = 64;

fn chart_color(raw: &str) -> Color {
    parse_color(raw).unwrap_or(Color::Reset)
}

pub fn inline_spans(spans: &[InlineSpan], base: Style, theme: &Theme) -> Vec<Span<'static>> {
    spans
        .iter()
        .map(|span| match span {
            InlineSpan::Plain(text) => Span::styled(text.clone(), base),
            InlineSpan::Bold(text) => Span::styled(text.clone(), base.patch(theme.bold_style)),
            InlineSpan::Image { alt, .. } => {
                Span::styled(image_placeholder(alt), theme.image_placeholder_style)
            }
        })
        .collect()
}

fn cell_width(cell: &Cell) -> usize {
    markdown::spans_text(cell).width()
}

fn paint_table(header: &[Cell], rows: &[Vec<Cell>], theme: &Theme) -> Vec<Line<'static>> {
    let columns = rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);
    if columns == 0 {
        return Vec::new();
    }

    let mut widths = vec![0usize; columns];
    for row in std::iter::once(header).chain(rows.iter().map(Vec::as_slice)) {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell_width(cell));
        }
    }

    let border = theme.table_border_style;
    let row_line = |cells: &[Cell], style: Style| {
        let mut spans = vec![Span::styled("│", border)];
        for (i, width) in widths.iter().enumerate() {
            spans.push(Span::raw(" "));
            let cell = cells.get(i).map(Vec::as_slice).unwrap_or(&[]);
            spans.extend(inline_spans(cell, style, theme));
            let pad = width.saturating_sub(cells.get(i).map_or(0, cell_width));
            spans.push(Span::raw(" ".repeat(pad + 1)));
            spans.push(Span::styled("│", border));
        }
        Line::from(spans)
    };
    let rule = |left: &str, mid: &str, right: &str| {
        let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        Line::from(Span::styled(
            format!("{left}{}{right}", inner.join(mid)),
            border,
        ))
    };

    let mut lines = vec![rule("┌", "┬", "┐"), row_line(header, theme.table_header_style)];
    lines.push(rule("├", "┼", "┤"));
    lines.extend(rows.iter().map(|row| row_line(row, theme.model_text_style)));
    lines.push(rule("└", "┴", "┘"));
    lines
}

/// Paints markdown nodes, wrapping prose to `width` columns.
pub fn paint_nodes(nodes: &[RenderNode], width: u16, theme: &Theme) -> Vec<Line<'static>> {
    let width = usize::from(width.max(MIN_WIDTH));
    let base = theme.model_text_style;
    let mut lines = Vec::new();

    for (index, node) in nodes.iter().enumerate() {
        if index > 0 && matches!(node, RenderNode::Heading { .. }) {
            lines.push(Line::default());
        }
        match node {
            RenderNode::Paragraph(spans) => {
                lines.extend(wrap_spans(
                    &inline_spans(spans, base, theme),
                    width,
                    Vec::new(),
                    &[],
                ));
            }
            RenderNode::Heading { level, text } => {
                let style = if *level <= 2 {
                    theme.heading2_style
                } else {
                    theme.heading3_style
                };
                lines.extend(wrap_spans(
                    &[Span::styled(text.clone(), style)],
                    width,
                    Vec::new(),
                    &[],
                ));
            }
            RenderNode::Label(text) => {
                lines.extend(wrap_spans(
                    &[Span::styled(text.clone(), theme.label_style)],
                    width,
                    Vec::new(),
                    &[],
                ));
            }
            RenderNode::ListBlock(items) => {
                let indent = [Span::raw("  ")];
                for item in items {
                    lines.extend(wrap_spans(
                        &inline_spans(item, base, theme),
                        width,
                        vec![Span::styled("• ", theme.list_marker_style)],
                        &indent,
                    ));
                }
            }
            RenderNode::TableBlock { header, rows } => {
                lines.extend(paint_table(header, rows, theme));
            }
        }
    }
    lines
}

/// Converts a rendered buffer into lines, merging runs of equally styled
/// cells and dropping trailing blanks.
pub fn buffer_lines(buffer: &Buffer) -> Vec<Line<'static>> {
    let width = usize::from(buffer.area.width);
    if width == 0 {
        return Vec::new();
    }

    buffer
        .content()
        .chunks(width)
        .map(|row| {
            let end = row
                .iter()
                .rposition(|cell| cell.symbol() != " ")
                .map_or(0, |i| i + 1);
            let mut spans: Vec<Span<'static>> = Vec::new();
            let mut text = String::new();
            let mut style = Style::default();
            let mut covered = 0usize;
            for cell in &row[..end] {
                // cells behind a wide glyph
                if covered > 0 {
                    covered -= 1;
                    continue;
                }
                covered = cell.symbol().width().saturating_sub(1);
                if cell.style() != style && !text.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut text), style));
                }
                style = cell.style();
                text.push_str(cell.symbol());
            }
            if !text.is_empty() {
                spans.push(Span::styled(text, style));
            }
            Line::from(spans)
        })
        .collect()
}

fn legend_line(legend: &[LegendEntry]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, entry) in legend.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled("■ ", Style::default().fg(chart_color(&entry.color))));
        spans.push(Span::raw(entry.label.clone()));
    }
    Line::from(spans)
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn chart_block(title: Option<&str>, theme: &Theme) -> Block<'static> {
    match title {
        Some(title) => Block::default().title(Span::styled(title.to_string(), theme.chart_title_style)),
        None => Block::default(),
    }
}

pub fn paint_bar_chart(model: &BarChartModel, width: u16, theme: &Theme) -> Vec<Line<'static>> {
    let width = width.max(MIN_WIDTH);
    let series = model.groups.first().map_or(0, |group| group.bars.len()).max(1);
    let groups = model.groups.len().max(1);
    let available = usize::from(width).saturating_sub(groups * 2);
    let bar_width = (available / (groups * series)).clamp(1, 7) as u16;

    let mut chart = BarChart::default()
        .block(chart_block(model.title.as_deref(), theme))
        .bar_width(bar_width)
        .bar_gap(0)
        .group_gap(2)
        .label_style(theme.chart_axis_style)
        .max(BAR_SCALE);
    for group in &model.groups {
        let bars: Vec<Bar<'static>> = group
            .bars
            .iter()
            .map(|bar| {
                let color = chart_color(&bar.color);
                Bar::default()
                    .value((bar.height * BAR_SCALE as f64).round() as u64)
                    .text_value(format_value(bar.value))
                    .style(Style::default().fg(color))
                    .value_style(Style::default().fg(Color::Black).bg(color))
            })
            .collect();
        chart = chart.data(
            WidgetBarGroup::default()
                .label(Line::from(group.category.clone()))
                .bars(&bars),
        );
    }

    let area = Rect::new(0, 0, width, BAR_CHART_HEIGHT);
    let mut buffer = Buffer::empty(area);
    chart.render(area, &mut buffer);

    let mut lines = buffer_lines(&buffer);
    lines.push(legend_line(&model.legend));
    lines
}

fn canvas_point(point: Point) -> (f64, f64) {
    (point.x, RADAR_VIEWPORT - point.y)
}

fn draw_loop(ctx: &mut Context<'_>, points: &[Point], color: Color) {
    for (i, start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        let (x1, y1) = canvas_point(*start);
        let (x2, y2) = canvas_point(end);
        ctx.draw(&CanvasLine::new(x1, y1, x2, y2, color));
    }
}

pub fn paint_radar_chart(
    model: &RadarChartModel,
    width: u16,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let width = width.clamp(MIN_WIDTH, RADAR_MAX_WIDTH);
    let title_rows = u16::from(model.title.is_some());
    // Terminal cells are about twice as tall as wide.
    let area = Rect::new(0, 0, width, width / 2 + title_rows);
    let axis_color = theme.chart_axis_style.fg.unwrap_or(Color::Reset);

    let canvas = Canvas::default()
        .block(chart_block(model.title.as_deref(), theme))
        .marker(Marker::Braille)
        .x_bounds([0.0, RADAR_VIEWPORT])
        .y_bounds([0.0, RADAR_VIEWPORT])
        .paint(|ctx| {
            for ring in &model.rings {
                if ring.len() > 1 {
                    draw_loop(ctx, ring, axis_color);
                }
            }
            for axis in &model.axes {
                let center = Point {
                    x: RADAR_VIEWPORT / 2.0,
                    y: RADAR_VIEWPORT / 2.0,
                };
                let (x1, y1) = canvas_point(center);
                let (x2, y2) = canvas_point(axis.end);
                ctx.draw(&CanvasLine::new(x1, y1, x2, y2, axis_color));
            }
            ctx.layer();
            for polygon in &model.polygons {
                if polygon.points.len() > 1 {
                    draw_loop(ctx, &polygon.points, chart_color(&polygon.color));
                }
            }
            ctx.layer();
            for axis in &model.axes {
                let (x, y) = canvas_point(axis.label_at);
                let half = axis.label.width() as f64 * RADAR_VIEWPORT / f64::from(width) / 2.0;
                ctx.print(
                    (x - half).max(0.0),
                    y,
                    Span::styled(axis.label.clone(), theme.chart_axis_style),
                );
            }
        });

    let mut buffer = Buffer::empty(area);
    canvas.render(area, &mut buffer);

    let mut lines = buffer_lines(&buffer);
    lines.push(legend_line(&model.legend));
    lines
}

pub fn paint_chart(visual: &ChartVisual, width: u16, theme: &Theme) -> Vec<Line<'static>> {
    match visual {
        ChartVisual::Bar(model) => paint_bar_chart(model, width, theme),
        ChartVisual::Radar(model) => paint_radar_chart(model, width, theme),
    }
}

pub fn paint_sources(sources: &[Source], language: Language, theme: &Theme) -> Vec<Line<'static>> {
    if sources.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![Line::from(Span::styled(
        format!("{}:", language.sources_label()),
        theme.system_text_style,
    ))];
    for (i, source) in sources.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("  [{}] ", i + 1), theme.system_text_style),
            Span::raw(source.title.clone()),
            Span::raw(" "),
            Span::styled(source.uri.clone(), theme.source_style),
        ]));
    }
    lines
}

/// Paints a whole model answer: text, chart, then sources.
pub fn paint_response(
    snapshot: &ResponseSnapshot,
    language: Language,
    width: u16,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut lines = paint_nodes(&markdown::render(&snapshot.display_text), width, theme);

    if let Some(visual) = snapshot.chart.as_ref().and_then(render_chart) {
        lines.push(Line::default());
        lines.extend(paint_chart(&visual, width, theme));
    }
    if !snapshot.sources.is_empty() {
        lines.push(Line::default());
        lines.extend(paint_sources(&snapshot.sources, language, theme));
    }
    if snapshot.is_streaming {
        lines.push(Line::from(Span::styled("…", theme.streaming_indicator_style)));
    }
    lines
}

pub fn paint_user(text: &str, has_image: bool, width: u16, theme: &Theme) -> Vec<Line<'static>> {
    let mut spans = Vec::new();
    if has_image {
        spans.push(Span::styled(
            format!("{} ", image_placeholder("")),
            theme.image_placeholder_style,
        ));
    }
    spans.push(Span::styled(text.to_string(), theme.user_text_style));
    wrap_spans(
        &spans,
        usize::from(width.max(MIN_WIDTH)),
        vec![Span::styled("You: ", theme.user_prefix_style)],
        &[Span::raw("     ")],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::{ChartKind, ChartPayload, ChartSeries};

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn table_columns_align_by_display_width() {
        let nodes = markdown::render("| Tên | Giá |\n|---|---|\n| Bánh | 12 |");
        let lines = text_of(&paint_nodes(&nodes, 80, &Theme::fixed()));
        assert_eq!(
            lines,
            vec![
                "┌──────┬─────┐",
                "│ Tên  │ Giá │",
                "├──────┼─────┤",
                "│ Bánh │ 12  │",
                "└──────┴─────┘",
            ]
        );
    }

    #[test]
    fn list_items_get_markers_and_images_placeholders() {
        let nodes = markdown::render("- ![Cake](https://x.example/c.png) **soft**");
        let lines = text_of(&paint_nodes(&nodes, 80, &Theme::fixed()));
        assert_eq!(lines, vec!["• [image: Cake] soft"]);
    }

    #[test]
    fn bar_chart_paints_values_and_legend() {
        let payload = ChartPayload {
            kind: ChartKind::Bar,
            title: Some("Price".into()),
            categories: vec!["A".into(), "B".into()],
            series: vec![
                ChartSeries {
                    label: "2023".into(),
                    data: vec![10.0, 20.0],
                    color: None,
                },
                ChartSeries {
                    label: "2024".into(),
                    data: vec![15.0, 5.0],
                    color: None,
                },
            ],
        };
        let visual = render_chart(&payload).expect("chart");
        let lines = text_of(&paint_chart(&visual, 40, &Theme::fixed()));
        assert_eq!(lines.len(), usize::from(BAR_CHART_HEIGHT) + 1);
        assert!(lines[0].starts_with("Price"));
        assert_eq!(lines.last().map(String::as_str), Some("■ 2023  ■ 2024"));
        assert!(lines.iter().any(|line| line.contains('A') && line.contains('B')));
    }

    #[test]
    fn radar_chart_prints_axis_labels() {
        let payload = ChartPayload {
            kind: ChartKind::Radar,
            title: None,
            categories: vec!["Sweet".into(), "Sour".into(), "Salty".into()],
            series: vec![ChartSeries {
                label: "A".into(),
                data: vec![8.0, 5.0, 2.0],
                color: Some("#22c55e".into()),
            }],
        };
        let visual = render_chart(&payload).expect("chart");
        let joined = text_of(&paint_chart(&visual, 40, &Theme::fixed())).join("\n");
        for label in ["Sweet", "Sour", "Salty"] {
            assert!(joined.contains(label), "missing {label} in\n{joined}");
        }
    }

    #[test]
    fn response_lists_sources_after_text() {
        let snapshot = ResponseSnapshot {
            display_text: "Hello".into(),
            sources: vec![Source::new("https://a.example", Some("A".into()))],
            chart: None,
            table: None,
            is_streaming: false,
        };
        let lines = text_of(&paint_response(&snapshot, Language::En, 80, &Theme::fixed()));
        assert_eq!(
            lines,
            vec!["Hello", "", "Sources:", "  [1] A https://a.example"]
        );
    }
}
