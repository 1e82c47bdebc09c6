use ratatui::style::{Color, Modifier, Style};

use crate::utils::color::{quantize_style, ColorDepth};

#[derive(Debug, Clone)]
pub struct Theme {
    pub user_prefix_style: Style,
    pub user_text_style: Style,
    pub model_text_style: Style,
    pub error_text_style: Style,
    pub system_text_style: Style,
    pub streaming_indicator_style: Style,

    pub heading2_style: Style,
    pub heading3_style: Style,
    pub label_style: Style,
    pub bold_style: Style,
    pub list_marker_style: Style,
    pub image_placeholder_style: Style,

    pub table_border_style: Style,
    pub table_header_style: Style,

    pub chart_title_style: Style,
    pub chart_axis_style: Style,
    pub source_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::fixed()
    }
}

impl Theme {
    /// The one palette the client paints with: pink accents on the
    /// terminal's own background.
    pub fn fixed() -> Self {
        let pink = Color::Rgb(0xec, 0x48, 0x99);
        let slate = Color::Rgb(0x94, 0xa3, 0xb8);
        Theme {
            user_prefix_style: Style::default().fg(pink).add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(pink),
            model_text_style: Style::default(),
            error_text_style: Style::default().fg(Color::Rgb(0xef, 0x44, 0x44)),
            system_text_style: Style::default().fg(slate),
            streaming_indicator_style: Style::default()
                .fg(pink)
                .add_modifier(Modifier::SLOW_BLINK),

            heading2_style: Style::default().fg(pink).add_modifier(Modifier::BOLD),
            heading3_style: Style::default().add_modifier(Modifier::BOLD),
            label_style: Style::default()
                .fg(Color::Rgb(0xdb, 0x27, 0x77))
                .add_modifier(Modifier::BOLD),
            bold_style: Style::default().add_modifier(Modifier::BOLD),
            list_marker_style: Style::default().fg(pink),
            image_placeholder_style: Style::default().fg(slate).add_modifier(Modifier::ITALIC),

            table_border_style: Style::default().fg(slate),
            table_header_style: Style::default().fg(pink).add_modifier(Modifier::BOLD),

            chart_title_style: Style::default().add_modifier(Modifier::BOLD),
            chart_axis_style: Style::default().fg(slate),
            source_style: Style::default()
                .fg(Color::Rgb(0x3b, 0x82, 0xf6))
                .add_modifier(Modifier::UNDERLINED),
        }
    }

    /// Reduces every style to what the terminal can show.
    pub fn quantized(mut self, depth: ColorDepth) -> Self {
        if depth == ColorDepth::Truecolor {
            return self;
        }
        for style in [
            &mut self.user_prefix_style,
            &mut self.user_text_style,
            &mut self.model_text_style,
            &mut self.error_text_style,
            &mut self.system_text_style,
            &mut self.streaming_indicator_style,
            &mut self.heading2_style,
            &mut self.heading3_style,
            &mut self.label_style,
            &mut self.bold_style,
            &mut self.list_marker_style,
            &mut self.image_placeholder_style,
            &mut self.table_border_style,
            &mut self.table_header_style,
            &mut self.chart_title_style,
            &mut self.chart_axis_style,
            &mut self.source_style,
        ] {
            *style = quantize_style(*style, depth);
        }
        self
    }

    pub fn for_current_terminal() -> Self {
        Self::fixed().quantized(crate::utils::color::detect_color_depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantized_theme_has_no_rgb_colors() {
        let theme = Theme::fixed().quantized(ColorDepth::Ansi16);
        assert!(!matches!(theme.heading2_style.fg, Some(Color::Rgb(..))));
        assert!(!matches!(theme.source_style.fg, Some(Color::Rgb(..))));
    }
}
