use ratatui::style::{Color, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    Truecolor,
    Ansi16,
}

/// Detect terminal color depth from environment.
/// `SWEETSCOUT_COLOR` overrides; otherwise COLORTERM truecolor/24bit, else 16.
pub fn detect_color_depth() -> ColorDepth {
    if let Ok(force) = std::env::var("SWEETSCOUT_COLOR") {
        match force.trim().to_ascii_lowercase().as_str() {
            "truecolor" | "24bit" | "24-bit" => return ColorDepth::Truecolor,
            "16" | "ansi" => return ColorDepth::Ansi16,
            _ => {}
        }
    }

    match std::env::var("COLORTERM") {
        Ok(colorterm) => {
            let s = colorterm.to_ascii_lowercase();
            if s.contains("truecolor") || s.contains("24bit") {
                ColorDepth::Truecolor
            } else {
                ColorDepth::Ansi16
            }
        }
        Err(_) => ColorDepth::Ansi16,
    }
}

/// Parses `#rgb`, `#rrggbb` or a basic color name.
pub fn parse_color(raw: &str) -> Option<Color> {
    let lower = raw.trim().to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex);
    }
    match lower.as_str() {
        "black" => Some(Color::Black),
        "white" => Some(Color::White),
        "gray" | "grey" => Some(Color::Gray),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "blue" => Some(Color::Blue),
        "yellow" => Some(Color::Yellow),
        "magenta" | "pink" => Some(Color::Magenta),
        "purple" => Some(Color::LightMagenta),
        "cyan" => Some(Color::Cyan),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    fn channel(s: &str) -> Option<u8> {
        u8::from_str_radix(s, 16).ok()
    }
    match hex.len() {
        3 => Some(Color::Rgb(
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        )),
        6 => Some(Color::Rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

/// Map a Color to the nearest representable color in the chosen depth.
pub fn quantize_color(color: Color, depth: ColorDepth) -> Color {
    match (color, depth) {
        (Color::Rgb(r, g, b), ColorDepth::Ansi16) => nearest_ansi16(r, g, b),
        (other, _) => other,
    }
}

pub fn quantize_style(mut style: Style, depth: ColorDepth) -> Style {
    style.fg = style.fg.map(|c| quantize_color(c, depth));
    style.bg = style.bg.map(|c| quantize_color(c, depth));
    style
}

fn nearest_ansi16(r: u8, g: u8, b: u8) -> Color {
    const ANSI16: [(u8, u8, u8, Color); 16] = [
        (0, 0, 0, Color::Black),
        (205, 0, 0, Color::Red),
        (0, 205, 0, Color::Green),
        (205, 205, 0, Color::Yellow),
        (0, 0, 205, Color::Blue),
        (205, 0, 205, Color::Magenta),
        (0, 205, 205, Color::Cyan),
        (192, 192, 192, Color::Gray),
        (128, 128, 128, Color::DarkGray),
        (255, 0, 0, Color::LightRed),
        (0, 255, 0, Color::LightGreen),
        (255, 255, 0, Color::LightYellow),
        (92, 92, 255, Color::LightBlue),
        (255, 0, 255, Color::LightMagenta),
        (0, 255, 255, Color::LightCyan),
        (255, 255, 255, Color::White),
    ];

    let distance = |(rr, gg, bb): (u8, u8, u8)| {
        let dr = rr as i32 - r as i32;
        let dg = gg as i32 - g as i32;
        let db = bb as i32 - b as i32;
        dr * dr + dg * dg + db * db
    };
    ANSI16
        .iter()
        .min_by_key(|(rr, gg, bb, _)| distance((*rr, *gg, *bb)))
        .map(|entry| entry.3)
        .unwrap_or(Color::Reset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_palette_hex_colors() {
        assert_eq!(parse_color("#ec4899"), Some(Color::Rgb(0xec, 0x48, 0x99)));
        assert_eq!(parse_color(" #FFF "), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_color("Red"), Some(Color::Red));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#gggggg"), None);
        assert_eq!(parse_color("chartreuse"), None);
    }

    #[test]
    fn quantize_rgb_to_ansi16() {
        let c = quantize_color(Color::Rgb(250, 10, 10), ColorDepth::Ansi16);
        assert!(matches!(c, Color::Red | Color::LightRed));
        assert_eq!(
            quantize_color(Color::Rgb(1, 2, 3), ColorDepth::Truecolor),
            Color::Rgb(1, 2, 3)
        );
        assert_eq!(quantize_color(Color::Cyan, ColorDepth::Ansi16), Color::Cyan);
    }
}
