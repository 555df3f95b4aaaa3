//! Pen settings and the derivation of stroke styles from them.

use std::{fmt, str::FromStr};

use anyhow::bail;
use serde::Deserialize;

use crate::surface::{LineJoin, StrokeStyle};

/// Alpha suffix appended to the pen colour and the alpha byte it encodes, indexed by opacity
/// level 1-10.
pub const OPACITY_TABLE: [(&str, u8); 10] = [
    ("1a", 0x1a),
    ("33", 0x33),
    ("4d", 0x4d),
    ("66", 0x66),
    ("80", 0x80),
    ("99", 0x99),
    ("b3", 0xb3),
    ("cc", 0xcc),
    ("e6", 0xe6),
    ("ff", 0xff),
];

/// A slider value in the range 1-10 (pen width and opacity level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(1);
    pub const MAX: Level = Level(10);

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Moves the level by `delta`, stopping at the ends of the range.
    pub fn step(self, delta: i32) -> Self {
        let v = (i32::from(self.0) + delta).clamp(i32::from(Self::MIN.0), i32::from(Self::MAX.0));
        Self(v as u8)
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value).ok_or_else(|| format!("level {value} is outside of 1..=10"))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn opacity_entry(level: Level) -> (&'static str, u8) {
    OPACITY_TABLE[usize::from(level.0 - 1)]
}

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` into straight-alpha RGBA.
pub fn parse_hex(s: &str) -> anyhow::Result<[u8; 4]> {
    let Some(digits) = s.strip_prefix('#') else {
        bail!("colour '{s}' must start with '#'");
    };
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("colour '{s}' contains non-hex characters");
    }
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16);
    Ok(match digits.len() {
        3 => {
            let mut out = [0xff; 4];
            for (i, c) in digits.chars().enumerate() {
                // (already checked to be a hex digit)
                out[i] = c.to_digit(16).unwrap_or(0) as u8 * 17;
            }
            out
        }
        6 => [byte(0)?, byte(2)?, byte(4)?, 0xff],
        8 => [byte(0)?, byte(2)?, byte(4)?, byte(6)?],
        n => bail!("colour '{s}' has {n} hex digits (expected 3, 6 or 8)"),
    })
}

/// An opaque pen colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgb(pub [u8; 3]);

impl FromStr for Rgb {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [r, g, b, a] = parse_hex(s)?;
        if a != 0xff {
            bail!("pen colour '{s}' must not carry an alpha component");
        }
        Ok(Rgb([r, g, b]))
    }
}

impl TryFrom<String> for Rgb {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSettings {
    pub color: Rgb,
    pub width: Level,
    pub opacity: Level,
    pub erase: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            color: Rgb([0xf8, 0x00, 0x00]),
            width: Level::MAX,
            opacity: Level::MAX,
            erase: false,
        }
    }
}

impl ToolSettings {
    pub fn with_color(self, color: Rgb) -> Self {
        Self { color, ..self }
    }

    pub fn with_width(self, width: Level) -> Self {
        Self { width, ..self }
    }

    pub fn with_opacity(self, opacity: Level) -> Self {
        Self { opacity, ..self }
    }

    pub fn with_erase(self, erase: bool) -> Self {
        Self { erase, ..self }
    }

    /// The style a pen stroke is drawn with: colour plus opacity suffix, round joins, and the
    /// configured width in pixels.
    pub fn stroke_style(&self) -> StrokeStyle {
        let (suffix, alpha) = opacity_entry(self.opacity);
        let color = format!("{}{suffix}", self.color);
        let [r, g, b] = self.color.0;
        StrokeStyle {
            color,
            rgba: [r, g, b, alpha],
            join: LineJoin::Round,
            width: f32::from(self.width.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ToolSettings::default();
        assert_eq!(s.color.to_string(), "#f80000");
        assert_eq!(s.width.get(), 10);
        assert_eq!(s.opacity.get(), 10);
        assert!(!s.erase);
    }

    #[test]
    fn level_range() {
        assert_eq!(Level::new(0), None);
        assert_eq!(Level::new(11), None);
        assert_eq!(Level::new(1), Some(Level::MIN));
        assert_eq!(Level::MAX.step(1), Level::MAX);
        assert_eq!(Level::MIN.step(-3), Level::MIN);
        assert_eq!(Level::MIN.step(4).get(), 5);
    }

    #[test]
    fn parses_colors() {
        assert_eq!(parse_hex("#fff").unwrap(), [0xff; 4]);
        assert_eq!(parse_hex("#00ff00").unwrap(), [0, 0xff, 0, 0xff]);
        assert_eq!(parse_hex("#00ff0080").unwrap(), [0, 0xff, 0, 0x80]);
        assert!(parse_hex("00ff00").is_err());
        assert!(parse_hex("#00ff0").is_err());
        assert!(parse_hex("#gg0000").is_err());
        assert!("#00ff0080".parse::<Rgb>().is_err());
        assert_eq!("#F80000".parse::<Rgb>().unwrap().to_string(), "#f80000");
    }

    #[test]
    fn opacity_table_alpha_matches_suffix() {
        for (suffix, alpha) in OPACITY_TABLE {
            assert_eq!(format!("{alpha:02x}"), suffix);
        }
        assert!(OPACITY_TABLE.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn stroke_style_appends_opacity_suffix() {
        let settings = ToolSettings::default()
            .with_color("#00ff00".parse().unwrap())
            .with_opacity(Level::MIN)
            .with_width(Level::new(3).unwrap());
        let style = settings.stroke_style();
        assert_eq!(style.color, format!("#00ff00{}", OPACITY_TABLE[0].0));
        assert_eq!(style.rgba, [0, 0xff, 0, 0x1a]);
        assert_eq!(style.width, 3.0);
        assert_eq!(style.join, LineJoin::Round);

        let mid = settings.with_opacity(Level::new(5).unwrap()).stroke_style();
        assert_eq!(mid.color, "#00ff0080");
        assert_eq!(mid.rgba[3], 0x80);

        let opaque = ToolSettings::default().stroke_style();
        assert_eq!(opaque.color, "#f80000ff");
        assert_eq!(opaque.rgba[3], 0xff);
    }
}
