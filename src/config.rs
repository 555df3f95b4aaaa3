use std::{collections::HashMap, fmt, fs, path::Path, str::FromStr};

use anyhow::bail;
use serde::{de::Visitor, Deserialize};
use winit::keyboard::NamedKey;

use crate::settings::{Level, Rgb, ToolSettings};

#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Colours offered by the settings panel.
    pub palette: Vec<Rgb>,
    pub window: WindowConfig,
    pub pen: PenConfig,
    /// Replaces the default key bindings entirely when present.
    pub bind: Option<HashMap<Key, CommandVerb>>,
}

impl Default for Config {
    fn default() -> Self {
        let palette = [
            "#f80000", "#ff8c00", "#ffd400", "#00b050", "#00a0ff", "#0040c0", "#8000c0", "#000000",
        ];
        Self {
            palette: palette
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect(),
            window: WindowConfig::default(),
            pen: PenConfig::default(),
            bind: None,
        }
    }
}

/// The bindings used without a `[bind]` table. Digit keys select palette colours, but only
/// as many as the palette has.
fn default_bindings(palette_len: usize) -> HashMap<Key, CommandVerb> {
    let mut bind = vec![
        ("z", CommandVerb::Undo),
        ("y", CommandVerb::Redo),
        ("s", CommandVerb::Settings),
        ("l", CommandVerb::StraightLine),
        ("e", CommandVerb::Eraser),
        ("c", CommandVerb::Clear),
        ("w", CommandVerb::Save),
        ("Tab", CommandVerb::Switch),
        ("]", CommandVerb::WidthUp),
        ("[", CommandVerb::WidthDown),
        ("=", CommandVerb::OpacityUp),
        ("+", CommandVerb::OpacityUp),
        ("-", CommandVerb::OpacityDown),
        (".", CommandVerb::NextColor),
        (",", CommandVerb::PrevColor),
    ];
    let digits = ["1", "2", "3", "4", "5", "6", "7", "8"];
    bind.extend(
        digits
            .iter()
            .zip(1..)
            .take(palette_len)
            .map(|(&k, n)| (k, CommandVerb::Color(n))),
    );

    bind.into_iter()
        .filter_map(|(k, verb)| Some((Key(parse_key(k)?), verb)))
        .collect()
}

impl Config {
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// The `[bind]` table, or the default bindings for this palette if there is none.
    pub fn bindings(&self) -> HashMap<Key, CommandVerb> {
        match &self.bind {
            Some(bind) => bind.clone(),
            None => default_bindings(self.palette.len()),
        }
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(contents: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(contents)?;

        // Validate configuration.
        // - The palette must not be empty.
        // - Palette bindings in `[bind]` must refer to an existing palette entry.

        if config.palette.is_empty() {
            bail!("`palette` must contain at least one colour");
        }
        for (key, verb) in config.bind.iter().flatten() {
            if let CommandVerb::Color(n) = verb {
                if usize::from(*n) > config.palette.len() {
                    bail!(
                        "key {key} selects palette colour {n}, but the palette only has {} colours",
                        config.palette.len()
                    );
                }
            }
        }

        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub fullscreen: bool,
    /// Draw over the desktop instead of over `background`.
    pub transparent: bool,
    pub background: Rgb,
    /// Whether the drawing surface is shown at startup. `SWITCH` toggles it.
    pub surface_visible: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Scribble".into(),
            fullscreen: false,
            transparent: false,
            background: Rgb([0xff; 3]),
            surface_visible: false,
        }
    }
}

/// Pen settings in effect at startup.
#[derive(Deserialize)]
#[serde(default)]
pub struct PenConfig {
    pub color: Rgb,
    pub width: Level,
    pub opacity: Level,
    pub eraser: bool,
}

impl Default for PenConfig {
    fn default() -> Self {
        let settings = ToolSettings::default();
        Self {
            color: settings.color,
            width: settings.width,
            opacity: settings.opacity,
            eraser: settings.erase,
        }
    }
}

impl PenConfig {
    pub fn settings(&self) -> ToolSettings {
        ToolSettings {
            color: self.color,
            width: self.width,
            opacity: self.opacity,
            erase: self.eraser,
        }
    }
}

/// Parses a key name: a single character (case-insensitive) or one of a few named keys.
fn parse_key(name: &str) -> Option<winit::keyboard::Key> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(winit::keyboard::Key::Character(
            c.to_lowercase().collect::<String>().into(),
        ));
    }
    let named = match name {
        "Escape" => NamedKey::Escape,
        "Space" => NamedKey::Space,
        "Tab" => NamedKey::Tab,
        "Enter" => NamedKey::Enter,
        "Backspace" => NamedKey::Backspace,
        "Delete" => NamedKey::Delete,
        "Home" => NamedKey::Home,
        "End" => NamedKey::End,
        "PageUp" => NamedKey::PageUp,
        "PageDown" => NamedKey::PageDown,
        "ArrowUp" => NamedKey::ArrowUp,
        "ArrowDown" => NamedKey::ArrowDown,
        "ArrowLeft" => NamedKey::ArrowLeft,
        "ArrowRight" => NamedKey::ArrowRight,
        "F1" => NamedKey::F1,
        "F2" => NamedKey::F2,
        "F3" => NamedKey::F3,
        "F4" => NamedKey::F4,
        "F5" => NamedKey::F5,
        "F6" => NamedKey::F6,
        "F7" => NamedKey::F7,
        "F8" => NamedKey::F8,
        "F9" => NamedKey::F9,
        "F10" => NamedKey::F10,
        "F11" => NamedKey::F11,
        "F12" => NamedKey::F12,
        _ => return None,
    };
    Some(winit::keyboard::Key::Named(named))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(pub(crate) winit::keyboard::Key);

impl Key {
    /// Normalizes a logical key from a keyboard event for lookup in the bindings.
    pub fn from_logical(key: &winit::keyboard::Key) -> Self {
        match key {
            winit::keyboard::Key::Character(c) => Key(winit::keyboard::Key::Character(
                c.to_lowercase().into(),
            )),
            other => Key(other.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            winit::keyboard::Key::Character(c) => write!(f, "'{c}'"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl<'a> Deserialize<'a> for Key {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'a>,
    {
        struct FromStrVisitor;

        impl<'de> Visitor<'de> for FromStrVisitor {
            type Value = Key;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a single character or a key name")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Key(parse_key(v).ok_or_else(|| {
                    E::custom(format_args!("invalid key name '{v}'"))
                })?))
            }
        }

        deserializer.deserialize_str(FromStrVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum CommandVerb {
    Undo,
    Redo,
    Settings,
    StraightLine,
    Eraser,
    Clear,
    Save,
    Switch,
    WidthUp,
    WidthDown,
    OpacityUp,
    OpacityDown,
    NextColor,
    PrevColor,
    /// Selects the n-th palette colour (1-based).
    Color(u8),
}

impl FromStr for CommandVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "UNDO" => Self::Undo,
            "REDO" => Self::Redo,
            "SETTINGS" => Self::Settings,
            "STRAIGHT_LINE" => Self::StraightLine,
            "ERASER" => Self::Eraser,
            "CLEAR" => Self::Clear,
            "SAVE" => Self::Save,
            "SWITCH" => Self::Switch,
            "WIDTH_UP" => Self::WidthUp,
            "WIDTH_DOWN" => Self::WidthDown,
            "OPACITY_UP" => Self::OpacityUp,
            "OPACITY_DOWN" => Self::OpacityDown,
            "NEXT_COLOR" => Self::NextColor,
            "PREV_COLOR" => Self::PrevColor,
            _ => match s.strip_prefix("COLOR_").and_then(|n| n.parse().ok()) {
                Some(n) if n > 0 => Self::Color(n),
                _ => return Err(format!("unknown command '{s}'")),
            },
        })
    }
}

impl TryFrom<String> for CommandVerb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
