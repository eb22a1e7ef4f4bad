use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const FONT_SIZES: &[f32] = &[
    8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 24.0, 28.0, 32.0, 36.0, 48.0, 72.0,
];

pub const FONT_FAMILIES: &[&str] = &[
    "Arial",
    "Times New Roman",
    "Courier New",
    "Georgia",
    "Verdana",
];

// ── Color ───────────────────────────────────────────────────────────────────

/// Straight (non-premultiplied) RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}', expected #rrggbb or #rrggbbaa")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !hex.is_ascii() {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(err()),
        }
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColorVisitor;

        impl<'de> Visitor<'de> for ColorVisitor {
            type Value = Color;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a color string like #ff0000 or #ff000080, or \"transparent\"")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if value.eq_ignore_ascii_case("transparent") {
                    return Ok(Color::TRANSPARENT);
                }
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(ColorVisitor)
    }
}

// ── Shape / text / highlight styles ─────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeStyle {
    pub stroke: Color,
    pub stroke_width: f32,
    /// `None` is the "transparent" fill.
    pub fill: Option<Color>,
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke: Color::BLACK,
            stroke_width: 2.0,
            fill: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f32,
    pub align: TextAlign,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: FONT_FAMILIES[0].to_string(),
            font_size: 20.0,
            align: TextAlign::Left,
            bold: false,
            italic: false,
            underline: false,
            color: Color::BLACK,
        }
    }
}

/// A partial text style: only the `Some` fields are applied. Used both for
/// per-range runs and for the style of characters about to be typed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextStylePatch {
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub color: Option<Color>,
}

impl TextStylePatch {
    pub fn is_empty(&self) -> bool {
        self.font_family.is_none()
            && self.font_size.is_none()
            && self.bold.is_none()
            && self.italic.is_none()
            && self.underline.is_none()
            && self.color.is_none()
    }

    /// Later values win.
    pub fn merge(&mut self, other: &TextStylePatch) {
        if let Some(family) = &other.font_family {
            self.font_family = Some(family.clone());
        }
        self.font_size = other.font_size.or(self.font_size);
        self.bold = other.bold.or(self.bold);
        self.italic = other.italic.or(self.italic);
        self.underline = other.underline.or(self.underline);
        self.color = other.color.or(self.color);
    }

    pub fn apply_to(&self, style: &mut TextStyle) {
        if let Some(family) = &self.font_family {
            style.font_family = family.clone();
        }
        if let Some(size) = self.font_size {
            style.font_size = size;
        }
        if let Some(bold) = self.bold {
            style.bold = bold;
        }
        if let Some(italic) = self.italic {
            style.italic = italic;
        }
        if let Some(underline) = self.underline {
            style.underline = underline;
        }
        if let Some(color) = self.color {
            style.color = color;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightStyle {
    pub color: Color,
    /// Percent, 0..=100.
    pub opacity: u8,
}

impl HighlightStyle {
    pub fn fill(&self) -> Color {
        let alpha = u16::from(self.opacity.min(100)) * 255 / 100;
        self.color.with_alpha(alpha as u8)
    }
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: Color::YELLOW,
            opacity: 40,
        }
    }
}

// ── Style state ─────────────────────────────────────────────────────────────

/// The values shown by the style controls. Mirrors the selected object
/// while one is selected, otherwise holds the defaults for new objects.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleState {
    pub shape: ShapeStyle,
    pub text: TextStyle,
    pub highlight: HighlightStyle,
    pub cover: Color,
}

impl Default for StyleState {
    fn default() -> Self {
        Self {
            shape: ShapeStyle::default(),
            text: TextStyle::default(),
            highlight: HighlightStyle::default(),
            cover: Color::BLACK,
        }
    }
}
