//! Line identity and display style.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::Product;

/// Outline shape of a line badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Rect,
    Rounded,
    Circle,
}

/// Display style of a line badge.
///
/// Colours are `0xAARRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    pub shape: Shape,
    pub background_color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color2: Option<u32>,
    pub foreground_color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<u32>,
}

impl Style {
    pub const WHITE: u32 = 0xffff_ffff;
    pub const BLACK: u32 = 0xff00_0000;

    /// Creates a style with the given shape and colours.
    pub fn new(shape: Shape, background_color: u32, foreground_color: u32) -> Self {
        Self {
            shape,
            background_color,
            background_color2: None,
            foreground_color,
            border_color: None,
        }
    }

    /// Sets a border colour.
    pub fn with_border(mut self, border_color: u32) -> Self {
        self.border_color = Some(border_color);
        self
    }

    /// Parses `#RRGGBB` or `#AARRGGBB`; six-digit colours are fully opaque.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_core::domain::Style;
    ///
    /// assert_eq!(Style::parse_color("#ff0000"), Some(0xffff0000));
    /// assert_eq!(Style::parse_color("#80000000"), Some(0x80000000));
    /// assert_eq!(Style::parse_color("red"), None);
    /// ```
    pub fn parse_color(s: &str) -> Option<u32> {
        let hex = s.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(hex, 16).ok()?;
        match hex.len() {
            6 => Some(0xff00_0000 | value),
            8 => Some(value),
            _ => None,
        }
    }

    /// Picks black or white text for legibility on the given background.
    pub fn deduce_foreground(background_color: u32) -> u32 {
        let r = (background_color >> 16) & 0xff;
        let g = (background_color >> 8) & 0xff;
        let b = background_color & 0xff;
        // Perceived brightness (ITU-R BT.601)
        let brightness = (r * 299 + g * 587 + b * 114) / 1000;
        if brightness < 140 {
            Self::WHITE
        } else {
            Self::BLACK
        }
    }
}

/// Optional line features reported by some backends.
///
/// Serialized as small integers, matching the `attr` array encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LineAttr {
    CircleClockwise,
    CircleAnticlockwise,
    ServiceReplacement,
    LineAirport,
    WheelChairAccess,
    Bicycle,
}

impl From<LineAttr> for u8 {
    fn from(attr: LineAttr) -> Self {
        attr as u8
    }
}

impl TryFrom<u8> for LineAttr {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => LineAttr::CircleClockwise,
            1 => LineAttr::CircleAnticlockwise,
            2 => LineAttr::ServiceReplacement,
            3 => LineAttr::LineAirport,
            4 => LineAttr::WheelChairAccess,
            5 => LineAttr::Bicycle,
            other => return Err(format!("unknown line attribute {other}")),
        })
    }
}

/// Direction of travel along a line, where the backend distinguishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDirection {
    Outward,
    Return,
}

/// A public transport line.
///
/// Two lines are equal when network, product and label agree; the
/// remaining fields are presentation detail that backends fill in
/// inconsistently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    /// Short label as shown on a badge, e.g. "S5" or "ICE 1234"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub attr: BTreeSet<LineAttr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<LineDirection>,
}

impl Line {
    /// Creates a line with the identifying fields set.
    pub fn new(network: Option<String>, product: Option<Product>, label: Option<String>) -> Self {
        Self {
            network,
            product,
            label,
            ..Self::default()
        }
    }

    /// Sets the display style.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// Returns true if the line carries the given attribute.
    pub fn has_attr(&self, attr: LineAttr) -> bool {
        self.attr.contains(&attr)
    }

    /// The product code, or `'?'` when the product is unknown.
    pub fn product_code(&self) -> char {
        self.product.map_or('?', Product::code)
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        self.network == other.network && self.product == other.product && self.label == other.label
    }
}

impl Eq for Line {}

impl Hash for Line {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network.hash(state);
        self.product.hash(state);
        self.label.hash(state);
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.label, &self.name) {
            (Some(label), _) => f.write_str(label),
            (None, Some(name)) => f.write_str(name),
            (None, None) => write!(f, "{}", self.product_code()),
        }
    }
}
