//! CSS-style color strings used by line styles.

use serde::{Deserialize, Serialize};

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Color used when a style string cannot be understood.
    pub const FALLBACK: Rgba = Rgba::opaque(0, 128, 0);

    /// Parse a CSS color string, falling back to green on anything unknown.
    pub fn parse(value: &str) -> Self {
        Self::try_parse(value).unwrap_or(Self::FALLBACK)
    }

    /// Parse `rgb()`, `rgba()`, hex (`#rgb`, `#rrggbb`, `#rrggbbaa`) or a basic named color.
    pub fn try_parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let lower = value.to_ascii_lowercase();

        if let Some(body) = lower.strip_prefix("rgba").or_else(|| lower.strip_prefix("rgb")) {
            return parse_functional(body);
        }

        if let Some(hex) = lower.strip_prefix('#') {
            return parse_hex(hex);
        }

        match lower.as_str() {
            "red" => Some(Self::opaque(255, 0, 0)),
            "green" => Some(Self::opaque(0, 128, 0)),
            "blue" => Some(Self::opaque(0, 0, 255)),
            "black" => Some(Self::opaque(0, 0, 0)),
            "white" => Some(Self::opaque(255, 255, 255)),
            "gray" | "grey" => Some(Self::opaque(128, 128, 128)),
            _ => None,
        }
    }
}

fn parse_functional(body: &str) -> Option<Rgba> {
    let inner = body.trim().strip_prefix('(')?.strip_suffix(')')?;
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();

    let channel = |s: &str| s.parse::<u8>().ok();
    match parts.as_slice() {
        [r, g, b] => Some(Rgba::opaque(channel(r)?, channel(g)?, channel(b)?)),
        [r, g, b, a] => {
            // CSS alpha is a 0..1 fraction
            let alpha = a.parse::<f32>().ok()?.clamp(0.0, 1.0);
            Some(Rgba::new(
                channel(r)?,
                channel(g)?,
                channel(b)?,
                (alpha * 255.0).round() as u8,
            ))
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            parse_hex(&expanded)
        }
        6 => Some(Rgba::opaque(byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?)),
        8 => Some(Rgba::new(
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        )),
        _ => None,
    }
}

impl From<String> for Rgba {
    fn from(value: String) -> Self {
        Rgba::parse(&value)
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        if color.a == 255 {
            format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", color.r, color.g, color.b, color.a)
        }
    }
}
