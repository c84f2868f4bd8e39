//! Canonical color keys for sublayers.
//!
//! Every color that enters the engine (picker value, persisted key, CLI
//! argument) goes through [`ColorKey::parse`] once. After that colors are
//! compared as 3-byte values, never as strings.
//!
//! Accepted inputs:
//! - `#RRGGBB`, `RRGGBB`, `0xRRGGBB` (any case)
//! - `#RGB` shorthand
//! - `rgb(r, g, b)` and `rgba(r, g, b, a)` (alpha ignored)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGB color identifying one sublayer inside a structural layer.
///
/// Displays and serializes as 6 uppercase hex digits (`FF0000`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ColorKey([u8; 3]);

impl ColorKey {
    pub const BLACK: ColorKey = ColorKey([0, 0, 0]);
    pub const WHITE: ColorKey = ColorKey([255, 255, 255]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Normalize any accepted color representation. Returns None if the
    /// input doesn't identify a color.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if s.is_empty() {
            return None;
        }

        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            return Self::parse_rgb_fn(args.strip_suffix(')')?);
        }

        let hex = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        match hex.len() {
            6 => {
                let v = u32::from_str_radix(hex, 16).ok()?;
                Some(Self([(v >> 16) as u8, (v >> 8) as u8, v as u8]))
            }
            3 => {
                let mut out = [0u8; 3];
                for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                    let d = ch.to_digit(16)? as u8;
                    *slot = d * 17;
                }
                Some(Self(out))
            }
            _ => None,
        }
    }

    fn parse_rgb_fn(args: &str) -> Option<Self> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let mut out = [0u8; 3];
        for (slot, part) in out.iter_mut().zip(&parts[..3]) {
            let v: f32 = part.parse().ok()?;
            if !(0.0..=255.0).contains(&v) {
                return None;
            }
            *slot = v.round() as u8;
        }
        Some(Self(out))
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.0
    }

    /// Opaque RGBA pixel in this color.
    pub fn to_rgba(&self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 255]
    }
}

impl From<[u8; 3]> for ColorKey {
    fn from(rgb: [u8; 3]) -> Self {
        Self(rgb)
    }
}

impl fmt::Display for ColorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl From<ColorKey> for String {
    fn from(key: ColorKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for ColorKey {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ColorKey::parse(&s).ok_or_else(|| format!("Invalid color key: {}", s))
    }
}

impl FromStr for ColorKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorKey::parse(s).ok_or_else(|| format!("Invalid color: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants_normalize_to_same_key() {
        let expected = ColorKey::new(255, 0, 0);
        for input in ["#FF0000", "ff0000", "#f00", "0xff0000", "rgb(255, 0, 0)", "rgba(255,0,0,0.5)", "  #Ff0000 "] {
            assert_eq!(ColorKey::parse(input), Some(expected), "input {input:?}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "#12345", "zzzzzz", "rgb(1,2)", "rgb(300,0,0)", "#ff00001"] {
            assert_eq!(ColorKey::parse(input), None, "input {input:?}");
        }
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(ColorKey::parse("#a1b2c3").unwrap().to_string(), "A1B2C3");
        assert_eq!(ColorKey::BLACK.to_string(), "000000");
    }

    #[test]
    fn test_serde_as_string() {
        let key = ColorKey::new(0x12, 0xab, 0xef);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"12ABEF\"");
        let back: ColorKey = serde_json::from_str("\"#12abef\"").unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<ColorKey>("\"nope\"").is_err());
    }
}
