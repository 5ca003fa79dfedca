//! Core types shared by the preview surfaces

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Backend used to present the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Vector markup injected into the host element
    #[default]
    Vector,
    /// Bitmap rasterized off-thread and blitted into a pixel buffer
    Raster,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMode::Vector => "vector",
            RenderMode::Raster => "raster",
        }
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" | "svg" => Ok(RenderMode::Vector),
            "raster" | "canvas" => Ok(RenderMode::Raster),
            other => Err(format!("unsupported render mode '{other}'")),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page background color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PageColor {
    pub const WHITE: Self = Self::rgb(0xFF, 0xFF, 0xFF);
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Packed `0xRRGGBB`
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    #[must_use]
    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }
}

impl Default for PageColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for PageColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for PageColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            _ => {}
        }

        let hex = s
            .strip_prefix('#')
            .filter(|hex| hex.is_ascii())
            .ok_or_else(|| format!("invalid color '{s}'"))?;
        let channel = |digits: &str| {
            u8::from_str_radix(digits, 16).map_err(|_| format!("invalid color '{s}'"))
        };

        match hex.len() {
            6 => Ok(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 0x11);
                Ok(Self::rgb(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(format!("invalid color '{s}'")),
        }
    }
}

/// Cursor position passed through to the surface for highlight/jump
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    /// Page index (0-indexed)
    pub page: usize,
    pub x: f32,
    pub y: f32,
}

/// Horizontal band of the output bitmap rendered in one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// First row in device pixels
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Rendered RGBA bitmap
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Raw RGBA pixel data (4 bytes per pixel)
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Bitmap {
    /// Bitmap filled with a solid color
    #[must_use]
    pub fn filled(width: u32, height: u32, color: PageColor) -> Self {
        let rgba = color.to_rgba();
        let len = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(len * 4);
        for _ in 0..len {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            pixels,
            width,
            height,
        }
    }

    /// Byte length of one row
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// Mutable rows covered by `tile`
    pub fn tile_mut(&mut self, tile: &Tile) -> &mut [u8] {
        let stride = self.stride();
        let start = tile.y as usize * stride;
        let end = (start + tile.height as usize * stride).min(self.pixels.len());
        &mut self.pixels[start..end]
    }

    /// Split the bitmap into horizontal bands of at most `tile_height` rows
    #[must_use]
    pub fn tiles(&self, tile_height: u32) -> Vec<Tile> {
        let step = tile_height.max(1);
        (0..self.height)
            .step_by(step as usize)
            .map(|y| Tile {
                y,
                width: self.width,
                height: step.min(self.height - y),
            })
            .collect()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}
