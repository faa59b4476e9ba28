//! Colours, palettes and multi-stop interpolation.

use crate::error::{ColormapError, Result};
use std::fmt;
use std::str::FromStr;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hex form without `#`, lowercase
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// Named colours accepted in palettes
const NAMED: &[(&str, Rgb)] = &[
    ("black", Rgb::new(0, 0, 0)),
    ("white", Rgb::new(255, 255, 255)),
    ("gray", Rgb::new(128, 128, 128)),
    ("grey", Rgb::new(128, 128, 128)),
    ("silver", Rgb::new(192, 192, 192)),
    ("red", Rgb::new(255, 0, 0)),
    ("maroon", Rgb::new(128, 0, 0)),
    ("orange", Rgb::new(255, 165, 0)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("olive", Rgb::new(128, 128, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("green", Rgb::new(0, 128, 0)),
    ("darkgreen", Rgb::new(0, 100, 0)),
    ("teal", Rgb::new(0, 128, 128)),
    ("cyan", Rgb::new(0, 255, 255)),
    ("blue", Rgb::new(0, 0, 255)),
    ("navy", Rgb::new(0, 0, 128)),
    ("purple", Rgb::new(128, 0, 128)),
    ("magenta", Rgb::new(255, 0, 255)),
    ("brown", Rgb::new(165, 42, 42)),
    ("tan", Rgb::new(210, 180, 140)),
];

impl FromStr for Rgb {
    type Err = ColormapError;

    /// Parse `#rrggbb`, `rrggbb` or a colour name
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        if let Some((_, rgb)) = NAMED.iter().find(|(name, _)| *name == lower) {
            return Ok(*rgb);
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColormapError::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ColormapError::InvalidColor(s.to_string()))
        };
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Built-in palettes for the layers the pipeline produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    /// Black -> White
    Grayscale,
    /// Brown -> Yellow -> Green
    Ndvi,
    /// White -> Cyan -> Blue
    Water,
    /// Blue -> White -> Red (index differences)
    Divergent,
    /// urban, bare, water, vegetation
    LandCover,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[
        Self::Grayscale,
        Self::Ndvi,
        Self::Water,
        Self::Divergent,
        Self::LandCover,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Ndvi => "ndvi",
            Self::Water => "water",
            Self::Divergent => "divergent",
            Self::LandCover => "landcover",
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Self::Grayscale => Palette::from_stops(GRAYSCALE_STOPS.to_vec()),
            Self::Ndvi => Palette::from_stops(NDVI_STOPS.to_vec()),
            Self::Water => Palette::from_stops(WATER_STOPS.to_vec()),
            Self::Divergent => Palette::from_stops(DIVERGENT_STOPS.to_vec()),
            Self::LandCover => Palette::new(LAND_COVER.to_vec()),
        }
    }
}

impl FromStr for ColorScheme {
    type Err = ColormapError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| ColormapError::UnknownScheme(s.to_string()))
    }
}

const GRAYSCALE_STOPS: &[ColorStop] = &[ColorStop::new(0.0, 0, 0, 0), ColorStop::new(1.0, 255, 255, 255)];

const NDVI_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 120, 70, 20),
    ColorStop::new(0.3, 200, 170, 60),
    ColorStop::new(0.5, 240, 230, 100),
    ColorStop::new(0.7, 100, 180, 50),
    ColorStop::new(1.0, 10, 100, 20),
];

const WATER_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 240, 249, 255),
    ColorStop::new(0.25, 186, 228, 250),
    ColorStop::new(0.50, 80, 180, 230),
    ColorStop::new(0.75, 30, 120, 200),
    ColorStop::new(1.00, 8, 48, 107),
];

const DIVERGENT_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 33, 102, 172),
    ColorStop::new(0.25, 103, 169, 207),
    ColorStop::new(0.50, 247, 247, 247),
    ColorStop::new(0.75, 239, 138, 98),
    ColorStop::new(1.00, 178, 24, 43),
];

/// Class colours in label order 0..=3
const LAND_COVER: &[Rgb] = &[
    Rgb::new(204, 0, 0),
    Rgb::new(229, 204, 153),
    Rgb::new(0, 102, 204),
    Rgb::new(0, 102, 51),
];

/// Ordered colour stops evaluated on [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    stops: Vec<ColorStop>,
}

impl Palette {
    /// Evenly spaced stops: first colour at 0, last at 1
    pub fn new(colors: Vec<Rgb>) -> Self {
        let n = colors.len();
        let stops = colors
            .into_iter()
            .enumerate()
            .map(|(i, color)| ColorStop {
                t: if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 },
                color,
            })
            .collect();
        Self { stops }
    }

    pub fn from_stops(stops: Vec<ColorStop>) -> Self {
        Self { stops }
    }

    /// Parse every entry as a colour; fails on the first bad entry or an
    /// empty list.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self> {
        if entries.is_empty() {
            return Err(ColormapError::InvalidVisParams("palette is empty".into()));
        }
        let colors = entries
            .iter()
            .map(|e| e.as_ref().parse())
            .collect::<Result<Vec<Rgb>>>()?;
        Ok(Self::new(colors))
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Colour at normalized position `t`, clamped to [0, 1]
    pub fn evaluate(&self, t: f64) -> Rgb {
        multi_stop(&self.stops, t)
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Rgb::new(0, 0, 0);
    };
    if t <= first.t {
        return first.color;
    }
    if t >= last.t {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.t {
            let span = hi.t - lo.t;
            let ratio = if span > 0.0 { (t - lo.t) / span } else { 1.0 };
            return lerp_color(lo.color, hi.color, ratio);
        }
    }
    last.color
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_names() {
        assert_eq!("#006633".parse::<Rgb>().unwrap(), Rgb::new(0, 102, 51));
        assert_eq!("E5FFCC".parse::<Rgb>().unwrap(), Rgb::new(229, 255, 204));
        assert_eq!("Red".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 0));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("chartreuse-ish".parse::<Rgb>().is_err());
        assert!("zz0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn palette_endpoints_and_midpoint() {
        let p = Palette::parse(&["black", "white"]).unwrap();
        assert_eq!(p.evaluate(0.0), Rgb::new(0, 0, 0));
        assert_eq!(p.evaluate(0.5), Rgb::new(128, 128, 128));
        assert_eq!(p.evaluate(1.0), Rgb::new(255, 255, 255));
    }

    #[test]
    fn palette_clamps_out_of_range() {
        let p = ColorScheme::Ndvi.palette();
        assert_eq!(p.evaluate(-0.5), Rgb::new(120, 70, 20));
        assert_eq!(p.evaluate(1.5), Rgb::new(10, 100, 20));
    }

    #[test]
    fn three_colour_palette_is_evenly_spaced() {
        let p = Palette::parse(&["red", "green", "blue"]).unwrap();
        assert_eq!(p.evaluate(0.5), Rgb::new(0, 128, 0));
        assert_eq!(p.stops()[2].t, 1.0);
    }

    #[test]
    fn empty_palette_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(Palette::parse(&empty).is_err());
    }

    #[test]
    fn scheme_names_round_trip() {
        for &scheme in ColorScheme::ALL {
            assert_eq!(scheme.name().parse::<ColorScheme>().unwrap(), scheme);
        }
        assert_eq!(Rgb::new(0, 102, 204).to_string(), "#0066cc");
    }
}
