//! Per-provider style configuration.
//!
//! The table is an ordered JSON list of provider records. It is loaded once
//! at start-up, compiled (URL templates become regexes, width stops are
//! sorted), and is read-only afterwards.
//!
//! ```json
//! [{
//!   "id": "osm-standard",
//!   "tileUrlTemplates": ["https://tile.openstreetmap.org/{z}/{x}/{y}.png"],
//!   "zoomThreshold": 5,
//!   "lineStyles": [{ "color": "rgb(200, 180, 200)", "widthFraction": 1.0 }],
//!   "lineWidthStops": { "1": 0.5, "10": 2.5 },
//!   "delWidthFactor": 1.5
//! }]
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::{CorrectorError, CorrectorResult, Rgba, TileCoord, UrlTemplate};

/// A zoom -> width interpolation stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthStop {
    pub zoom: f64,
    pub width: f64,
}

/// A line style active over an inclusive zoom range.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineStyle {
    #[serde(default = "default_line_color")]
    pub color: Rgba,

    /// Fraction of the interpolated base width
    #[serde(default = "default_width_fraction")]
    pub width_fraction: f64,

    /// Defaults to the owning config's start zoom
    #[serde(default)]
    pub start_zoom: Option<u8>,

    /// Unbounded when absent
    #[serde(default)]
    pub end_zoom: Option<u8>,
}

fn default_line_color() -> Rgba {
    Rgba::FALLBACK
}

fn default_width_fraction() -> f64 {
    1.0
}

/// Raw JSON shape of a provider record, before compilation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLayerConfig {
    id: String,
    #[serde(default)]
    name: Option<String>,
    tile_url_templates: Vec<String>,
    #[serde(default)]
    start_zoom: u8,
    #[serde(default = "default_zoom_threshold")]
    zoom_threshold: u8,
    #[serde(default)]
    line_styles: Vec<LineStyle>,
    #[serde(default = "default_line_width_stops")]
    line_width_stops: BTreeMap<String, f64>,
    #[serde(default = "default_del_width_factor")]
    del_width_factor: f64,
    #[serde(default = "default_del_color")]
    del_color: Rgba,
}

fn default_zoom_threshold() -> u8 {
    5
}

fn default_line_width_stops() -> BTreeMap<String, f64> {
    BTreeMap::from([("1".to_string(), 0.5), ("10".to_string(), 2.5)])
}

fn default_del_width_factor() -> f64 {
    1.5
}

fn default_del_color() -> Rgba {
    Rgba::opaque(128, 128, 128)
}

/// A compiled provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawLayerConfig")]
pub struct LayerConfig {
    pub id: String,
    pub name: String,
    templates: Vec<UrlTemplate>,
    pub start_zoom: u8,
    /// Zooms below this use the coarse correction layers
    pub zoom_threshold: u8,
    pub line_styles: Vec<LineStyle>,
    line_width_stops: Vec<WidthStop>,
    pub del_width_factor: f64,
    pub del_color: Rgba,
}

impl TryFrom<RawLayerConfig> for LayerConfig {
    type Error = CorrectorError;

    fn try_from(raw: RawLayerConfig) -> Result<Self, Self::Error> {
        if raw.tile_url_templates.is_empty() {
            return Err(CorrectorError::Config(format!(
                "config '{}' has no tileUrlTemplates",
                raw.id
            )));
        }

        let templates = raw
            .tile_url_templates
            .iter()
            .map(|t| UrlTemplate::compile(t))
            .collect::<CorrectorResult<Vec<_>>>()?;

        let mut line_width_stops = raw
            .line_width_stops
            .iter()
            .map(|(zoom, width)| {
                zoom.trim()
                    .parse::<u8>()
                    .map(|z| WidthStop {
                        zoom: f64::from(z),
                        width: *width,
                    })
                    .map_err(|_| {
                        CorrectorError::Config(format!(
                            "config '{}' has non-integer width stop '{}'",
                            raw.id, zoom
                        ))
                    })
            })
            .collect::<CorrectorResult<Vec<_>>>()?;
        // BTreeMap orders keys lexically ("10" < "2"), so sort numerically
        line_width_stops.sort_by(|a, b| a.zoom.total_cmp(&b.zoom));

        Ok(Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            templates,
            start_zoom: raw.start_zoom,
            zoom_threshold: raw.zoom_threshold,
            line_styles: raw.line_styles,
            line_width_stops,
            del_width_factor: raw.del_width_factor,
            del_color: raw.del_color,
        })
    }
}

impl LayerConfig {
    pub fn templates(&self) -> &[UrlTemplate] {
        &self.templates
    }

    /// Width stops sorted by ascending zoom.
    pub fn line_width_stops(&self) -> &[WidthStop] {
        &self.line_width_stops
    }

    /// Whether any of this config's templates matches the URL.
    pub fn matches(&self, url: &str) -> bool {
        self.templates.iter().any(|t| t.is_match(url))
    }

    /// Extract tile coordinates using the first template that yields them.
    pub fn extract_coords(&self, url: &str) -> Option<TileCoord> {
        self.templates.iter().find_map(|t| t.extract(url))
    }

    /// Line styles whose zoom range contains `z`, in declared order.
    pub fn line_styles_for_zoom(&self, z: u8) -> impl Iterator<Item = &LineStyle> {
        self.line_styles.iter().filter(move |style| {
            let start = style.start_zoom.unwrap_or(self.start_zoom);
            let end = style.end_zoom.unwrap_or(u8::MAX);
            start <= z && z <= end
        })
    }

    /// Interpolated base line width at a (possibly fractional) zoom.
    pub fn line_width(&self, zoom: f64) -> f64 {
        interpolate_width(&self.line_width_stops, zoom)
    }

    /// Whether tiles at `z` should read the fine (`-osm`) layers.
    pub fn uses_fine_layers(&self, z: u8) -> bool {
        z >= self.zoom_threshold
    }
}

/// Piecewise-linear interpolation over sorted stops, clamped at both ends.
///
/// An empty stop list yields 1.0.
pub fn interpolate_width(stops: &[WidthStop], zoom: f64) -> f64 {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 1.0,
    };

    if zoom <= first.zoom {
        return first.width;
    }
    if zoom >= last.zoom {
        return last.width;
    }

    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if lo.zoom <= zoom && zoom <= hi.zoom {
            let t = (zoom - lo.zoom) / (hi.zoom - lo.zoom);
            return lo.width + t * (hi.width - lo.width);
        }
    }

    last.width
}

/// Ordered, immutable table of provider configurations.
#[derive(Debug, Clone, Default)]
pub struct LayerConfigTable {
    configs: Vec<LayerConfig>,
}

impl LayerConfigTable {
    pub fn new(configs: Vec<LayerConfig>) -> Self {
        Self { configs }
    }

    /// Parse a JSON array of provider records.
    pub fn from_json(json: &str) -> CorrectorResult<Self> {
        let configs: Vec<LayerConfig> = serde_json::from_str(json)?;
        Ok(Self { configs })
    }

    /// Load the table from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> CorrectorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorrectorError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn configs(&self) -> &[LayerConfig] {
        &self.configs
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// First config (in table order) with a template matching the URL.
    pub fn match_url(&self, url: &str) -> Option<&LayerConfig> {
        self.configs.iter().find(|c| c.matches(url))
    }
}
