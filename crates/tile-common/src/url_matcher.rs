//! Tile URL template compilation and matching.
//!
//! Supported placeholders:
//! - `{z}`, `{x}`, `{y}` - integer tile coordinates (captured)
//! - `{s}` - a single lowercase subdomain letter
//! - `{a-c}` / `{1-4}` - inclusive letter or digit subdomain ranges
//! - `{r}` - optional retina suffix (`@2x`, `@3x`, `@1.5x`)
//!
//! Matching is case-insensitive, accepts either `http` or `https`, and
//! tolerates a trailing query string.

use regex::Regex;

use crate::{CorrectorError, CorrectorResult, TileCoord};

/// A URL template compiled into an anchored regular expression.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
    regex: Regex,
}

impl UrlTemplate {
    /// Compile a template such as `https://{s}.tile.example/{z}/{x}/{y}{r}.png`.
    pub fn compile(template: &str) -> CorrectorResult<Self> {
        let pattern = template_to_pattern(template)?;
        let regex = Regex::new(&pattern).map_err(|e| {
            CorrectorError::Config(format!("template '{}' does not compile: {}", template, e))
        })?;

        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Extract the tile coordinate from a URL matching this template.
    ///
    /// Returns `None` when the URL does not match, when the template has no
    /// `{z}/{x}/{y}` captures, or when the captured address is off the grid.
    pub fn extract(&self, url: &str) -> Option<TileCoord> {
        let caps = self.regex.captures(url)?;
        let z = caps.name("z")?.as_str().parse::<u8>().ok()?;
        let x = caps.name("x")?.as_str().parse::<u32>().ok()?;
        let y = caps.name("y")?.as_str().parse::<u32>().ok()?;
        TileCoord::checked(z, x, y)
    }
}

fn template_to_pattern(template: &str) -> CorrectorResult<String> {
    let mut pattern = String::from("(?i)^");
    let mut rest = template;

    // Either scheme is accepted regardless of which one the template names
    for scheme in ["https://", "http://"] {
        if rest.len() >= scheme.len() && rest[..scheme.len()].eq_ignore_ascii_case(scheme) {
            pattern.push_str("https?://");
            rest = &rest[scheme.len()..];
            break;
        }
    }

    while let Some(open) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..open]));
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            CorrectorError::Config(format!("unclosed placeholder in template '{}'", template))
        })?;
        pattern.push_str(&placeholder_pattern(&after[..close], template)?);
        rest = &after[close + 1..];
    }
    pattern.push_str(&regex::escape(rest));

    pattern.push_str(r"(?:\?.*)?$");
    Ok(pattern)
}

fn placeholder_pattern(name: &str, template: &str) -> CorrectorResult<String> {
    match name {
        "z" => return Ok(r"(?P<z>\d+)".to_string()),
        "x" => return Ok(r"(?P<x>\d+)".to_string()),
        "y" => return Ok(r"(?P<y>\d+)".to_string()),
        "s" => return Ok("[a-z]".to_string()),
        "r" => return Ok(r"(?:@\d+(?:\.\d+)?x)?".to_string()),
        _ => {}
    }

    // {a-c} or {1-4}
    let bytes = name.as_bytes();
    if bytes.len() == 3 && bytes[1] == b'-' {
        let (lo, hi) = (bytes[0], bytes[2]);
        let same_class = (lo.is_ascii_lowercase() && hi.is_ascii_lowercase())
            || (lo.is_ascii_digit() && hi.is_ascii_digit());
        if same_class && lo <= hi {
            return Ok(format!("[{}-{}]", lo as char, hi as char));
        }
    }

    Err(CorrectorError::Config(format!(
        "unknown placeholder '{{{}}}' in template '{}'",
        name, template
    )))
}
