//! Path pattern matching module
//!
//! Patterns are `/`-separated segments; a segment is either literal text or a
//! `{name}` placeholder that captures the whole segment.

use percent_encoding::percent_decode_str;
use std::fmt;

use crate::error::ConfigError;
use crate::http::PathParams;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Compiled route pattern, e.g. `/api/notes/{id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let Some(rest) = pattern.strip_prefix('/') else {
            return Err(ConfigError::invalid_pattern(pattern, "must start with '/'"));
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                segments.push(parse_segment(pattern, part)?);
            }
        }

        let names: Vec<&str> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ConfigError::invalid_pattern(
                    pattern,
                    format!("parameter {{{name}}} appears twice"),
                ));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Match a request path, returning the captured parameters
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(text) => {
                    if text != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = percent_decode_str(part).decode_utf8_lossy().into_owned();
                    params.insert(name.clone(), value);
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(pattern: &str, part: &str) -> Result<Segment, ConfigError> {
    if let Some(inner) = part.strip_prefix('{') {
        let Some(name) = inner.strip_suffix('}') else {
            return Err(ConfigError::invalid_pattern(
                pattern,
                format!("unclosed placeholder {part:?}"),
            ));
        };
        if !is_identifier(name) {
            return Err(ConfigError::invalid_pattern(
                pattern,
                format!("invalid parameter name {name:?}"),
            ));
        }
        return Ok(Segment::Param(name.to_string()));
    }

    if part.contains('{') || part.contains('}') {
        return Err(ConfigError::invalid_pattern(
            pattern,
            format!("placeholder must span a whole segment, got {part:?}"),
        ));
    }
    Ok(Segment::Literal(part.to_string()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
