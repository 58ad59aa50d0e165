//! Shared render configuration and document metadata.
//!
//! [`RenderOptions`] is created once per batch and handed to every renderer
//! unchanged. [`DocumentMeta`] is derived per document by the job runner.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Deepest heading level Markdown can express.
pub const MAX_HEADING_DEPTH: u8 = 6;

/// Paper sizes understood by the renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    /// Portrait width and height in inches.
    pub fn dimensions_in(self) -> (f64, f64) {
        match self {
            PageSize::A3 => (11.69, 16.54),
            PageSize::A4 => (8.27, 11.69),
            PageSize::A5 => (5.83, 8.27),
            PageSize::Letter => (8.5, 11.0),
            PageSize::Legal => (8.5, 14.0),
        }
    }

    /// The keyword used by the CSS `@page { size: ... }` rule.
    pub fn css_name(self) -> &'static str {
        match self {
            PageSize::A3 => "A3",
            PageSize::A4 => "A4",
            PageSize::A5 => "A5",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css_name())
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(format!(
                "unknown page size '{}' (expected a3, a4, a5, letter or legal)",
                other
            )),
        }
    }
}

/// Page margins in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub fn uniform(inches: f64) -> Self {
        Self {
            top: inches,
            right: inches,
            bottom: inches,
            left: inches,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

/// Heading depths included in a table of contents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid table of contents depth range {min}-{max}: {reason}")]
pub struct InvalidTocRange {
    pub min: u8,
    pub max: u8,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TocRange {
    pub min_depth: u8,
    pub max_depth: u8,
}

impl Default for TocRange {
    fn default() -> Self {
        Self {
            min_depth: 1,
            max_depth: 3,
        }
    }
}

impl TocRange {
    pub fn new(min_depth: u8, max_depth: u8) -> Self {
        Self {
            min_depth,
            max_depth,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidTocRange> {
        let error = |reason| InvalidTocRange {
            min: self.min_depth,
            max: self.max_depth,
            reason,
        };
        if self.min_depth == 0 {
            return Err(error("depths start at 1"));
        }
        if self.max_depth > MAX_HEADING_DEPTH {
            return Err(error("depths end at 6"));
        }
        if self.min_depth > self.max_depth {
            return Err(error("minimum depth exceeds maximum depth"));
        }
        Ok(())
    }

    pub fn contains(&self, level: u8) -> bool {
        (self.min_depth..=self.max_depth).contains(&level)
    }
}

impl FromStr for TocRange {
    type Err = String;

    /// Parses `"2"` (a single depth) or `"1-3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u8>()
                .map_err(|_| format!("invalid depth '{}' in '{}'", part.trim(), s))
        };
        match s.split_once('-') {
            Some((min, max)) => Ok(TocRange::new(parse(min)?, parse(max)?)),
            None => {
                let depth = parse(s)?;
                Ok(TocRange::new(depth, depth))
            }
        }
    }
}

/// The shared render configuration for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Explicit document title. When unset, the title is derived per document.
    pub title: Option<String>,
    pub page: PageSize,
    pub landscape: bool,
    pub margins: Margins,
    pub print_background: bool,
    /// Emit a table of contents covering this heading range.
    pub toc: Option<TocRange>,
    /// Extra CSS appended after the built-in stylesheet.
    pub stylesheet: Option<String>,
    /// Also persist the intermediate HTML next to the final document.
    pub keep_html: bool,
    /// Print a "page / total" footer on every page.
    pub page_numbers: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: None,
            page: PageSize::default(),
            landscape: false,
            margins: Margins::default(),
            print_background: true,
            toc: None,
            stylesheet: None,
            keep_html: false,
            page_numbers: false,
        }
    }
}

impl RenderOptions {
    /// Paper width and height in inches, honouring the orientation.
    pub fn paper_in(&self) -> (f64, f64) {
        let (width, height) = self.page.dimensions_in();
        if self.landscape {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// A heading found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
    /// Unique fragment identifier within the document.
    pub anchor: String,
}

/// Auxiliary render inputs derived from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub headings: Vec<Heading>,
}

impl DocumentMeta {
    /// Headings that belong in a table of contents for `range`.
    pub fn toc_entries(&self, range: TocRange) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| range.contains(h.level))
    }
}
