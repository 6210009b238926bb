//! Extraction and rendering options.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How pictures (and charts without labels) are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FigureMode {
    #[default]
    Placeholder,
    Omit,
}

impl FromStr for FigureMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "placeholder" => Ok(Self::Placeholder),
            "omit" => Ok(Self::Omit),
            other => Err(Error::InvalidOption(format!(
                "figures must be 'placeholder' or 'omit', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FigureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder => write!(f, "placeholder"),
            Self::Omit => write!(f, "omit"),
        }
    }
}

/// How charts are represented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMode {
    #[default]
    Labels,
    Placeholder,
    Omit,
}

impl FromStr for ChartMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "labels" => Ok(Self::Labels),
            "placeholder" => Ok(Self::Placeholder),
            "omit" => Ok(Self::Omit),
            other => Err(Error::InvalidOption(format!(
                "charts must be 'labels', 'placeholder' or 'omit', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ChartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Labels => write!(f, "labels"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::Omit => write!(f, "omit"),
        }
    }
}

/// Options controlling extraction and Markdown rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractOptions {
    /// Append presenter notes as a note block.
    pub with_notes: bool,
    pub figures: FigureMode,
    pub charts: ChartMode,
    /// Treat the first table row as a header.
    pub table_header: bool,
    /// 1-based slide numbers to keep. `None` keeps every slide.
    pub slide_range: Option<SlideRange>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            with_notes: false,
            figures: FigureMode::Placeholder,
            charts: ChartMode::Labels,
            table_header: true,
            slide_range: None,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(mut self, with_notes: bool) -> Self {
        self.with_notes = with_notes;
        self
    }

    pub fn with_figures(mut self, figures: FigureMode) -> Self {
        self.figures = figures;
        self
    }

    pub fn with_charts(mut self, charts: ChartMode) -> Self {
        self.charts = charts;
        self
    }

    pub fn with_table_header(mut self, table_header: bool) -> Self {
        self.table_header = table_header;
        self
    }

    pub fn with_slide_range(mut self, range: Option<SlideRange>) -> Self {
        self.slide_range = range;
        self
    }

    /// Whether the 1-based slide number passes the range filter.
    pub fn includes_slide(&self, number: usize) -> bool {
        self.slide_range
            .as_ref()
            .map_or(true, |range| range.contains(number))
    }
}

/// A set of 1-based slide numbers, parsed from strings like `1,3-5`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRange(BTreeSet<usize>);

impl SlideRange {
    pub fn contains(&self, number: usize) -> bool {
        self.0.contains(&number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<usize> for SlideRange {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for SlideRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut numbers = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let parse = |v: &str| {
                v.trim().parse::<usize>().ok().filter(|n| *n > 0).ok_or_else(|| {
                    Error::InvalidOption(format!("invalid slide number '{}' in '{}'", v.trim(), s))
                })
            };
            match part.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (parse(start)?, parse(end)?);
                    if start > end {
                        return Err(Error::InvalidOption(format!(
                            "slide range '{}' is reversed",
                            part
                        )));
                    }
                    numbers.extend(start..=end);
                }
                None => {
                    numbers.insert(parse(part)?);
                }
            }
        }
        if numbers.is_empty() {
            return Err(Error::InvalidOption(format!("empty slide range '{}'", s)));
        }
        Ok(Self(numbers))
    }
}
