//! Record-level access tags.
//!
//! A data tag has exactly three colon-separated segments:
//! `level:compartment1,compartment2:group1,group2`. Values are lowercased and
//! empty segments are kept, so `"public::"` and `"::"` are both valid tags.
//!
//! ```rust
//! use abac_bench_core::tag::encode;
//!
//! assert_eq!(encode("Public", &["HR", "Sales"], &[] as &[&str]), "public:hr,sales:");
//! assert_eq!(encode("", &[] as &[&str], &[] as &[&str]), "::");
//! ```

use std::fmt;

use crate::error::{BenchError, BenchResult};

/// Separator between the level, compartment and group segments.
pub const SEGMENT_SEPARATOR: char = ':';

/// Separator between values within a segment.
pub const VALUE_SEPARATOR: char = ',';

/// Encode a level, compartments and groups into a tag string.
pub fn encode<C, G>(level: &str, compartments: &[C], groups: &[G]) -> String
where
    C: AsRef<str>,
    G: AsRef<str>,
{
    let mut tag = String::with_capacity(level.len() + 2 + 16);
    tag.push_str(&level.to_lowercase());
    tag.push(SEGMENT_SEPARATOR);
    push_segment(&mut tag, compartments);
    tag.push(SEGMENT_SEPARATOR);
    push_segment(&mut tag, groups);
    tag
}

fn push_segment<S: AsRef<str>>(out: &mut String, values: &[S]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(VALUE_SEPARATOR);
        }
        out.push_str(&value.as_ref().to_lowercase());
    }
}

/// A decoded data tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataTag {
    /// Level short name, empty when the row carries no level.
    pub level: String,
    /// Compartment short names in tag order.
    pub compartments: Vec<String>,
    /// Group short names in tag order.
    pub groups: Vec<String>,
}

impl DataTag {
    /// Create a tag from its parts. Values are lowercased.
    pub fn new<C, G>(level: &str, compartments: &[C], groups: &[G]) -> Self
    where
        C: AsRef<str>,
        G: AsRef<str>,
    {
        Self {
            level: level.to_lowercase(),
            compartments: compartments.iter().map(|c| c.as_ref().to_lowercase()).collect(),
            groups: groups.iter().map(|g| g.as_ref().to_lowercase()).collect(),
        }
    }

    /// Parse the three-segment form.
    ///
    /// # Errors
    ///
    /// Returns an invalid-argument error when the tag does not have exactly
    /// three segments.
    pub fn parse(tag: &str) -> BenchResult<Self> {
        let mut segments = tag.split(SEGMENT_SEPARATOR);
        let (Some(level), Some(compartments), Some(groups), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(BenchError::invalid_argument(format!(
                "Data tag '{}' must have exactly three segments",
                tag
            )));
        };

        Ok(Self {
            level: level.to_lowercase(),
            compartments: split_values(compartments),
            groups: split_values(groups),
        })
    }

    /// Encode back into the tag string.
    pub fn encode(&self) -> String {
        encode(&self.level, &self.compartments, &self.groups)
    }

    /// Whether the tag carries no attribute at all.
    pub fn is_unrestricted(&self) -> bool {
        self.level.is_empty() && self.compartments.is_empty() && self.groups.is_empty()
    }
}

impl fmt::Display for DataTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn split_values(segment: &str) -> Vec<String> {
    segment
        .split(VALUE_SEPARATOR)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .collect()
}
