//! Document-to-HTML conversion for livedoc.
//!
//! The preview core treats conversion as an opaque step: source text goes in,
//! an HTML body fragment (and optionally a title) comes out. This crate
//! defines that seam as the [`Converter`] trait and ships a
//! [`MarkdownConverter`] built on pulldown-cmark.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use livedoc_convert::{Converter, MarkdownConverter, SourceMeta};
//!
//! let meta = SourceMeta::new(Path::new("/notes/guide.md"));
//! let converted = MarkdownConverter::new()
//!     .convert("# Guide\n\nHello", &meta)
//!     .unwrap();
//!
//! assert_eq!(converted.title.as_deref(), Some("Guide"));
//! assert!(converted.html.contains("<p>Hello</p>"));
//! ```

mod markdown;

use std::path::Path;

pub use markdown::MarkdownConverter;

/// Metadata about the document being converted.
#[derive(Clone, Copy, Debug)]
pub struct SourceMeta<'a> {
    /// Absolute path of the source document.
    pub path: &'a Path,
}

impl<'a> SourceMeta<'a> {
    /// Create metadata for a source file.
    #[must_use]
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    /// File stem of the source document, used as a fallback title.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Output of a conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Converted {
    /// HTML body fragment.
    pub html: String,
    /// Title from document metadata, if the document declares one.
    pub title: Option<String>,
}

/// Conversion error.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The converter rejected the document.
    #[error("{0}")]
    Invalid(String),
    /// The converter failed for an external reason.
    #[error("converter failed: {0}")]
    Failed(String),
}

/// Converts document source text to an HTML body fragment.
///
/// Implementations must be synchronous and must not touch caller state.
pub trait Converter: Send + Sync {
    /// Convert `source` into an HTML fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be converted.
    fn convert(&self, source: &str, meta: &SourceMeta<'_>) -> Result<Converted, ConvertError>;
}

/// Escape text for inclusion in HTML content or attribute values.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
