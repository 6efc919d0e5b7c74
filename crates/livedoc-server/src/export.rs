//! Export pipeline.
//!
//! Turns a source document into a standalone HTML page in the output
//! directory: convert, copy referenced local images, rewrite their
//! references, wrap in the page template and write atomically.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use livedoc_assets::AssetSource;
use livedoc_convert::{Converter, SourceMeta, escape_html};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;

use crate::error::{PreviewError, Result};
use crate::output::page_file_name;

/// Local image references: a path-like token ending in a known image extension.
///
/// `:` is excluded so `file:img.png` style links yield the bare path.
static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)[^\s\[\]()<>"'=:|*]+\.(?:png|jpe?g|gif|svg|webp|bmp)\b"#)
        .expect("image reference pattern is valid")
});

/// ASCII bytes escaped in link targets. Non-ASCII bytes are always escaped.
const HREF_ENCODED: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Result of a successful export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedPage {
    /// Path of the written HTML page.
    pub output_path: PathBuf,
    /// Page title.
    pub title: String,
    /// Number of local images copied next to the page.
    pub images: usize,
}

/// Converts documents into preview pages.
#[derive(Clone)]
pub struct Exporter {
    converter: Arc<dyn Converter>,
    assets: AssetSource,
    fallback_ws_port: u16,
}

impl Exporter {
    /// Create an exporter.
    ///
    /// `fallback_ws_port` is embedded in pages exported while no WebSocket
    /// server is bound.
    #[must_use]
    pub fn new(converter: Arc<dyn Converter>, assets: AssetSource, fallback_ws_port: u16) -> Self {
        Self {
            converter,
            assets,
            fallback_ws_port,
        }
    }

    /// Asset source used for the template and published files.
    #[must_use]
    pub fn assets(&self) -> &AssetSource {
        &self.assets
    }

    /// Export `source` into `out_dir`.
    ///
    /// On failure the previously exported page, if any, is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::ExportFailed`] if the source cannot be read,
    /// the converter fails, or the output cannot be written.
    pub fn export(&self, source: &Path, out_dir: &Path, ws_port: Option<u16>) -> Result<ExportedPage> {
        let fail = |reason: &dyn std::fmt::Display| PreviewError::export_failed(source, reason);

        self.assets
            .publish(out_dir)
            .map_err(|e| fail(&format_args!("cannot publish assets: {e}")))?;

        let output_path = out_dir.join(page_file_name(source));

        let text = std::fs::read_to_string(source).map_err(|e| fail(&e))?;
        let meta = SourceMeta::new(source);
        let converted = self.converter.convert(&text, &meta).map_err(|e| fail(&e))?;
        let title = converted.title.unwrap_or_else(|| meta.file_stem());

        let source_dir = source.parent().unwrap_or(Path::new("."));
        let images = copy_images(&find_image_references(&text), source_dir, out_dir)
            .map_err(|e| fail(&format_args!("cannot copy image: {e}")))?;
        let body = rewrite_references(&converted.html, &images);

        let port = ws_port.unwrap_or(self.fallback_ws_port);
        let page = render_page(&self.assets.template(), &title, &body, port);

        write_atomic(out_dir, &output_path, page.as_bytes()).map_err(|e| fail(&e))?;

        tracing::info!(
            source = %source.display(),
            output = %output_path.display(),
            images = images.len(),
            "Exported page"
        );

        Ok(ExportedPage {
            output_path,
            title,
            images: images.len(),
        })
    }
}

/// Find distinct local image references in document source, in order of appearance.
///
/// URLs (`scheme://...`) are skipped.
pub(crate) fn find_image_references(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in IMAGE_REF.find_iter(text) {
        let reference = m.as_str();
        if reference.starts_with("//") || seen.iter().any(|s| s == reference) {
            continue;
        }
        seen.push(reference.to_owned());
    }
    seen
}

/// Copy referenced images that exist on disk into `out_dir`.
///
/// Relative references resolve against `source_dir`. Returns a map from the
/// original reference string to the copied file's base name.
fn copy_images(
    references: &[String],
    source_dir: &Path,
    out_dir: &Path,
) -> std::io::Result<BTreeMap<String, String>> {
    let mut mapping = BTreeMap::new();

    for reference in references {
        let path = source_dir.join(reference);
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = out_dir.join(file_name);
        if path != target {
            std::fs::copy(&path, &target)?;
        }
        tracing::debug!(reference = %reference, target = %target.display(), "Copied image");
        mapping.insert(reference.clone(), file_name.to_string_lossy().into_owned());
    }

    Ok(mapping)
}

/// Replace every occurrence of each original reference with its new name.
///
/// Plain substring replacement, not HTML-aware: a reference that also appears
/// as ordinary text is replaced too. Renderers percent-encode non-ASCII bytes
/// in `src` attributes, so the encoded form of each reference is replaced as
/// well, with the encoded new name. Longer references are applied first so
/// that a reference which is a suffix of another cannot pre-empt it, which
/// makes the result independent of mapping order.
pub(crate) fn rewrite_references(html: &str, mapping: &BTreeMap<String, String>) -> String {
    let mut entries: Vec<(String, String)> = Vec::new();
    for (from, to) in mapping {
        let encoded = href_encode(from);
        if encoded != *from {
            entries.push((encoded, href_encode(to)));
        }
        entries.push((from.clone(), to.clone()));
    }
    entries.retain(|(from, to)| from != to);
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let mut out = html.to_owned();
    for (from, to) in entries {
        out = out.replace(&from, &to);
    }
    out
}

/// Percent-encode a path the way it appears in a rendered `src` attribute.
fn href_encode(path: &str) -> String {
    utf8_percent_encode(path, HREF_ENCODED).to_string()
}

/// Substitute title, WebSocket port and body into the page template.
///
/// The body is substituted last so placeholder-like text inside the document
/// is left alone.
pub(crate) fn render_page(template: &str, title: &str, body: &str, ws_port: u16) -> String {
    template
        .replace("{{title}}", &escape_html(title))
        .replace("{{ws_port}}", &ws_port.to_string())
        .replacen("{{body}}", body, 1)
}

/// Write `content` to `target` via a temporary file in `dir` and a rename.
fn write_atomic(dir: &Path, target: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".livedoc-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
