//! Markdown converter built on pulldown-cmark.

use pulldown_cmark::{Event, HeadingLevel, MetadataBlockKind, Options, Parser, Tag, TagEnd, html};

use crate::{ConvertError, Converted, Converter, SourceMeta};

/// Converts `CommonMark` with GFM extensions to HTML.
///
/// The title comes from a `title:` key in a YAML front matter block, or
/// from the first level-1 heading. The heading is still rendered.
#[derive(Clone, Copy, Debug)]
pub struct MarkdownConverter {
    options: Options,
}

impl MarkdownConverter {
    /// Create a converter with tables, footnotes, strikethrough, task lists
    /// and YAML front matter enabled.
    #[must_use]
    pub fn new() -> Self {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;
        Self { options }
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for MarkdownConverter {
    fn convert(&self, source: &str, _meta: &SourceMeta<'_>) -> Result<Converted, ConvertError> {
        let mut front_matter_title = None;
        let mut heading_title: Option<String> = None;
        let mut in_metadata = false;
        let mut in_first_h1 = false;
        let mut events = Vec::new();

        for event in Parser::new_ext(source, self.options) {
            match &event {
                Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                    in_metadata = true;
                    continue;
                }
                Event::End(TagEnd::MetadataBlock(_)) => {
                    in_metadata = false;
                    continue;
                }
                Event::Text(text) if in_metadata => {
                    if front_matter_title.is_none() {
                        front_matter_title = parse_front_matter_title(text);
                    }
                    continue;
                }
                Event::Start(Tag::Heading {
                    level: HeadingLevel::H1,
                    ..
                }) if heading_title.is_none() => {
                    in_first_h1 = true;
                    heading_title = Some(String::new());
                }
                Event::End(TagEnd::Heading(HeadingLevel::H1)) => in_first_h1 = false,
                Event::Text(text) | Event::Code(text) if in_first_h1 => {
                    if let Some(title) = heading_title.as_mut() {
                        title.push_str(text);
                    }
                }
                _ => {}
            }
            if !in_metadata {
                events.push(event);
            }
        }

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());

        let title = front_matter_title
            .or(heading_title)
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        Ok(Converted { html: out, title })
    }
}

/// Extract the `title:` value from a YAML front matter block.
///
/// Only top-level scalar titles are recognized; surrounding quotes are removed.
fn parse_front_matter_title(block: &str) -> Option<String> {
    block.lines().find_map(|line| {
        let value = line.strip_prefix("title:")?.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);
        (!value.is_empty()).then(|| value.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn convert(markdown: &str) -> Converted {
        let meta = SourceMeta::new(Path::new("/docs/page.md"));
        MarkdownConverter::new().convert(markdown, &meta).unwrap()
    }

    #[test]
    fn test_title_from_first_h1() {
        let result = convert("# Getting Started\n\nText\n\n# Second");
        assert_eq!(result.title.as_deref(), Some("Getting Started"));
        assert!(result.html.contains("<h1>Getting Started</h1>"));
    }

    #[test]
    fn test_title_with_inline_code() {
        let result = convert("# The `serve` command");
        assert_eq!(result.title.as_deref(), Some("The serve command"));
    }

    #[test]
    fn test_front_matter_title_wins() {
        let result = convert("---\ntitle: \"Release Notes\"\n---\n\n# Heading\n");
        assert_eq!(result.title.as_deref(), Some("Release Notes"));
        assert!(!result.html.contains("title:"));
    }

    #[test]
    fn test_no_title() {
        let result = convert("## Only a subsection\n\nBody");
        assert_eq!(result.title, None);
    }

    #[test]
    fn test_image_src_preserved() {
        let result = convert("![diagram](images/flow.png)");
        assert!(result.html.contains(r#"src="images/flow.png""#));
    }

    #[test]
    fn test_tables_enabled() {
        let result = convert("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(result.html.contains("<table>"));
    }

    #[test]
    fn test_default_enables_extensions() {
        let meta = SourceMeta::new(Path::new("/docs/page.md"));
        let result = MarkdownConverter::default()
            .convert("| a |\n|---|\n| 1 |\n\n~~gone~~\n", &meta)
            .unwrap();
        assert!(result.html.contains("<table>"));
        assert!(result.html.contains("<del>gone</del>"));
    }

    #[test]
    fn test_parse_front_matter_title_variants() {
        assert_eq!(
            parse_front_matter_title("author: me\ntitle: Plain"),
            Some("Plain".to_owned())
        );
        assert_eq!(
            parse_front_matter_title("title: 'Quoted'"),
            Some("Quoted".to_owned())
        );
        assert_eq!(parse_front_matter_title("title:"), None);
        assert_eq!(parse_front_matter_title("subtitle: x"), None);
    }
}
