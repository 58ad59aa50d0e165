//! Markdown analysis and HTML page composition.
//!
//! Both renderers share this module: [`derive_meta`] runs once per document in
//! the job runner, [`compose_page`] turns a request into a standalone HTML5
//! page that either ends up on disk or is printed by Chromium.

use comrak::nodes::{AstNode, NodeValue};
use comrak::options::Options;
use comrak::{Arena, format_html, parse_document};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use quire_traits::{
    DocumentMeta, Heading, InvalidTocRange, RenderError, RenderOptions, RenderRequest,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Derived metadata that cannot be used for rendering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error(transparent)]
    TocRange(#[from] InvalidTocRange),

    #[error("document title must not be blank")]
    BlankTitle,
}

const FALLBACK_TITLE: &str = "Untitled";
const FALLBACK_ANCHOR: &str = "section";

const BASE_CSS: &str = r#"html { font-size: 11pt; }
body {
  font-family: "Helvetica Neue", Helvetica, Arial, sans-serif;
  line-height: 1.5;
  color: #1f2328;
  margin: 0;
}
h1, h2, h3, h4, h5, h6 { line-height: 1.25; margin: 1.4em 0 0.6em; page-break-after: avoid; }
h1 { font-size: 2em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
h2 { font-size: 1.5em; border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
pre, code { font-family: "SFMono-Regular", Menlo, Consolas, monospace; font-size: 0.9em; }
pre { background: #f6f8fa; padding: 0.8em; overflow-x: auto; page-break-inside: avoid; }
code { background: #f6f8fa; padding: 0.1em 0.3em; border-radius: 3px; }
pre code { background: none; padding: 0; }
blockquote { margin: 0; padding: 0 1em; color: #59636e; border-left: 0.25em solid #d0d7de; }
table { border-collapse: collapse; margin: 1em 0; }
th, td { border: 1px solid #d0d7de; padding: 0.3em 0.8em; }
img { max-width: 100%; }
nav.toc { page-break-after: always; }
nav.toc ul { list-style: none; padding-left: 0; }
nav.toc li.toc-level-2 { padding-left: 1.5em; }
nav.toc li.toc-level-3 { padding-left: 3em; }
nav.toc li.toc-level-4 { padding-left: 4.5em; }
nav.toc li.toc-level-5 { padding-left: 6em; }
nav.toc li.toc-level-6 { padding-left: 7.5em; }
nav.toc a { color: inherit; text-decoration: none; }
"#;

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();
    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.front_matter_delimiter = Some("---".to_string());
    options
}

/// Derives the per-document metadata used by the renderers.
///
/// The title is the explicit `options.title` when set, otherwise the text of
/// the first level-1 heading, otherwise the first heading of any level.
pub fn derive_meta(source: &str, options: &RenderOptions) -> Result<DocumentMeta, MetaError> {
    if let Some(range) = &options.toc {
        range.validate()?;
    }
    if let Some(title) = &options.title {
        if title.trim().is_empty() {
            return Err(MetaError::BlankTitle);
        }
    }

    let arena = Arena::new();
    let root = parse_document(&arena, source, &markdown_options());
    let headings = collect_headings(root);

    let title = options.title.clone().or_else(|| {
        let named = || headings.iter().filter(|h| !h.text.is_empty());
        named()
            .find(|h| h.level == 1)
            .or_else(|| named().next())
            .map(|h| h.text.clone())
    });

    Ok(DocumentMeta { title, headings })
}

/// Composes the full HTML page for a render request.
pub fn compose_page(request: RenderRequest<'_>) -> Result<String, RenderError> {
    let options = request.options;
    let body = render_body(request.source, &request.meta.headings)?;
    let title = request.meta.title.as_deref().unwrap_or(FALLBACK_TITLE);

    let mut page = String::with_capacity(body.len() + BASE_CSS.len() + 1024);
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    page.push_str("<style>\n");
    page.push_str(BASE_CSS);
    page.push_str(&page_rule(options));
    if let Some(stylesheet) = &options.stylesheet {
        page.push_str(stylesheet);
        page.push('\n');
    }
    page.push_str("</style>\n</head>\n<body>\n");
    if let Some(range) = options.toc {
        let entries: Vec<&Heading> = request.meta.toc_entries(range).collect();
        if !entries.is_empty() {
            page.push_str(&table_of_contents(&entries));
        }
    }
    page.push_str("<main>\n");
    page.push_str(&body);
    page.push_str("</main>\n</body>\n</html>\n");
    Ok(page)
}

fn page_rule(options: &RenderOptions) -> String {
    let orientation = if options.landscape { " landscape" } else { "" };
    let m = options.margins;
    format!(
        "@page {{ size: {}{}; margin: {}in {}in {}in {}in; }}\n",
        options.page.css_name(),
        orientation,
        m.top,
        m.right,
        m.bottom,
        m.left
    )
}

fn table_of_contents(entries: &[&Heading]) -> String {
    let mut toc = String::from("<nav class=\"toc\">\n<p class=\"toc-title\">Contents</p>\n<ul>\n");
    for heading in entries {
        toc.push_str(&format!(
            "<li class=\"toc-level-{}\"><a href=\"#{}\">{}</a></li>\n",
            heading.level,
            escape_html(&heading.anchor),
            escape_html(&heading.text)
        ));
    }
    toc.push_str("</ul>\n</nav>\n");
    toc
}

fn render_body(source: &str, headings: &[Heading]) -> Result<String, RenderError> {
    let options = markdown_options();
    let arena = Arena::new();
    let root = parse_document(&arena, source, &options);

    let mut html = String::new();
    format_html(root, &options, &mut html).map_err(|err| RenderError::Markup(err.to_string()))?;

    apply_heading_ids(&html, headings)
}

/// Sets `id` attributes on the rendered headings, in document order.
fn apply_heading_ids(html: &str, headings: &[Heading]) -> Result<String, RenderError> {
    if headings.is_empty() {
        return Ok(html.to_string());
    }
    let mut anchors = headings.iter().map(|h| h.anchor.as_str());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("h1, h2, h3, h4, h5, h6", move |el| {
                if let Some(anchor) = anchors.next() {
                    el.set_attribute("id", anchor)?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| RenderError::Markup(err.to_string()))
}

fn collect_headings(root: &AstNode<'_>) -> Vec<Heading> {
    fn walk(node: &AstNode<'_>, slugger: &mut AnchorSlugger, headings: &mut Vec<Heading>) {
        if let Some(level) = heading_level(node) {
            let text = collect_inline_text(node)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let anchor = slugger.anchor_for(&text);
            headings.push(Heading {
                level,
                text,
                anchor,
            });
            // Headings never nest.
            return;
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, slugger, headings);
            child = next.next_sibling();
        }
    }

    let mut slugger = AnchorSlugger::default();
    let mut headings = Vec::new();
    walk(root, &mut slugger, &mut headings);
    headings
}

fn heading_level(node: &AstNode<'_>) -> Option<u8> {
    let data = node.data.borrow();
    if let NodeValue::Heading(heading) = &data.value {
        Some(heading.level)
    } else {
        None
    }
}

fn collect_inline_text(node: &AstNode<'_>) -> String {
    fn walk(node: &AstNode<'_>, buffer: &mut String) {
        {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::Text(text) => buffer.push_str(text),
                NodeValue::Code(code) => buffer.push_str(&code.literal),
                NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
                _ => {}
            }
        }
        let mut child = node.first_child();
        while let Some(next) = child {
            walk(next, buffer);
            child = next.next_sibling();
        }
    }

    let mut text = String::new();
    let mut child = node.first_child();
    while let Some(next) = child {
        walk(next, &mut text);
        child = next.next_sibling();
    }
    text
}

/// Hands out unique anchors within one document: `setup`, `setup-2`, ...
#[derive(Default, Debug)]
struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
    issued: HashSet<String>,
}

impl AnchorSlugger {
    fn anchor_for(&mut self, text: &str) -> String {
        let mut base = slug::slugify(text);
        if base.is_empty() {
            base = FALLBACK_ANCHOR.to_string();
        }
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        loop {
            *count += 1;
            let candidate = if *count == 1 {
                base.clone()
            } else {
                format!("{}-{}", base, *count)
            };
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
