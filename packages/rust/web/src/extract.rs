//! Readability-style article extraction.
//!
//! Finds the main content area with the usual heuristics (`<main>`,
//! `<article>`, `[role=main]`, `.content`, then `<body>`), strips page chrome,
//! and reads title, excerpt, author, lead image and favicon from the document
//! metadata.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use linkshelf_shared::{ContentExtractor, ExtractedArticle, LinkshelfError, Result};

/// Candidate content roots, most specific first.
const CONTENT_SELECTORS: [&str; 5] = ["main", "article", r#"[role="main"]"#, ".content", "body"];

/// Elements never considered article content.
const CHROME_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "template", "iframe",
    "svg", "form",
];

/// Elements that break the flow of text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul",
    "ol", "pre", "blockquote", "table", "tr", "br", "hr", "figure", "figcaption", "dd", "dt",
];

/// Longest excerpt derived from body text, in characters.
const EXCERPT_MAX_CHARS: usize = 300;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Scraper-based [`ContentExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadabilityExtractor;

impl ContentExtractor for ReadabilityExtractor {
    #[instrument(skip(self, page), fields(url = %source_url, bytes = page.len()))]
    fn extract(&self, page: &[u8], source_url: &Url) -> Result<ExtractedArticle> {
        let source = String::from_utf8_lossy(page);
        let doc = Html::parse_document(&source);

        let root = content_root(&doc);
        let text_content = root.map(element_text).unwrap_or_default();
        let title = extract_title(&doc);

        if title.is_empty() && text_content.is_empty() {
            return Err(LinkshelfError::extraction(format!(
                "{source_url}: no readable content"
            )));
        }

        let excerpt = meta_content(
            &doc,
            &[
                r#"meta[property="og:description"]"#,
                r#"meta[name="description"]"#,
                r#"meta[name="twitter:description"]"#,
            ],
        )
        .or_else(|| root.and_then(first_paragraph))
        .unwrap_or_default();

        let article = ExtractedArticle {
            title,
            excerpt,
            author: extract_author(&doc),
            html: root.map(|el| strip_chrome(&el.inner_html())).unwrap_or_default(),
            text_content,
            image_url: extract_image(&doc, source_url),
            favicon_url: extract_favicon(&doc, source_url),
        };

        debug!(
            title = %article.title,
            text_len = article.text_content.len(),
            has_image = !article.image_url.is_empty(),
            has_favicon = !article.favicon_url.is_empty(),
            "article extracted"
        );

        Ok(article)
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Pick the element holding the article body.
fn content_root(doc: &Html) -> Option<ElementRef<'_>> {
    CONTENT_SELECTORS
        .iter()
        .find_map(|css| doc.select(&selector(css)).next())
}

/// Plain text of an element, chrome skipped, one line per block.
fn element_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(el, &mut raw);

    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if is_chrome(&child_el) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&child_el.value().name());
            if block {
                out.push('\n');
            }
            collect_text(child_el, out);
            if block {
                out.push('\n');
            }
        }
    }
}

fn is_chrome(el: &ElementRef<'_>) -> bool {
    CHROME_TAGS.contains(&el.value().name())
        || el
            .value()
            .classes()
            .any(|class| class == "sidebar" || class == "nav")
}

/// Strip common navigation/chrome elements from HTML content.
fn strip_chrome(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let chrome_sel = selector(
        "nav, header, footer, aside, script, style, noscript, template, iframe, form, .sidebar, .nav",
    );

    let mut result = html.to_string();
    for el in doc.select(&chrome_sel) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result.trim().to_string()
}

/// First non-empty paragraph, cut at a word boundary.
fn first_paragraph(root: ElementRef<'_>) -> Option<String> {
    let p_sel = selector("p");
    let text = root
        .select(&p_sel)
        .map(element_text)
        .find(|t| !t.is_empty())?;

    if text.chars().count() <= EXCERPT_MAX_CHARS {
        return Some(text);
    }

    let cut: String = text.chars().take(EXCERPT_MAX_CHARS).collect();
    let trimmed = match cut.rfind(' ') {
        Some(idx) => &cut[..idx],
        None => cut.as_str(),
    };
    Some(trimmed.trim_end().to_string())
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn collapse_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// First non-empty `content` attribute among the given meta selectors.
fn meta_content(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        doc.select(&selector(css))
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .find(|v| !v.is_empty())
    })
}

/// Text of the first matching element with non-empty text.
fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&selector(css))
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn extract_title(doc: &Html) -> String {
    meta_content(
        doc,
        &[r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#],
    )
    .or_else(|| first_text(doc, "title"))
    .or_else(|| first_text(doc, "h1"))
    .unwrap_or_default()
}

fn extract_author(doc: &Html) -> String {
    meta_content(
        doc,
        &[
            r#"meta[name="author"]"#,
            r#"meta[property="article:author"]"#,
        ],
    )
    .or_else(|| first_text(doc, r#"[rel="author"]"#))
    .or_else(|| first_text(doc, ".byline"))
    .unwrap_or_default()
}

fn extract_image(doc: &Html, base: &Url) -> String {
    [
        r#"meta[property="og:image"]"#,
        r#"meta[property="og:image:url"]"#,
        r#"meta[name="twitter:image"]"#,
        r#"meta[property="twitter:image"]"#,
    ]
    .iter()
    .flat_map(|css| {
        doc.select(&selector(css))
            .filter_map(|el| el.value().attr("content"))
            .collect::<Vec<_>>()
    })
    .find_map(|href| resolve(base, href))
    .unwrap_or_default()
}

fn extract_favicon(doc: &Html, base: &Url) -> String {
    [r#"link[rel~="icon"]"#, r#"link[rel="apple-touch-icon"]"#]
        .iter()
        .flat_map(|css| {
            doc.select(&selector(css))
                .filter_map(|el| el.value().attr("href"))
                .collect::<Vec<_>>()
        })
        .find_map(|href| resolve(base, href))
        .unwrap_or_default()
}

/// Resolve `href` against the page URL; only http(s) results are kept.
fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"<!doctype html>
<html>
<head>
  <title>Fallback Title | Example</title>
  <meta property="og:title" content="Example Article">
  <meta name="description" content="  An article   about things. ">
  <meta name="author" content="Jane Doe">
  <meta property="og:image" content="/img.png">
  <link rel="shortcut icon" href="/favicon.ico">
  <script>window.analytics = {};</script>
</head>
<body>
  <header><nav><a href="/">Home</a></nav></header>
  <main>
    <h1>Example Article</h1>
    <p>First paragraph with <b>bold</b> text.</p>
    <aside class="related">Related links</aside>
    <p>Second paragraph.</p>
  </main>
  <footer>Copyright 2026</footer>
</body>
</html>"#;

    fn source() -> Url {
        Url::parse("https://ex.com/a").unwrap()
    }

    fn extract(html: &str) -> Result<ExtractedArticle> {
        ReadabilityExtractor.extract(html.as_bytes(), &source())
    }

    #[test]
    fn extracts_metadata_and_content() {
        let article = extract(ARTICLE).expect("extract");

        assert_eq!(article.title, "Example Article");
        assert_eq!(article.excerpt, "An article about things.");
        assert_eq!(article.author, "Jane Doe");
        assert_eq!(article.image_url, "https://ex.com/img.png");
        assert_eq!(article.favicon_url, "https://ex.com/favicon.ico");

        assert!(article.text_content.contains("First paragraph with bold text."));
        assert!(article.text_content.contains("Second paragraph."));
        assert!(article.html.contains("<b>bold</b>"));
    }

    #[test]
    fn strips_chrome_from_text_and_html() {
        let article = extract(ARTICLE).unwrap();

        assert!(!article.text_content.contains("Related links"));
        assert!(!article.text_content.contains("Copyright"));
        assert!(!article.text_content.contains("analytics"));
        assert!(!article.html.contains("Related links"));
    }

    #[test]
    fn title_falls_back_to_title_tag_then_h1() {
        let html = "<html><head><title> Plain  Title </title></head><body><p>x</p></body></html>";
        assert_eq!(extract(html).unwrap().title, "Plain Title");

        let html = "<html><body><article><h1>Heading Only</h1><p>x</p></article></body></html>";
        assert_eq!(extract(html).unwrap().title, "Heading Only");
    }

    #[test]
    fn excerpt_falls_back_to_first_paragraph() {
        let long = "word ".repeat(200);
        let html = format!(
            "<html><body><article><p>  </p><p>{long}</p></article></body></html>"
        );
        let article = extract(&html).unwrap();

        assert!(article.excerpt.starts_with("word word"));
        assert!(article.excerpt.chars().count() <= EXCERPT_MAX_CHARS);
        assert!(!article.excerpt.ends_with(' '));
    }

    #[test]
    fn byline_author_when_no_meta() {
        let html = r#"<html><body><article>
            <p class="byline">  By Sam   Smith </p><p>Body</p>
        </article></body></html>"#;
        assert_eq!(extract(html).unwrap().author, "By Sam Smith");
    }

    #[test]
    fn favicon_only_page() {
        let html = r#"<html><head><title>T</title>
            <link rel="icon" href="https://cdn.ex.com/icon.png"></head>
            <body><p>Body</p></body></html>"#;
        let article = extract(html).unwrap();
        assert!(article.image_url.is_empty());
        assert_eq!(article.favicon_url, "https://cdn.ex.com/icon.png");
    }

    #[test]
    fn non_http_images_are_ignored() {
        let html = r#"<html><head><title>T</title>
            <meta property="og:image" content="data:image/png;base64,AAAA">
            <meta name="twitter:image" content="https://ex.com/tw.png"></head>
            <body><p>Body</p></body></html>"#;
        assert_eq!(extract(html).unwrap().image_url, "https://ex.com/tw.png");
    }

    #[test]
    fn page_without_title_or_text_is_an_error() {
        let err = extract("<html><head></head><body>  <script>x()</script> </body></html>")
            .unwrap_err();
        assert!(matches!(err, LinkshelfError::Extraction { .. }));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut page = b"<html><head><title>Caf".to_vec();
        page.push(0xE9);
        page.extend_from_slice(b"</title></head><body><p>ok</p></body></html>");
        let article = ReadabilityExtractor.extract(&page, &source()).unwrap();
        assert!(article.title.starts_with("Caf"));
    }
}
