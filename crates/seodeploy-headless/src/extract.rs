//! Pulling SEO content elements out of an HTML document.
//!
//! Every item is a list in document order, stored under `content.<item>`:
//! `title`, `meta_description`, `robots`, `canonical`, `h1`, `h2`,
//! `links` (`{href, text, rel}`), `images` (`{src, alt}`) and `schema`
//! (parsed `application/ld+json` blocks).

use std::collections::BTreeMap;

use regex::Regex;

use seodeploy_core::{PageSnapshot, SnapshotError, SnapshotValue};

/// Compiled patterns used by [`extract_content`].
#[derive(Debug, Clone)]
pub struct Patterns {
    title: Regex,
    heading_1: Regex,
    heading_2: Regex,
    meta: Regex,
    link: Regex,
    anchor: Regex,
    image: Regex,
    script: Regex,
    attribute: Regex,
    tag: Regex,
}

impl Patterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            title: Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>")?,
            heading_1: Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>")?,
            heading_2: Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2\s*>")?,
            meta: Regex::new(r"(?is)<meta\b([^>]*)>")?,
            link: Regex::new(r"(?is)<link\b([^>]*)>")?,
            anchor: Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>")?,
            image: Regex::new(r"(?is)<img\b([^>]*)>")?,
            script: Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>")?,
            attribute: Regex::new(
                r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
        })
    }
}

/// Extract the content items of `html` into a snapshot.
pub fn extract_content(html: &str, patterns: &Patterns) -> PageSnapshot {
    let mut content: BTreeMap<String, SnapshotValue> = BTreeMap::new();

    let texts = |re: &Regex| -> SnapshotValue {
        SnapshotValue::from(
            re.captures_iter(html)
                .map(|c| text_of(&c[1], patterns))
                .collect::<Vec<_>>(),
        )
    };
    content.insert("title".into(), texts(&patterns.title));
    content.insert("h1".into(), texts(&patterns.heading_1));
    content.insert("h2".into(), texts(&patterns.heading_2));

    let metas: Vec<BTreeMap<String, String>> = patterns
        .meta
        .captures_iter(html)
        .map(|c| attributes(&c[1], patterns))
        .collect();
    content.insert("meta_description".into(), meta_contents(&metas, "description"));
    content.insert("robots".into(), meta_contents(&metas, "robots"));

    let canonical: Vec<String> = patterns
        .link
        .captures_iter(html)
        .map(|c| attributes(&c[1], patterns))
        .filter(|attrs| has_token(attrs.get("rel"), "canonical"))
        .map(|attrs| attrs.get("href").cloned().unwrap_or_default())
        .collect();
    content.insert("canonical".into(), SnapshotValue::from(canonical));

    let links: Vec<SnapshotValue> = patterns
        .anchor
        .captures_iter(html)
        .map(|c| {
            let attrs = attributes(&c[1], patterns);
            element(&[
                ("href", attrs.get("href").cloned().unwrap_or_default()),
                ("text", text_of(&c[2], patterns)),
                ("rel", attrs.get("rel").cloned().unwrap_or_default()),
            ])
        })
        .collect();
    content.insert("links".into(), SnapshotValue::List(links));

    let images: Vec<SnapshotValue> = patterns
        .image
        .captures_iter(html)
        .map(|c| {
            let attrs = attributes(&c[1], patterns);
            element(&[
                ("src", attrs.get("src").cloned().unwrap_or_default()),
                ("alt", attrs.get("alt").cloned().unwrap_or_default()),
            ])
        })
        .collect();
    content.insert("images".into(), SnapshotValue::List(images));

    let schema: Vec<SnapshotValue> = patterns
        .script
        .captures_iter(html)
        .filter(|c| {
            attributes(&c[1], patterns)
                .get("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("application/ld+json"))
        })
        .map(|c| match serde_json::from_str::<serde_json::Value>(c[2].trim()) {
            Ok(json) => SnapshotValue::from(json),
            Err(_) => SnapshotValue::from(c[2].trim()),
        })
        .collect();
    content.insert("schema".into(), SnapshotValue::List(schema));

    let mut snapshot = PageSnapshot::new();
    snapshot.insert("content", SnapshotValue::Map(content));
    snapshot
}

/// [`extract_content`] with freshly compiled patterns.
pub fn extract_page(html: &str) -> Result<PageSnapshot, SnapshotError> {
    let patterns = Patterns::new().map_err(|e| SnapshotError::Malformed(e.to_string()))?;
    Ok(extract_content(html, &patterns))
}

/// Lower-cased attribute names mapped to unescaped values.
fn attributes(raw: &str, patterns: &Patterns) -> BTreeMap<String, String> {
    patterns
        .attribute
        .captures_iter(raw)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (c[1].to_ascii_lowercase(), unescape(value))
        })
        .collect()
}

fn meta_contents(metas: &[BTreeMap<String, String>], name: &str) -> SnapshotValue {
    SnapshotValue::from(
        metas
            .iter()
            .filter(|attrs| {
                attrs
                    .get("name")
                    .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|attrs| attrs.get("content").cloned().unwrap_or_default())
            .collect::<Vec<_>>(),
    )
}

fn has_token(value: Option<&String>, token: &str) -> bool {
    value.is_some_and(|v| {
        v.split_ascii_whitespace()
            .any(|t| t.eq_ignore_ascii_case(token))
    })
}

fn element(fields: &[(&str, String)]) -> SnapshotValue {
    SnapshotValue::Map(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), SnapshotValue::from(v.as_str())))
            .collect(),
    )
}

/// Visible text of an HTML fragment: tags stripped, entities decoded,
/// whitespace collapsed.
fn text_of(fragment: &str, patterns: &Patterns) -> String {
    let stripped = patterns.tag.replace_all(fragment, " ");
    unescape(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn unescape(raw: &str) -> String {
    raw.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
