//! Strips platform markup noise from article bodies.
use std::collections::{HashMap, HashSet};

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

const DROPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "iframe", "template"];

const TRACKING_ATTRIBUTES: &[&str] = &[
    "data-pm-slice",
    "data-tools",
    "data-title",
    "data-nickname",
    "data-alias",
];

const TRACKING_PREFIXES: &[&str] = &["data-track", "data-report"];

/// Inline declarations that hide content, compared with whitespace removed.
const HIDING_DECLARATIONS: &[&str] = &["visibility:hidden", "opacity:0", "display:none"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Children are written verbatim when elements are kept as parsed.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub const NORMALIZED_IMAGE_WIDTH: &str = "width: 1080px";

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlCleaner;

impl HtmlCleaner {
    pub fn clean(&self, html: &str) -> String {
        let mut serializer = Serializer {
            clean: true,
            sources: None,
            applied: HashSet::new(),
            out: String::with_capacity(html.len()),
        };
        serializer.fragment(html)
    }
}

/// Html with image references replaced, plus the urls that were replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenSources {
    pub html: String,
    /// Distinct original urls that were replaced at least once.
    pub applied: HashSet<String>,
}

/// Replaces image references by exact attribute match; everything else is kept.
pub fn rewrite_image_sources(
    html: &str,
    replacements: &HashMap<String, String>,
) -> RewrittenSources {
    let mut serializer = Serializer {
        clean: false,
        sources: Some(replacements),
        applied: HashSet::new(),
        out: String::with_capacity(html.len()),
    };
    let html = serializer.fragment(html);
    RewrittenSources {
        html,
        applied: serializer.applied,
    }
}

/// Tree walk that writes a parsed fragment back out as html.
struct Serializer<'r> {
    /// Apply the noise rules; otherwise elements and comments are kept as parsed.
    clean: bool,
    sources: Option<&'r HashMap<String, String>>,
    applied: HashSet<String>,
    out: String,
}

impl Serializer<'_> {
    fn fragment(&mut self, html: &str) -> String {
        let fragment = Html::parse_fragment(html);
        for child in fragment.root_element().children() {
            self.visit_node(child, false);
        }
        std::mem::take(&mut self.out).trim().to_string()
    }

    fn visit_node(&mut self, node: NodeRef<'_, Node>, raw_text: bool) {
        match node.value() {
            Node::Text(text) if raw_text => self.out.push_str(text),
            Node::Text(text) => escape_text(text, &mut self.out),
            Node::Comment(comment) => {
                if !self.clean {
                    self.out.push_str("<!--");
                    self.out.push_str(comment);
                    self.out.push_str("-->");
                }
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child, raw_text);
                }
            }
        }
    }

    fn visit_element(&mut self, element: ElementRef<'_>) {
        let tag = element.value().name().to_ascii_lowercase();
        if self.clean && DROPPED_ELEMENTS.contains(&tag.as_str()) {
            return;
        }

        let mut attrs = if self.clean {
            clean_attributes(&tag, element.value().attrs())
        } else {
            let mut attrs: Vec<(String, String)> = element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
                .collect();
            attrs.sort_by(|a, b| a.0.cmp(&b.0));
            attrs
        };
        if tag == "img" {
            self.replace_sources(&mut attrs);
        }

        self.out.push('<');
        self.out.push_str(&tag);
        for (name, value) in &attrs {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            escape_attribute(value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');

        if VOID_ELEMENTS.contains(&tag.as_str()) {
            return;
        }
        let raw_text = RAW_TEXT_ELEMENTS.contains(&tag.as_str());
        for child in element.children() {
            self.visit_node(child, raw_text);
        }
        self.out.push_str("</");
        self.out.push_str(&tag);
        self.out.push('>');
    }

    fn replace_sources(&mut self, attrs: &mut [(String, String)]) {
        let Some(sources) = self.sources else {
            return;
        };
        for (name, value) in attrs.iter_mut() {
            if name != "src" && name != "data-src" {
                continue;
            }
            let original = value.trim();
            if let Some(durable) = sources.get(original) {
                self.applied.insert(original.to_string());
                *value = durable.clone();
            }
        }
    }
}

fn is_tracking_attribute(name: &str) -> bool {
    TRACKING_ATTRIBUTES.contains(&name) || TRACKING_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn clean_attributes<'a>(
    tag: &str,
    attrs: impl Iterator<Item = (&'a str, &'a str)>,
) -> Vec<(String, String)> {
    let mut kept: Vec<(String, String)> = Vec::new();
    let mut lazy_src = None;
    for (name, value) in attrs {
        let name = name.to_ascii_lowercase();
        if name.starts_with("on") || is_tracking_attribute(&name) {
            continue;
        }
        match name.as_str() {
            "data-src" => lazy_src = Some(value.to_string()),
            "style" => {
                let style = clean_style(tag, value);
                if !style.is_empty() {
                    kept.push((name, style));
                }
            }
            _ => kept.push((name, value.to_string())),
        }
    }

    if let Some(src) = lazy_src.filter(|src| !src.trim().is_empty()) {
        match kept.iter_mut().find(|(name, _)| name == "src") {
            Some(existing) => existing.1 = src,
            None => kept.push(("src".to_string(), src)),
        }
    }
    kept.sort_by(|a, b| a.0.cmp(&b.0));
    kept
}

fn clean_style(tag: &str, style: &str) -> String {
    style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            let compact: String = decl
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            !HIDING_DECLARATIONS
                .iter()
                .any(|hidden| compact.trim_end_matches("!important") == *hidden)
        })
        .map(|decl| {
            if tag == "img" && is_fixed_pixel_width(decl) {
                NORMALIZED_IMAGE_WIDTH.to_string()
            } else {
                decl.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn is_fixed_pixel_width(decl: &str) -> bool {
    let Some((property, value)) = decl.split_once(':') else {
        return false;
    };
    if !property.trim().eq_ignore_ascii_case("width") {
        return false;
    }
    let value = value.trim().to_ascii_lowercase();
    value
        .strip_suffix("px")
        .is_some_and(|n| !n.is_empty() && n.trim().parse::<f64>().is_ok())
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Image references in document order, preferring the lazy-load source.
pub fn image_sources(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut sources: Vec<String> = Vec::new();
    for node in fragment.root_element().descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if !element.value().name().eq_ignore_ascii_case("img") {
            continue;
        }
        let src = element
            .value()
            .attr("data-src")
            .or_else(|| element.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty() && !src.starts_with("data:"));
        if let Some(src) = src {
            if !sources.iter().any(|seen| seen == src) {
                sources.push(src.to_string());
            }
        }
    }
    sources
}
