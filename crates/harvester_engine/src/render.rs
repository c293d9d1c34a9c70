use chrono::DateTime;
use harvester_core::CanonicalArticle;
use scraper::Html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentFormat {
    #[default]
    Html,
    Text,
    Markdown,
}

pub fn render_content(html: &str, format: ContentFormat) -> String {
    match format {
        ContentFormat::Html => html.to_string(),
        ContentFormat::Text => html_to_text(html),
        ContentFormat::Markdown => html2md::parse_html(html).trim().to_string(),
    }
}

/// Visible text with runs of blank lines collapsed.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    let mut lines = Vec::new();
    let mut previous_blank = true;
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }
    lines.join("\n").trim().to_string()
}

/// Markdown document with a front matter header, as written next to stored articles.
pub fn build_markdown_document(article: &CanonicalArticle) -> String {
    let published = DateTime::from_timestamp(article.published_at_unix, 0)
        .map(|at| at.to_rfc3339())
        .unwrap_or_default();
    let title = article.title.replace('\n', " ");
    let body = render_content(&article.html_body, ContentFormat::Markdown);
    format!(
        "---\nid: {id}\nurl: {url}\ntitle: {title}\npublished: {published}\nfeed_id: {feed_id}\n---\n\n{body}\n",
        id = article.id,
        url = article.url,
        feed_id = article.feed_id,
    )
}
