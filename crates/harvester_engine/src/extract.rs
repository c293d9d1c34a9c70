use scraper::{Html, Selector};

/// Shown instead of the article when the publisher deleted it or it was taken down.
pub const RETRACTION_MARKERS: &[&str] = &["该内容已被发布者删除", "此内容因违规无法查看", "内容已删除"];

/// Interstitial served when the upstream wants a captcha before showing content.
pub const VERIFICATION_MARKER: &str = "当前环境异常，完成验证后即可继续访问";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedBody {
    Content(String),
    Retracted,
    /// Body hidden behind a verification page; the article can be enriched later.
    VerificationWall,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str) -> ExtractedBody;
}

/// Picks the article container: `#js_content`, then `<article>`, then `<body>`.
#[derive(Debug, Default)]
pub struct ArticleBodyExtractor;

impl Extractor for ArticleBodyExtractor {
    fn extract(&self, html: &str) -> ExtractedBody {
        if RETRACTION_MARKERS.iter().any(|marker| html.contains(marker)) {
            return ExtractedBody::Retracted;
        }
        if html.contains(VERIFICATION_MARKER) {
            return ExtractedBody::VerificationWall;
        }

        let doc = Html::parse_document(html);
        let content = ["#js_content", "article", "body"]
            .iter()
            .filter_map(|css| Selector::parse(css).ok())
            .find_map(|sel| doc.select(&sel).next().map(|node| node.inner_html()))
            .unwrap_or_else(|| doc.root_element().html());
        ExtractedBody::Content(content.trim().to_string())
    }
}
