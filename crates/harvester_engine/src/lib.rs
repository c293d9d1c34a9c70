//! Harvester engine: upstream IO, content pipeline and the run orchestrator.
mod clean;
mod collaborators;
mod decode;
mod extract;
mod fetch;
mod filename;
mod normalize;
mod orchestrator;
mod pacing;
mod persist;
mod rehome;
mod render;
mod session;
mod settings;
mod types;
mod wire;

pub use clean::{
    image_sources, rewrite_image_sources, HtmlCleaner, RewrittenSources, NORMALIZED_IMAGE_WIDTH,
};
pub use collaborators::{
    AuthProvider, ConfigProvider, LogReporter, MediaStore, Reporter, Sink,
};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use extract::{
    ArticleBodyExtractor, ExtractedBody, Extractor, RETRACTION_MARKERS, VERIFICATION_MARKER,
};
pub use fetch::{
    ContentFetcher, FetchSettings, MpPageFetcher, PageFetcher, ReqwestContentFetcher,
    DEFAULT_UPSTREAM_BASE,
};
pub use filename::{media_extension, media_object_name, short_hash};
pub use normalize::{ItemNormalizer, Normalized};
pub use orchestrator::{Clock, Collaborators, Harvester};
pub use pacing::{BrowserHeaders, Pacer, RequestDecorator, RotatingUserAgent};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use rehome::{ContentRehomer, CoverOutcome, RehomeOutcome};
pub use render::{build_markdown_document, render_content, ContentFormat};
pub use session::{SessionLease, SessionRegistry, StaticCredentials};
pub use settings::{derive_max_pages, ConfigError, HarvestSettings, SessionScope};
pub use types::{
    AuthError, ContentError, FetchedPage, MediaError, NormalizeError, PageFailure, ReportError,
    SessionContext, SinkError, StoredArticle,
};
pub use wire::{classify_listing, RET_FREQUENCY_CONTROL, RET_INVALID_SESSION, RET_OK};
