//! Message templates: loading, list-markup sanitizing and exported-document
//! cleanup.
use crate::config::Settings;
use crate::model::TemplateKind;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template id is missing")]
    MissingId,
    #[error("cannot access template {id}: {source}")]
    Unreachable {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Resolve a template id to sanitized markup.
    async fn load(&self, id: &str) -> Result<String, TemplateError>;
}

/// Templates stored as HTML files under one directory; the id is the file name.
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    root: PathBuf,
}

impl FsTemplateStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TemplateStore for FsTemplateStore {
    #[instrument(skip(self))]
    async fn load(&self, id: &str) -> Result<String, TemplateError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TemplateError::MissingId);
        }
        let raw = tokio::fs::read_to_string(self.root.join(id))
            .await
            .map_err(|source| TemplateError::Unreachable {
                id: id.to_string(),
                source,
            })?;
        info!(id, bytes = raw.len(), "template loaded");
        Ok(sanitize(&raw))
    }
}

/// The two gendered bodies used for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePair {
    pub masculine: String,
    pub feminine: String,
}

impl TemplatePair {
    pub async fn load(
        store: &dyn TemplateStore,
        settings: &Settings,
    ) -> Result<TemplatePair, TemplateError> {
        Ok(TemplatePair {
            masculine: store.load(&settings.template_male).await?,
            feminine: store.load(&settings.template_female).await?,
        })
    }

    pub fn for_kind(&self, kind: TemplateKind) -> &str {
        match kind {
            TemplateKind::Masculine => &self.masculine,
            TemplateKind::Feminine => &self.feminine,
        }
    }
}

static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style.*?</style>").unwrap());
static UL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<ul(\s[^>]*)?>").unwrap());
static OL_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<ol(\s[^>]*)?>").unwrap());
static LI_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<li(\s[^>]*)?>").unwrap());
static LI_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<li>(.*?)</li>").unwrap());
static LEADING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\s|&nbsp;)+").unwrap());
static BULLET_SPANS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:<span[^>]*>\s*(?:&bull;|&#8226;|•|·|●|○|-)\s*</span>)+").unwrap()
});
static BULLET_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:&bull;|&#8226;|•|·|●|○|‣|-)\s*").unwrap());
static WRAPPED_P: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)^<p[^>]*>(.*)</p>$").unwrap());

const UL_STYLED: &str =
    r#"<ul style="list-style-type: disc; margin-left:16px; padding-left:18px;">"#;
const OL_STYLED: &str =
    r#"<ol style="list-style-type: decimal; margin-left:16px; padding-left:18px;">"#;

/// Make exported document markup safe for mail clients: drop `<style>`
/// blocks, give lists inline styles and strip hand-drawn bullets so items
/// are not double-bulleted.
pub fn sanitize(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let html = STYLE_BLOCK.replace_all(html, "");
    let html = UL_OPEN.replace_all(&html, UL_STYLED);
    let html = OL_OPEN.replace_all(&html, OL_STYLED);
    let html = LI_OPEN.replace_all(&html, "<li>");
    LI_ITEM
        .replace_all(&html, |caps: &Captures| {
            format!("<li>{}</li>", clean_list_item(&caps[1]))
        })
        .into_owned()
}

fn clean_list_item(inner: &str) -> String {
    let content = LEADING_SPACE.replace(inner, "");
    let content = BULLET_SPANS.replace(&content, "");
    let content = BULLET_CHAR.replace(&content, "");
    let content = LEADING_SPACE.replace(&content, "");
    let trimmed = content.trim();
    match WRAPPED_P.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => content.into_owned(),
    }
}

static TITLE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<p[^>]*class="title"[^>]*>.*?</p>"#).unwrap());
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>.*?</title>").unwrap());
static OG_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<meta[^>]*og:title[^>]*>").unwrap());
static TITLE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<h1[^>]*class="[^"]*title[^"]*"[^>]*>.*?</h1>"#).unwrap()
});
static BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap());
static GENDER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)male|female").unwrap());

/// Strip document chrome from an exported HTML template: the title
/// paragraph, `<title>`, `og:title`, title headings and a leading
/// male/female marker line inside `<body>`.
pub fn clean_exported(html: &str) -> String {
    let html = TITLE_PARAGRAPH.replace(html, "");
    let html = TITLE_TAG.replace_all(&html, "");
    let html = OG_TITLE.replace_all(&html, "");
    let html = TITLE_HEADING.replace_all(&html, "");
    drop_gender_marker_line(&html).trim().to_string()
}

fn drop_gender_marker_line(html: &str) -> String {
    let Some(caps) = BODY.captures(html) else {
        return html.to_string();
    };
    let whole = &caps[0];
    let content = &caps[1];

    // The first fragment runs up to the second tag opening.
    let split_at = content
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '<')
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let (first, rest) = content.split_at(split_at);
    let body = if GENDER_MARKER.is_match(first) {
        rest
    } else {
        content
    };
    html.replacen(whole, &format!("<body>{}</body>", body), 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_drops_style_and_styles_lists() {
        let html = "<style>.c1{color:red}</style><ul class=\"lst\"><li class=\"a\">One</li></ul><ol start=\"2\"><li>Two</li></ol>";
        let out = sanitize(html);
        assert!(!out.contains("<style"));
        assert!(out.contains(UL_STYLED));
        assert!(out.contains(OL_STYLED));
        assert!(out.contains("<li>One</li>"));
        assert!(out.contains("<li>Two</li>"));
    }

    #[test]
    fn sanitize_leaves_link_tags_alone() {
        let html = "<link rel=\"stylesheet\" href=\"x.css\"><p>Hi</p>";
        assert_eq!(sanitize(html), html);
    }

    #[test]
    fn sanitize_strips_bullet_artifacts() {
        let html = "<ul><li> <span class=\"s\">•</span>&nbsp;First</li><li>&bull; Second</li><li>- Third</li><li><p class=\"p\">Fourth <b>bold</b></p></li></ul>";
        let out = sanitize(html);
        assert!(out.contains("<li>First</li>"), "{out}");
        assert!(out.contains("<li>Second</li>"), "{out}");
        assert!(out.contains("<li>Third</li>"), "{out}");
        assert!(out.contains("<li>Fourth <b>bold</b></li>"), "{out}");
    }

    #[test]
    fn clean_exported_removes_titles_and_marker_line() {
        let html = "<html><head><title>Doc</title><meta property=\"og:title\" content=\"Doc\"></head><body class=\"b\"><p class=\"title\">Doc</p><h1 class=\"x title\">Heading</h1>MALE version<p>Hello {0}</p></body></html>";
        let out = clean_exported(html);
        assert!(!out.contains("<title>"));
        assert!(!out.contains("og:title"));
        assert!(!out.contains("Heading"));
        assert!(!out.contains("MALE"));
        assert!(out.contains("<body><p>Hello {0}</p></body>"), "{out}");
    }

    #[test]
    fn clean_exported_keeps_body_without_marker() {
        let html = "<body><p>Hello</p><p>World</p></body>";
        assert_eq!(clean_exported(html), html);
    }

    #[tokio::test]
    async fn fs_store_loads_and_sanitizes() {
        let td = tempdir().unwrap();
        std::fs::write(td.path().join("male.html"), "<style>x</style><p>Hi {0}</p>").unwrap();
        let store = FsTemplateStore::new(td.path());
        assert_eq!(store.load("male.html").await.unwrap(), "<p>Hi {0}</p>");
        assert!(matches!(store.load("  ").await, Err(TemplateError::MissingId)));
        assert!(matches!(
            store.load("missing.html").await,
            Err(TemplateError::Unreachable { .. })
        ));
    }
}
