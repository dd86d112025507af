use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use perle_common::file_config::SourceConfig;
use perle_common::text::{collapse_whitespace, truncate_chars};
use perle_common::{ContentItem, ItemId};

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::{dedup_by_id, ContentSource};

/// Prefix for ids taken from link slugs.
const LINK_ID_TAG: &str = "web";

/// How to find perle inside a rendered page.
#[derive(Debug, Clone)]
pub struct DocumentRules {
    /// Container selectors in priority order; the first with any match is used.
    pub selectors: Vec<String>,
    pub text_selector: Option<String>,
    pub category_selector: Option<String>,
    pub author_selector: Option<String>,
    pub max_chars: usize,
}

impl From<&SourceConfig> for DocumentRules {
    fn from(cfg: &SourceConfig) -> Self {
        Self {
            selectors: cfg.selectors.clone(),
            text_selector: cfg.text_selector.clone(),
            category_selector: cfg.category_selector.clone(),
            author_selector: cfg.author_selector.clone(),
            max_chars: cfg.max_chars,
        }
    }
}

pub struct DocumentSource {
    fetcher: Arc<dyn PageFetcher>,
    url: String,
    rules: DocumentRules,
}

impl DocumentSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, url: &str, rules: DocumentRules) -> Self {
        Self {
            fetcher,
            url: url.to_string(),
            rules,
        }
    }
}

#[async_trait]
impl ContentSource for DocumentSource {
    async fn fetch(&self) -> Result<Vec<ContentItem>> {
        let html = self.fetcher.fetch_text(&self.url).await?;
        let items = extract_items(&html, &self.url, &self.rules);
        info!(
            source = "document",
            fetcher = self.fetcher.name(),
            items = items.len(),
            "Extracted perle from page"
        );
        Ok(items)
    }

    fn name(&self) -> &str {
        "document"
    }
}

fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(selector = raw, error = ?e, "Ignoring invalid selector");
            None
        }
    }
}

fn element_text(el: &ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

fn first_child_text(node: &ElementRef, selector: Option<&Selector>) -> Option<String> {
    let selector = selector?;
    node.select(selector)
        .next()
        .map(|el| element_text(&el))
        .filter(|t| !t.is_empty())
}

/// The node's own href, or that of its first descendant link, resolved
/// against the page URL.
fn link_of(node: &ElementRef, base: Option<&Url>, anchor: &Selector) -> Option<Url> {
    let href = node
        .value()
        .attr("href")
        .or_else(|| node.select(anchor).next().and_then(|a| a.value().attr("href")))?;
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match base {
        Some(b) => b.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}

fn trailing_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Pull perle out of an HTML document.
///
/// Ids come from the trailing path segment of each node's link when there is
/// one, otherwise from the text hash, so repeated scrapes of the same page
/// agree on identity.
pub fn extract_items(html: &str, page_url: &str, rules: &DocumentRules) -> Vec<ContentItem> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let anchor = Selector::parse("a[href]").expect("static selector is valid");

    let text_sel = rules.text_selector.as_deref().and_then(parse_selector);
    let category_sel = rules.category_selector.as_deref().and_then(parse_selector);
    let author_sel = rules.author_selector.as_deref().and_then(parse_selector);

    let nodes: Vec<ElementRef> = rules
        .selectors
        .iter()
        .filter_map(|raw| parse_selector(raw).map(|s| (raw, s)))
        .find_map(|(raw, selector)| {
            let matched: Vec<ElementRef> = document.select(&selector).collect();
            if matched.is_empty() {
                debug!(selector = raw.as_str(), "Selector matched nothing");
                None
            } else {
                debug!(selector = raw.as_str(), matches = matched.len(), "Using selector");
                Some(matched)
            }
        })
        .unwrap_or_default();

    let mut items = Vec::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        let raw_text =
            first_child_text(node, text_sel.as_ref()).unwrap_or_else(|| element_text(node));
        let text = truncate_chars(&raw_text, rules.max_chars);

        let item = match ContentItem::candidate(&text) {
            Ok(item) => item,
            Err(reason) => {
                debug!(node = idx, %reason, "Skipping page node");
                continue;
            }
        };

        let link = link_of(node, base.as_ref(), &anchor);
        let item = match link.as_ref().and_then(trailing_segment) {
            Some(slug) => item.with_id(ItemId::from_key(LINK_ID_TAG, &slug)),
            None => item,
        };

        let source_url = link.as_ref().map(Url::as_str).unwrap_or(page_url);
        items.push(
            item.with_category(first_child_text(node, category_sel.as_ref()).as_deref())
                .with_author(first_child_text(node, author_sel.as_ref()).as_deref())
                .with_source_url(Some(source_url)),
        );
    }

    dedup_by_id(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(selectors: &[&str]) -> DocumentRules {
        DocumentRules {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            text_selector: Some(".perla-text".into()),
            category_selector: Some(".categoria".into()),
            author_selector: Some(".autore".into()),
            max_chars: 500,
        }
    }

    const PAGE: &str = r#"
        <html><body>
          <nav><a href="/">Home</a></nav>
          <div class="perla">
            <p class="perla-text">Il prof ha detto che la lavagna è un tablet analogico</p>
            <span class="categoria">Scuola</span><span class="autore">Anna</span>
            <a href="/perle/lavagna-tablet">link</a>
          </div>
          <div class="perla">
            <p>Oggi la mensa serviva pasta al pomodoro senza pomodoro</p>
          </div>
          <div class="perla"><p>corto</p></div>
        </body></html>
    "#;

    #[test]
    fn first_matching_selector_wins() {
        let items = extract_items(PAGE, "https://example.org/perle", &rules(&[".missing", ".perla", "p"]));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn narrower_text_selector_is_preferred() {
        let items = extract_items(PAGE, "https://example.org/perle", &rules(&[".perla"]));
        assert_eq!(
            items[0].text,
            "Il prof ha detto che la lavagna è un tablet analogico"
        );
        assert_eq!(items[0].category.as_deref(), Some("Scuola"));
        assert_eq!(items[0].author.as_deref(), Some("Anna"));
    }

    #[test]
    fn falls_back_to_full_node_text() {
        let items = extract_items(PAGE, "https://example.org/perle", &rules(&[".perla"]));
        assert_eq!(items[1].text, "Oggi la mensa serviva pasta al pomodoro senza pomodoro");
    }

    #[test]
    fn id_from_link_slug_else_text_hash() {
        let items = extract_items(PAGE, "https://example.org/perle", &rules(&[".perla"]));
        assert_eq!(items[0].id.as_str(), "web-lavagna-tablet");
        assert_eq!(
            items[0].source_url.as_deref(),
            Some("https://example.org/perle/lavagna-tablet")
        );
        assert_eq!(
            items[1].id,
            ItemId::from_text("Oggi la mensa serviva pasta al pomodoro senza pomodoro")
        );
        assert_eq!(items[1].source_url.as_deref(), Some("https://example.org/perle"));
    }

    #[test]
    fn long_text_is_truncated() {
        let body = "parola ".repeat(200);
        let html = format!("<blockquote>{body}</blockquote>");
        let mut r = rules(&["blockquote"]);
        r.max_chars = 500;
        let items = extract_items(&html, "https://example.org", &r);
        assert!(items[0].text.chars().count() <= 500);
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let items = extract_items(PAGE, "https://example.org/perle", &rules(&["[[[", ".perla"]));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn no_match_yields_empty() {
        assert!(extract_items(PAGE, "https://example.org", &rules(&[".nope"])).is_empty());
    }

    #[test]
    fn repeated_extraction_is_stable() {
        let r = rules(&[".perla"]);
        let a: Vec<_> = extract_items(PAGE, "https://example.org/perle", &r).into_iter().map(|i| i.id).collect();
        let b: Vec<_> = extract_items(PAGE, "https://example.org/perle", &r).into_iter().map(|i| i.id).collect();
        assert_eq!(a, b);
    }
}
