//! Source adapters driven through a canned fetcher: no network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use perle_sources::{
    ContentSource, DocumentRules, DocumentSource, PageFetcher, SourceError, TabularSource,
};

struct CannedFetcher {
    pages: HashMap<String, String>,
}

impl CannedFetcher {
    fn with(url: &str, body: &str) -> Arc<Self> {
        Arc::new(Self {
            pages: HashMap::from([(url.to_string(), body.to_string())]),
        })
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch_text(&self, url: &str) -> perle_sources::Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Status {
                url: url.to_string(),
                status: 404,
            })
    }

    fn name(&self) -> &str {
        "canned"
    }
}

const CSV_URL: &str = "https://docs.example/sheet.csv";
const PAGE_URL: &str = "https://example.org/perle";

#[tokio::test]
async fn tabular_source_yields_valid_items() {
    let fetcher = CannedFetcher::with(
        CSV_URL,
        "testo,categoria,autore\n\"Frase, con virgola\",Scuola,Anna\nno,,\n",
    );
    let source = TabularSource::new(fetcher, CSV_URL, ',');

    let items = source.fetch().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "Frase, con virgola");
    assert_eq!(items[0].source_url.as_deref(), Some(CSV_URL));
    assert!(!items[0].is_published());
}

#[tokio::test]
async fn tabular_source_surfaces_fetch_failure() {
    let fetcher = CannedFetcher::with("https://elsewhere", "");
    let source = TabularSource::new(fetcher, CSV_URL, ',');

    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, SourceError::Status { status: 404, .. }));
}

#[tokio::test]
async fn document_source_extracts_with_fallback_selectors() {
    let html = r#"<main>
        <blockquote>Il bidello sa tutto di tutti, sempre</blockquote>
        <blockquote>La campanella suona sempre troppo tardi</blockquote>
    </main>"#;
    let fetcher = CannedFetcher::with(PAGE_URL, html);
    let rules = DocumentRules {
        selectors: vec![".perla".into(), "blockquote".into()],
        text_selector: None,
        category_selector: None,
        author_selector: None,
        max_chars: 500,
    };
    let source = DocumentSource::new(fetcher, PAGE_URL, rules);

    let items = source.fetch().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].text, "La campanella suona sempre troppo tardi");
    assert_eq!(source.name(), "document");
}
