use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use perle_common::ContentItem;

use crate::error::Result;
use crate::fetcher::PageFetcher;
use crate::{dedup_by_id, ContentSource};

const TEXT_COLUMN: usize = 0;
const CATEGORY_COLUMN: usize = 1;
const AUTHOR_COLUMN: usize = 2;

/// Spreadsheet published as delimited text (e.g. a CSV export link).
/// Row 0 is a header; columns are text, category, author.
pub struct TabularSource {
    fetcher: Arc<dyn PageFetcher>,
    url: String,
    delimiter: char,
}

impl TabularSource {
    pub fn new(fetcher: Arc<dyn PageFetcher>, url: &str, delimiter: char) -> Self {
        Self {
            fetcher,
            url: url.to_string(),
            delimiter,
        }
    }
}

#[async_trait]
impl ContentSource for TabularSource {
    async fn fetch(&self) -> Result<Vec<ContentItem>> {
        let payload = self.fetcher.fetch_text(&self.url).await?;
        let items = parse_tabular(&payload, self.delimiter, Some(&self.url));
        info!(source = "tabular", items = items.len(), "Parsed spreadsheet rows");
        Ok(items)
    }

    fn name(&self) -> &str {
        "tabular"
    }
}

/// Validate every data row into a content item. Rows with missing or
/// too-short text are skipped.
pub fn parse_tabular(payload: &str, delimiter: char, source_url: Option<&str>) -> Vec<ContentItem> {
    let items = parse_delimited(payload, delimiter)
        .into_iter()
        .skip(1)
        .enumerate()
        .filter_map(|(row_idx, row)| {
            let text = row.get(TEXT_COLUMN).map(String::as_str).unwrap_or_default();
            match ContentItem::candidate(text) {
                Ok(item) => Some(
                    item.with_category(row.get(CATEGORY_COLUMN).map(String::as_str))
                        .with_author(row.get(AUTHOR_COLUMN).map(String::as_str))
                        .with_source_url(source_url),
                ),
                Err(reason) => {
                    debug!(row = row_idx + 1, %reason, "Skipping spreadsheet row");
                    None
                }
            }
        })
        .collect();
    dedup_by_id(items)
}

/// Split delimited text into rows of fields.
///
/// A `"` toggles quoted mode; inside quotes delimiters and newlines are
/// literal and `""` is an escaped quote. CRLF and LF both end a row.
pub fn parse_delimited(payload: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_delimiter_is_preserved() {
        let payload = "testo,categoria,autore\n\"Frase, con virgola\",Scuola,Anna\n";
        let items = parse_tabular(payload, ',', None);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Frase, con virgola");
        assert_eq!(items[0].category.as_deref(), Some("Scuola"));
        assert_eq!(items[0].author.as_deref(), Some("Anna"));
    }

    #[test]
    fn escaped_quotes_and_embedded_newlines() {
        let rows = parse_delimited("a,\"detto \"\"così\"\"\nsu due righe\",c\r\nx,y,z", ',');
        assert_eq!(
            rows,
            vec![
                vec!["a", "detto \"così\"\nsu due righe", "c"],
                vec!["x", "y", "z"],
            ]
        );
    }

    #[test]
    fn short_and_empty_rows_are_skipped() {
        let payload = "testo,categoria,autore\nok,,\n\n,Scuola,Anna\nBuongiorno gruppo,,\n";
        let items = parse_tabular(payload, ',', None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Buongiorno gruppo");
        assert_eq!(items[0].category, None);
    }

    #[test]
    fn missing_columns_are_tolerated() {
        let items = parse_tabular("testo\nSolo il testo, niente altro\n", ';', None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "Solo il testo, niente altro");
        assert_eq!(items[0].author, None);
    }

    #[test]
    fn alternate_delimiter() {
        let items = parse_tabular("t;c;a\nCiao a tutti quanti;Classe;Marco\n", ';', None);
        assert_eq!(items[0].category.as_deref(), Some("Classe"));
        assert_eq!(items[0].author.as_deref(), Some("Marco"));
    }

    #[test]
    fn duplicate_rows_collapse() {
        let payload = "t\nCiao a tutti quanti\nciao a tutti quanti\n";
        assert_eq!(parse_tabular(payload, ',', None).len(), 1);
    }

    #[test]
    fn ids_are_stable_across_parses() {
        let payload = "t,c,a\nCiao a tutti quanti,Scuola,Anna\n";
        let first = parse_tabular(payload, ',', None);
        let second = parse_tabular(payload, ',', Some("https://docs.example/csv"));
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn no_trailing_newline() {
        let rows = parse_delimited("h\nlast,row", ',');
        assert_eq!(rows.last().unwrap(), &vec!["last".to_string(), "row".to_string()]);
    }
}
