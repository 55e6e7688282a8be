//! Details-page field extraction
//!
//! A details page lays out one record as label/value pairs spread over
//! several tables and definition lists. Extraction runs an ordered list of
//! strategies over the document; every strategy writes through
//! [`FieldMap::insert_first_wins`], so the first value seen for a
//! normalized label is kept and later duplicates are dropped.

use crate::crawler::parser::element_text;
use crate::model::FieldMap;
use scraper::{ElementRef, Html, Selector};

/// Labels longer than this in a plain two-cell row are assumed to be
/// prose or a header row rather than a field name
const MAX_LABEL_LEN: usize = 80;

/// Normalizes a field label into a key
///
/// Lowercases, trims surrounding spaces and colons, spells out `&` as
/// `and`, turns `/` into `_`, drops remaining punctuation, and collapses
/// runs of whitespace, hyphens and underscores into a single `_`.
///
/// # Examples
///
/// ```
/// use sumi_harvest::crawler::normalize_key;
///
/// assert_eq!(normalize_key("  Administrator Phone:  "), "administrator_phone");
/// assert_eq!(normalize_key("Grades (Low-High)"), "grades_low_high");
/// assert_eq!(normalize_key("Mailing City/State"), "mailing_city_state");
/// ```
pub fn normalize_key(label: &str) -> String {
    let trimmed = label.trim_matches(|c: char| c.is_whitespace() || c == ':');

    let mut key = String::with_capacity(trimmed.len());
    let mut pending_separator = false;
    for c in trimmed.to_lowercase().replace('&', " and ").chars() {
        if c.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' || c == '/' {
            pending_separator = true;
        }
    }
    key
}

/// One way of pulling fields out of a details page
pub trait FieldStrategy: Send + Sync {
    /// Short name used in debug logs
    fn name(&self) -> &'static str;

    /// Adds every field this strategy finds to `fields`, first-wins
    fn extract(&self, document: &Html, fields: &mut FieldMap);
}

/// Captures the first `mailto:` link on the page as `email`
#[derive(Debug, Default)]
pub struct MailtoStrategy;

impl FieldStrategy for MailtoStrategy {
    fn name(&self) -> &'static str {
        "mailto"
    }

    fn extract(&self, document: &Html, fields: &mut FieldMap) {
        let Ok(selector) = Selector::parse(r#"a[href^="mailto:"]"#) else {
            return;
        };
        let address = document
            .select(&selector)
            .filter_map(|a| a.value().attr("href"))
            .map(|href| {
                let address = href.trim_start_matches("mailto:");
                address.split('?').next().unwrap_or(address).trim()
            })
            .find(|address| !address.is_empty());

        if let Some(address) = address {
            fields.insert_first_wins("email", address);
        }
    }
}

/// Reads one table row as a label/value pair
pub trait RowStrategy: Send + Sync {
    /// Returns `(normalized key, value)` if the row has this shape
    fn label_value(&self, row: ElementRef<'_>) -> Option<(String, String)>;
}

/// `<tr><th>Label</th><td>Value</td></tr>`
#[derive(Debug, Default)]
pub struct HeaderCellRow;

impl RowStrategy for HeaderCellRow {
    fn label_value(&self, row: ElementRef<'_>) -> Option<(String, String)> {
        let th = Selector::parse("th").ok()?;
        let td = Selector::parse("td").ok()?;

        let label = row.select(&th).next()?;
        let value = row.select(&td).next()?;
        Some((normalize_key(&element_text(label)), element_text(value)))
    }
}

/// `<tr><td>Label</td><td>Value</td>...</tr>` with a short label
#[derive(Debug, Default)]
pub struct CellPairRow;

impl RowStrategy for CellPairRow {
    fn label_value(&self, row: ElementRef<'_>) -> Option<(String, String)> {
        let td = Selector::parse("td").ok()?;

        let mut cells = row.select(&td);
        let key = normalize_key(&element_text(cells.next()?));
        let value = element_text(cells.next()?);
        if key.chars().count() > MAX_LABEL_LEN {
            return None;
        }
        Some((key, value))
    }
}

/// Scans every table row, trying each row strategy in order
pub struct TableStrategy {
    rows: Vec<Box<dyn RowStrategy>>,
}

impl Default for TableStrategy {
    fn default() -> Self {
        Self {
            rows: vec![Box::new(HeaderCellRow), Box::new(CellPairRow)],
        }
    }
}

impl FieldStrategy for TableStrategy {
    fn name(&self) -> &'static str {
        "table"
    }

    fn extract(&self, document: &Html, fields: &mut FieldMap) {
        let Ok(tr) = Selector::parse("table tr") else {
            return;
        };
        for row in document.select(&tr) {
            if let Some((key, value)) = self.rows.iter().find_map(|s| s.label_value(row)) {
                if !key.is_empty() && !value.is_empty() {
                    fields.insert_first_wins(key, value);
                }
            }
        }
    }
}

/// Pairs `<dt>` and `<dd>` elements of every definition list by position
#[derive(Debug, Default)]
pub struct DefinitionListStrategy;

impl FieldStrategy for DefinitionListStrategy {
    fn name(&self) -> &'static str {
        "definition-list"
    }

    fn extract(&self, document: &Html, fields: &mut FieldMap) {
        let (Ok(dl), Ok(dt), Ok(dd)) = (
            Selector::parse("dl"),
            Selector::parse("dt"),
            Selector::parse("dd"),
        ) else {
            return;
        };

        for list in document.select(&dl) {
            for (term, definition) in list.select(&dt).zip(list.select(&dd)) {
                let key = normalize_key(&element_text(term));
                let value = element_text(definition);
                if !key.is_empty() && !value.is_empty() {
                    fields.insert_first_wins(key, value);
                }
            }
        }
    }
}

/// Runs the field strategies over a details page in priority order
pub struct DetailsParser {
    strategies: Vec<Box<dyn FieldStrategy>>,
}

impl Default for DetailsParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(MailtoStrategy),
            Box::new(TableStrategy::default()),
            Box::new(DefinitionListStrategy),
        ])
    }
}

impl DetailsParser {
    pub fn new(strategies: Vec<Box<dyn FieldStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn parse(&self, html: &str) -> FieldMap {
        let document = Html::parse_document(html);
        let mut fields = FieldMap::new();
        for strategy in &self.strategies {
            let before = fields.len();
            strategy.extract(&document, &mut fields);
            tracing::trace!(
                "{} strategy added {} fields",
                strategy.name(),
                fields.len() - before
            );
        }
        fields
    }
}

/// Extracts label/value fields from a details page with the default strategies
pub fn parse_details_page(html: &str) -> FieldMap {
    DetailsParser::default().parse(html)
}
