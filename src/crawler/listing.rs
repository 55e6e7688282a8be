//! Listing-page row extraction
//!
//! A listing page is an HTML table with one directory record per row. Each
//! output column is located by trying, in order, the header name and then
//! a fixed position, so reordered or partially labelled tables still parse.

use crate::config::DirectoryConfig;
use crate::crawler::parser::element_text;
use crate::model::{FieldMap, WorkItem};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// Rows with fewer cells than this are not records
const MIN_CELLS: usize = 5;

/// Text some directory tables append to sortable header labels
const SORT_HINT: &str = "Sort results by this header";

/// An output field and where to find it in a row
#[derive(Debug, Clone, Copy)]
struct Column {
    field: &'static str,
    header: &'static str,
    position: usize,
}

const COLUMNS: &[Column] = &[
    Column { field: "cds_code", header: "CDS Code", position: 0 },
    Column { field: "county", header: "County", position: 1 },
    Column { field: "district", header: "District", position: 2 },
    Column { field: "school", header: "School", position: 3 },
    Column { field: "school_type", header: "School Type", position: 4 },
    Column { field: "sector_type", header: "Sector Type", position: 5 },
    Column { field: "charter", header: "Charter", position: 6 },
    Column { field: "status", header: "Status", position: 7 },
];

const SCHOOL: usize = 3;

/// A way of finding a column's cell within a row
type CellLocator = for<'a> fn(&Column, &HashMap<String, usize>, &[ElementRef<'a>]) -> Option<ElementRef<'a>>;

fn by_header<'a>(
    column: &Column,
    headers: &HashMap<String, usize>,
    cells: &[ElementRef<'a>],
) -> Option<ElementRef<'a>> {
    headers.get(column.header).and_then(|&i| cells.get(i)).copied()
}

fn by_position<'a>(
    column: &Column,
    _headers: &HashMap<String, usize>,
    cells: &[ElementRef<'a>],
) -> Option<ElementRef<'a>> {
    cells.get(column.position).copied()
}

/// Locators tried in order; the first that finds a cell wins
const LOCATORS: &[CellLocator] = &[by_header, by_position];

fn locate<'a>(
    column: &Column,
    headers: &HashMap<String, usize>,
    cells: &[ElementRef<'a>],
) -> Option<ElementRef<'a>> {
    LOCATORS.iter().find_map(|locator| locator(column, headers, cells))
}

/// Parses the first table of a listing page into work items
///
/// Each item's identity is its CDS code, or its details URL when the code
/// cell is empty. The details URL comes from the first link in the school
/// cell, resolved against `page_url`; rows without one get a URL built from
/// the configured details template. Rows that cannot yield an identity or a
/// valid URL are skipped with a warning.
///
/// # Arguments
///
/// * `html` - The listing page content
/// * `page_url` - The URL the listing page was fetched from
/// * `directory` - Directory settings providing the details URL template
pub fn parse_listing_page(html: &str, page_url: &Url, directory: &DirectoryConfig) -> Vec<WorkItem> {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(tr_sel), Ok(td_sel), Ok(link_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td"),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_sel).next() else {
        debug!("No table on listing page {}", page_url);
        return Vec::new();
    };

    let headers = header_index(table);
    let mut items = Vec::new();

    for (row_number, row) in table.select(&tr_sel).enumerate() {
        let cells: Vec<ElementRef> = row.select(&td_sel).collect();
        if cells.is_empty() {
            continue;
        }
        if cells.len() < MIN_CELLS {
            warn!(
                "Skipping row {} on {}: {} cells, expected at least {}",
                row_number,
                page_url,
                cells.len(),
                MIN_CELLS
            );
            continue;
        }

        let mut fields = FieldMap::new();
        for column in COLUMNS {
            let text = locate(column, &headers, &cells)
                .map(element_text)
                .unwrap_or_default();
            fields.set(column.field, text);
        }

        let school_link = locate(&COLUMNS[SCHOOL], &headers, &cells)
            .and_then(|cell| cell.select(&link_sel).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok());

        let cds_code = fields.get("cds_code").unwrap_or_default().to_string();
        let details_url = match school_link {
            Some(url) => url,
            None if !cds_code.is_empty() => {
                match Url::parse(&directory.details_page_url(&cds_code)) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("Skipping row {} on {}: bad details URL: {}", row_number, page_url, e);
                        continue;
                    }
                }
            }
            None => {
                warn!("Skipping row {} on {}: no code and no details link", row_number, page_url);
                continue;
            }
        };

        fields.set("details_url", details_url.as_str());
        let identity = if cds_code.is_empty() {
            details_url.to_string()
        } else {
            cds_code
        };
        items.push(WorkItem::new(identity, details_url, fields));
    }

    items
}

/// Maps cleaned header labels to their column index
fn header_index(table: ElementRef<'_>) -> HashMap<String, usize> {
    let Ok(th_sel) = Selector::parse("thead th") else {
        return HashMap::new();
    };
    let mut headers: Vec<ElementRef> = table.select(&th_sel).collect();
    if headers.is_empty() {
        if let (Ok(tr_sel), Ok(th_only)) = (Selector::parse("tr"), Selector::parse("th")) {
            if let Some(first_row) = table.select(&tr_sel).next() {
                headers = first_row.select(&th_only).collect();
            }
        }
    }

    headers
        .into_iter()
        .enumerate()
        .map(|(i, th)| (element_text(th).replace(SORT_HINT, "").trim().to_string(), i))
        .collect()
}
