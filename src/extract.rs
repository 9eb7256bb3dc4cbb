//! Profile extraction from the rendered listing DOM.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::PipelineError;

/// Container element holding one expert profile. Also used as the render
/// wait condition, since the listing is injected dynamically.
pub const PROFILE_SELECTOR: &str = "div.views-row";

static PROFILE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(PROFILE_SELECTOR).unwrap());
static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3 a").unwrap());
static TAG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul li").unwrap());
static BIO_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.field-content").unwrap());

/// One profile block as found on the page, fields untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 0-based index in page order.
    pub position: usize,
    pub name: Option<String>,
    pub tags: Vec<String>,
    pub biography: Option<String>,
}

/// Pull one `RawRecord` per profile container, in document order.
///
/// Page order is meaningful and preserved verbatim. Missing sub-fields are
/// `None` or empty, never an error; a page with no recognizable containers
/// at all is fatal, since partial extraction would silently under-report.
pub fn extract_records(html: &str) -> Result<Vec<RawRecord>, PipelineError> {
    let document = Html::parse_document(html);

    let records: Vec<RawRecord> = document
        .select(&PROFILE_SEL)
        .enumerate()
        .map(|(position, node)| RawRecord {
            position,
            name: first_text(&node, &NAME_SEL),
            tags: node.select(&TAG_SEL).map(|li| text_of(&li)).collect(),
            biography: first_text(&node, &BIO_SEL),
        })
        .collect();

    if records.is_empty() {
        return Err(PipelineError::Extraction(format!(
            "no profile containers matched {PROFILE_SELECTOR:?}"
        )));
    }

    Ok(records)
}

fn first_text(node: &ElementRef, selector: &Selector) -> Option<String> {
    node.select(selector).next().map(|el| text_of(&el))
}

/// All descendant text nodes joined with spaces. Whitespace cleanup belongs
/// to the normalizer.
fn text_of(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}
