//! Styled spreadsheet output.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use tracing::info;

use crate::error::PipelineError;
use crate::normalize::{CleanRecord, PLACEHOLDER};

const COLUMNS: [&str; 3] = ["Name", "Tags", "Biography"];
const TAG_DELIMITER: &str = "; ";
const COL_PADDING: usize = 2;
const MAX_COL_WIDTH: f64 = 60.0;

const HEADER_BG: Color = Color::RGB(0x1F4E78);
const HEADER_FG: Color = Color::White;
const ALT_ROW_BG: Color = Color::RGB(0xF5F5F5);
const PLACEHOLDER_FG: Color = Color::RGB(0x808080);

/// Visual formatting for the whole report, built once per run and passed in
/// rather than read from globals.
#[derive(Debug, Clone)]
pub struct StyleSpec {
    pub header_bg: Color,
    pub header_fg: Color,
    pub alt_row_bg: Color,
    pub placeholder_fg: Color,
    pub autofit_columns: bool,
    pub freeze_header: bool,
    pub auto_filter: bool,
    pub source_url: String,
}

impl StyleSpec {
    pub fn for_source(url: &str) -> Self {
        Self {
            header_bg: HEADER_BG,
            header_fg: HEADER_FG,
            alt_row_bg: ALT_ROW_BG,
            placeholder_fg: PLACEHOLDER_FG,
            autofit_columns: true,
            freeze_header: true,
            auto_filter: true,
            source_url: url.to_string(),
        }
    }
}

/// Write the styled report, atomically replacing `path`.
///
/// The workbook is saved to a sibling temp file and renamed into place, so
/// a failed run never leaves a partial file at the target path.
pub fn write_report(
    records: &[CleanRecord],
    style: &StyleSpec,
    path: &Path,
) -> Result<(), PipelineError> {
    let tmp = tmp_path(path);
    let result = build_workbook(records, style)
        .and_then(|mut workbook| workbook.save(&tmp).context("failed to save workbook"))
        .and_then(|_| std::fs::rename(&tmp, path).context("failed to move report into place"));

    if let Err(cause) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::Write {
            path: path.to_path_buf(),
            cause,
        });
    }

    info!("Wrote {} data rows to {}", records.len(), path.display());
    Ok(())
}

fn build_workbook(records: &[CleanRecord], style: &StyleSpec) -> anyhow::Result<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(style.header_fg)
        .set_background_color(style.header_bg)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    let base = Format::new().set_border(FormatBorder::Medium);
    let alt = base.clone().set_background_color(style.alt_row_bg);
    let muted = base.clone().set_italic().set_font_color(style.placeholder_fg);
    let alt_muted = alt.clone().set_italic().set_font_color(style.placeholder_fg);
    let footer_format = Format::new().set_italic().set_font_color(style.placeholder_fg);

    for (col, title) in COLUMNS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *title, &header_format)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = (index + 1) as u32;
        let shaded = row_is_shaded(index);
        let cells = [
            record.name.clone(),
            display_tags(&record.tags),
            record.biography.clone(),
        ];
        for (col, cell) in cells.iter().enumerate() {
            let format = cell_format(shaded, cell, &base, &alt, &muted, &alt_muted);
            worksheet.write_string_with_format(row, col as u16, cell.as_str(), format)?;
        }
    }

    let last_data_row = records.len() as u32;
    if style.auto_filter {
        // Header + data only; the footer stays outside the filter range.
        worksheet.autofilter(0, 0, last_data_row, (COLUMNS.len() - 1) as u16)?;
    }
    if style.freeze_header {
        worksheet.set_freeze_panes(1, 0)?;
    }
    if style.autofit_columns {
        for (col, width) in column_widths(records).iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }
    }

    // Blank spacer row, then the metadata block.
    let footer_row = last_data_row + 2;
    worksheet.write_string_with_format(
        footer_row,
        0,
        &format!("Sourced from: {}", style.source_url),
        &footer_format,
    )?;
    worksheet.write_string_with_format(
        footer_row + 1,
        0,
        &format!("Generated on: {}", timestamp()),
        &footer_format,
    )?;

    Ok(workbook)
}

/// 1-indexed data rows 2, 4, ... carry the alternate fill; 3, 5, ... are plain.
fn row_is_shaded(data_index: usize) -> bool {
    data_index % 2 == 0
}

fn display_tags(tags: &[String]) -> String {
    tags.join(TAG_DELIMITER)
}

/// Each column sized to its longest cell plus padding, capped so long
/// biographies don't blow the sheet out.
fn column_widths(records: &[CleanRecord]) -> [f64; COLUMNS.len()] {
    let mut longest = [0usize; COLUMNS.len()];
    for (col, title) in COLUMNS.iter().enumerate() {
        longest[col] = title.chars().count();
    }
    for record in records {
        let cells = [
            record.name.clone(),
            display_tags(&record.tags),
            record.biography.clone(),
        ];
        for (col, cell) in cells.iter().enumerate() {
            longest[col] = longest[col].max(cell.chars().count());
        }
    }
    longest.map(|len| ((len + COL_PADDING) as f64).min(MAX_COL_WIDTH))
}

fn cell_format<'a>(
    shaded: bool,
    cell: &str,
    base: &'a Format,
    alt: &'a Format,
    muted: &'a Format,
    alt_muted: &'a Format,
) -> &'a Format {
    match (shaded, cell == PLACEHOLDER) {
        (true, true) => alt_muted,
        (true, false) => alt,
        (false, true) => muted,
        (false, false) => base,
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report.xlsx".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(position: usize, name: &str, tags: &[&str], bio: &str) -> CleanRecord {
        CleanRecord {
            position,
            name: name.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            biography: bio.to_string(),
        }
    }

    #[test]
    fn shading_alternates_by_row_parity() {
        // Five data rows land on worksheet rows 2-6 (1-indexed): 2 and 4
        // share the fill, 3 and 5 are plain.
        assert!(row_is_shaded(0));
        assert!(!row_is_shaded(1));
        assert!(row_is_shaded(2));
        assert!(!row_is_shaded(3));
        assert!(row_is_shaded(4));
    }

    #[test]
    fn tags_joined_for_display() {
        let tags = vec!["Tarot".to_string(), "Reiki".to_string()];
        assert_eq!(display_tags(&tags), "Tarot; Reiki");
    }

    #[test]
    fn empty_tag_list_displays_empty() {
        assert_eq!(display_tags(&[]), "");
    }

    #[test]
    fn column_widths_track_content_with_a_cap() {
        let long_bio = "x".repeat(200);
        let records = vec![record(0, "Jane Doe", &["Health"], &long_bio)];
        let widths = column_widths(&records);
        assert_eq!(widths[0], 10.0); // "Jane Doe" + padding
        assert_eq!(widths[1], 8.0); // "Health" + padding
        assert_eq!(widths[2], MAX_COL_WIDTH);
    }

    #[test]
    fn column_widths_never_drop_below_titles() {
        let widths = column_widths(&[]);
        assert_eq!(widths[2], ("Biography".len() + COL_PADDING) as f64);
    }

    #[test]
    fn placeholder_cells_get_muted_formats() {
        let base = Format::new();
        let alt = Format::new();
        let muted = Format::new();
        let alt_muted = Format::new();

        assert!(std::ptr::eq(
            cell_format(false, PLACEHOLDER, &base, &alt, &muted, &alt_muted),
            &muted
        ));
        assert!(std::ptr::eq(
            cell_format(true, PLACEHOLDER, &base, &alt, &muted, &alt_muted),
            &alt_muted
        ));
        assert!(std::ptr::eq(
            cell_format(false, "Jane Doe", &base, &alt, &muted, &alt_muted),
            &base
        ));
        assert!(std::ptr::eq(
            cell_format(true, "Jane Doe", &base, &alt, &muted, &alt_muted),
            &alt
        ));
    }

    #[test]
    fn writes_file_and_cleans_up_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experts.xlsx");
        let records = vec![
            record(0, "Jane Doe", &["Health"], "A bio."),
            record(1, "N/A", &[], "N/A"),
        ];

        write_report(&records, &StyleSpec::for_source("https://example.org"), &path).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn empty_dataset_still_writes_header_and_footer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.xlsx");

        write_report(&[], &StyleSpec::for_source("https://example.org"), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unwritable_path_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("experts.xlsx");

        let err = write_report(&[], &StyleSpec::for_source("https://example.org"), &path)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Write { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn tmp_path_is_a_sibling() {
        let tmp = tmp_path(Path::new("/out/experts.xlsx"));
        assert_eq!(tmp, Path::new("/out/experts.xlsx.tmp"));
    }

    #[test]
    fn fixture_page_end_to_end() {
        let html = std::fs::read_to_string("tests/fixtures/experts.html").unwrap();
        let raw = crate::extract::extract_records(&html).unwrap();
        let records = crate::normalize::normalize(raw);

        // Five cards on the page, the second a duplicate of the first.
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].name, "Jane Doe");
        assert_eq!(records[0].tags, ["Health", "Meditation"]);
        assert_eq!(records[0].biography, "Jane teaches mindfulness and breathwork.");
        assert_eq!(records[1].name, PLACEHOLDER);
        assert_eq!(records[1].tags, ["Astrology"]);
        assert_eq!(records[2].name, "Omar Haddad");
        assert!(records[2].tags.is_empty());
        assert_eq!(records[3].name, "Mei Lin");
        assert_eq!(records[3].tags, ["Sound Healing"]);
        assert_eq!(records[3].biography, PLACEHOLDER);
        let positions: Vec<_> = records.iter().map(|r| r.position).collect();
        assert_eq!(positions, [0, 1, 2, 3]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experts.xlsx");
        write_report(&records, &StyleSpec::for_source("https://example.org/experts"), &path)
            .unwrap();
        assert!(path.exists());
    }
}
