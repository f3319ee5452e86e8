use crate::error::{AdmissionError, AdmissionResult};
use crate::models::{
    AdmissionBatch, MATH_SCORE_COLUMN, READING_SCORE_COLUMN, WRITING_SCORE_COLUMN,
};
use chrono::{Datelike, NaiveDate};
use csv::Writer;
use rust_xlsxwriter::{Format, Url, Workbook};
use std::path::{Component, Path, PathBuf};
use tracing::info;

pub const TOTAL_SCORE_HEADER: &str = "total score";
pub const NAME_HEADER: &str = "name";
pub const LETTER_PATH_HEADER: &str = "letter path";
pub const LINK_HEADER: &str = "Welcome Letter";
pub const LINK_TEXT: &str = "Open Letter";

const SHEET_NAME: &str = "Admitted Students";
const MAX_COLUMN_WIDTH: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// Everything except the hyperlink column
    pub cells: Vec<String>,
    pub letter_path: PathBuf,
}

/// Cell layout of the admission list before it is written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSheet {
    pub headers: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub column_widths: Vec<f64>,
    /// Score columns and the total; everything else is written as text
    pub numeric_columns: Vec<usize>,
}

impl ReportSheet {
    pub fn from_batch(batch: &AdmissionBatch) -> AdmissionResult<Self> {
        let mut numeric_columns: Vec<usize> = batch
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| {
                [MATH_SCORE_COLUMN, READING_SCORE_COLUMN, WRITING_SCORE_COLUMN].contains(&h.as_str())
            })
            .map(|(col, _)| col)
            .collect();
        numeric_columns.push(batch.headers.len());

        let mut headers = batch.headers.clone();
        headers.extend(
            [TOTAL_SCORE_HEADER, NAME_HEADER, LETTER_PATH_HEADER, LINK_HEADER]
                .iter()
                .map(|h| h.to_string()),
        );

        let mut rows = Vec::with_capacity(batch.len());
        for student in &batch.students {
            let letter_path = student.letter_path.clone().ok_or_else(|| {
                AdmissionError::Report(format!("row {} has no letter", student.row))
            })?;
            let mut cells = student.fields.clone();
            cells.push(student.total_score.to_string());
            cells.push(student.name.clone().unwrap_or_default());
            cells.push(letter_path.display().to_string());
            rows.push(ReportRow { cells, letter_path });
        }

        let column_widths = column_widths(&headers, &rows);
        Ok(Self {
            headers,
            rows,
            column_widths,
            numeric_columns,
        })
    }

    pub fn link_column(&self) -> usize {
        self.headers.len() - 1
    }

    pub fn is_numeric(&self, col: usize) -> bool {
        self.numeric_columns.contains(&col)
    }
}

/// Longest value per column, plus two characters of padding
fn column_widths(headers: &[String], rows: &[ReportRow]) -> Vec<f64> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    let link_col = widths.len() - 1;
    for row in rows {
        for (col, cell) in row.cells.iter().enumerate() {
            if let Some(width) = widths.get_mut(col) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths[link_col] = widths[link_col].max(LINK_TEXT.chars().count());
    }
    widths
        .into_iter()
        .map(|w| (w + 2).min(MAX_COLUMN_WIDTH) as f64)
        .collect()
}

pub fn report_file_name(today: NaiveDate, extension: &str) -> String {
    format!("admitted_students_{}.{}", today.year(), extension)
}

fn absolute(path: &Path) -> AdmissionResult<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| AdmissionError::io(path, err))?
            .join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// `file:///` link to `letter` as seen from the folder holding the workbook.
/// Excel resolves a driveless `file:///` target against the workbook, so the
/// path is written relative to it.
fn letter_link(workbook_dir: &Path, letter: &Path) -> AdmissionResult<String> {
    let from = absolute(workbook_dir)?;
    let to = absolute(letter)?;
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    if common == 0 {
        // different drives: keep the absolute form
        let full: PathBuf = to.iter().collect();
        let full = full.display().to_string().replace('\\', "/");
        return Ok(format!("file:///{}", full.trim_start_matches('/')));
    }

    let mut parts = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    Ok(format!("file:///{}", parts.join("/")))
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Writes `admitted_students_{year}.xlsx`, replacing any list from earlier in the same year.
    pub fn write_xlsx(&self, sheet: &ReportSheet, today: NaiveDate) -> AdmissionResult<PathBuf> {
        let path = self.output_dir.join(report_file_name(today, "xlsx"));
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let link_col = sheet.link_column() as u16;

        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        for (col, header) in sheet.headers.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        }

        for (i, row) in sheet.rows.iter().enumerate() {
            let row_num = (i + 1) as u32;
            for (col, cell) in row.cells.iter().enumerate() {
                match cell.parse::<f64>() {
                    Ok(number) if sheet.is_numeric(col) && number.is_finite() => {
                        worksheet.write_number(row_num, col as u16, number)?
                    }
                    _ => worksheet.write_string(row_num, col as u16, cell)?,
                };
            }
            let url = Url::new(letter_link(&self.output_dir, &row.letter_path)?);
            worksheet.write_url_with_text(row_num, link_col, url, LINK_TEXT)?;
        }

        for (col, width) in sheet.column_widths.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }

        workbook.save(&path)?;
        info!(path = %path.display(), rows = sheet.rows.len(), "admitted students saved");
        Ok(path)
    }

    /// Plain CSV copy of the list, without the hyperlink column.
    pub fn write_csv(&self, sheet: &ReportSheet, today: NaiveDate) -> AdmissionResult<PathBuf> {
        let path = self.output_dir.join(report_file_name(today, "csv"));
        let mut writer = Writer::from_path(&path)?;

        writer.write_record(&sheet.headers[..sheet.link_column()])?;
        for row in &sheet.rows {
            writer.write_record(&row.cells)?;
        }
        writer.flush().map_err(|err| AdmissionError::io(&path, err))?;

        info!(path = %path.display(), "admission list csv saved");
        Ok(path)
    }
}
