use std::{
    fmt::Display,
    fs::File,
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::info;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::{
    data::{SummaryRecord, TrialRecord},
    load::LoadTier,
    stats::truncated_mean,
};

pub const RAW_SHEET: &str = "raw_data";
pub const SUMMARY_SHEET: &str = "summary";

pub const RAW_COLUMNS: &[&str] = &["app_name", "load_type", "round_#", "time(ms)"];
pub const SUMMARY_COLUMNS: &[&str] = &["app_name", "load_type", "avg_time(ms)"];

/// Rows per xlsx worksheet, header included.
pub const XLSX_MAX_ROWS: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Integer(u64),
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(text) => f.write_str(text),
            Cell::Integer(value) => write!(f, "{value}"),
        }
    }
}

/// A named sheet of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Table {
            name,
            columns,
            rows: Vec::new(),
        }
    }
}

/// Groups the recorded rounds by app and load tier.
///
/// Rounds without latency are ignored. Groups are ordered by their first
/// appearance in `records`.
pub fn summarize(records: &[TrialRecord]) -> Vec<SummaryRecord> {
    let present = records
        .iter()
        .filter_map(|r| r.latency_ms.map(|ms| ((r.app_name.as_str(), r.tier), ms)))
        .collect_vec();

    let groups = present.iter().copied().into_group_map();

    present
        .iter()
        .map(|(key, _)| *key)
        .unique()
        .filter_map(|key: (&str, LoadTier)| {
            let latencies = groups.get(&key)?;
            Some(SummaryRecord {
                app_name: key.0.to_owned(),
                tier: key.1,
                trials: latencies.len(),
                mean_ms: truncated_mean(latencies.iter().copied())?,
            })
        })
        .collect()
}

/// Builds the raw table with one row per recorded round and the summary table
/// with one row per app and load tier.
pub fn build_tables(records: &[TrialRecord]) -> (Table, Table) {
    let mut raw = Table::new(RAW_SHEET, RAW_COLUMNS);
    raw.rows = records
        .iter()
        .filter_map(|r| {
            r.latency_ms.map(|ms| {
                vec![
                    Cell::Text(r.app_name.clone()),
                    Cell::Text(r.tier.to_string()),
                    Cell::Integer(u64::from(r.round)),
                    Cell::Integer(ms),
                ]
            })
        })
        .collect();

    let mut summary = Table::new(SUMMARY_SHEET, SUMMARY_COLUMNS);
    summary.rows = summarize(records)
        .into_iter()
        .map(|s| {
            vec![
                Cell::Text(s.app_name),
                Cell::Text(s.tier.to_string()),
                Cell::Integer(s.mean_ms),
            ]
        })
        .collect();

    (raw, summary)
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Unsupported report format for '{}'. Use .xlsx, .csv, .tsv or '-'.", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Sheet '{sheet}' needs {rows} rows, an xlsx worksheet holds at most {XLSX_MAX_ROWS}. Use a .csv output instead.")]
    TooManyRows { sheet: &'static str, rows: usize },

    #[error("Failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("Failed to write report: {0}")]
    Io(#[from] io::Error),
}

trait Reporter {
    fn add_table(&mut self, table: &Table) -> Result<(), ReportError>;
    fn as_bytes(&mut self) -> Result<Vec<u8>, ReportError>;
}

/// Each table becomes one worksheet.
struct XlsxReporter {
    workbook: Workbook,
}

impl XlsxReporter {
    fn new() -> Self {
        XlsxReporter {
            workbook: Workbook::new(),
        }
    }
}

fn check_row_limit(table: &Table) -> Result<(), ReportError> {
    let rows = table.rows.len() + 1;
    if rows > XLSX_MAX_ROWS {
        return Err(ReportError::TooManyRows {
            sheet: table.name,
            rows,
        });
    }
    Ok(())
}

impl Reporter for XlsxReporter {
    fn add_table(&mut self, table: &Table) -> Result<(), ReportError> {
        check_row_limit(table)?;
        let header = Format::new().set_bold();
        let mut worksheet = Worksheet::new();
        worksheet.set_name(table.name)?;

        for (col, column) in table.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *column, &header)?;
        }
        for (row, cells) in table.rows.iter().enumerate() {
            let row = row as u32 + 1;
            for (col, cell) in cells.iter().enumerate() {
                match cell {
                    Cell::Text(text) => worksheet.write_string(row, col as u16, text)?,
                    Cell::Integer(value) => worksheet.write_number(row, col as u16, *value as f64)?,
                };
            }
        }
        worksheet.autofit();

        self.workbook.push_worksheet(worksheet);
        Ok(())
    }

    fn as_bytes(&mut self) -> Result<Vec<u8>, ReportError> {
        Ok(self.workbook.save_to_buffer()?)
    }
}

/// Tab-delimited sections, each headed by `# <table name>`, separated by an
/// empty line.
struct CsvReporter {
    sections: Vec<String>,
}

impl CsvReporter {
    fn new() -> Self {
        CsvReporter {
            sections: Vec::new(),
        }
    }
}

impl Reporter for CsvReporter {
    fn add_table(&mut self, table: &Table) -> Result<(), ReportError> {
        let mut lines = vec![format!("# {}", table.name), table.columns.join("\t")];
        lines.extend(table.rows.iter().map(|cells| cells.iter().join("\t")));
        self.sections.push(lines.join("\n") + "\n");
        Ok(())
    }

    fn as_bytes(&mut self) -> Result<Vec<u8>, ReportError> {
        Ok(self.sections.join("\n").into_bytes())
    }
}

struct ReporterFactory {}

impl ReporterFactory {
    fn from_file_name(path: &Path) -> Option<Box<dyn Reporter>> {
        if path == Path::new("-") {
            return Some(Box::new(CsvReporter::new()));
        }
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" => Some(Box::new(XlsxReporter::new())),
            "csv" | "tsv" => Some(Box::new(CsvReporter::new())),
            _ => None,
        }
    }
}

/// Writes the raw and summary tables of `records` to `output`. The format
/// follows the file extension, `-` writes tab-delimited text to stdout.
pub fn write_report(output: &Path, records: &[TrialRecord]) -> Result<(), ReportError> {
    let mut reporter =
        ReporterFactory::from_file_name(output).ok_or_else(|| ReportError::UnsupportedFormat {
            path: output.to_owned(),
        })?;

    let (raw, summary) = build_tables(records);
    reporter.add_table(&raw)?;
    reporter.add_table(&summary)?;
    let bytes = reporter.as_bytes()?;

    if output == Path::new("-") {
        match io::stdout().write_all(&bytes) {
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            res => res,
        }?;
    } else {
        File::create(output)?.write_all(&bytes)?;
        info!(
            "Wrote {} rows and {} group means to {}",
            raw.rows.len(),
            summary.rows.len(),
            output.display()
        );
    }

    Ok(())
}
