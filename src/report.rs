//! Per-table and global reconciliation report.

use crate::format::format_size;
use std::collections::BTreeMap;
use std::fmt;

/// One reconciled file within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub table: String,
    pub file: String,
    pub source_size: u64,
    /// Destination size at reconciliation time, `None` if absent.
    pub dest_size: Option<u64>,
    /// Seconds spent transferring the file, 0 when nothing moved.
    pub transfer_seconds: f64,
}

impl ReportLine {
    pub fn in_sync(&self) -> bool {
        self.dest_size == Some(self.source_size)
    }
}

/// Lines collected during one pass, keyed by table.
#[derive(Debug, Clone, Default)]
pub struct Report {
    tables: BTreeMap<String, Vec<ReportLine>>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `table` shows up in the report even if it has no files.
    pub fn touch(&mut self, table: &str) {
        self.tables.entry(table.to_string()).or_default();
    }

    pub fn record(&mut self, line: ReportLine) {
        self.tables.entry(line.table.clone()).or_default().push(line);
    }

    /// Lines recorded for `table`, empty if none.
    pub fn lines(&self, table: &str) -> &[ReportLine] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Folds the collected lines into totals.
    pub fn summary(&self) -> ReportSummary {
        let mut total = TableSummary::default();
        let tables = self
            .tables
            .iter()
            .map(|(name, lines)| {
                let summary = TableSummary::from_lines(name, lines);
                total.absorb(&summary);
                summary
            })
            .collect();
        total.table = "TOTAL".to_string();
        ReportSummary { tables, total }
    }
}

/// Totals for one table, or for the whole pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSummary {
    pub table: String,
    pub files: usize,
    pub source_bytes: u64,
    pub dest_bytes: u64,
    /// Files that are missing or have a different size at the destination.
    pub missing_files: Vec<String>,
    pub missing_bytes: u64,
    /// Files present at the destination, whatever their size.
    pub present_files: usize,
    pub transfer_seconds: f64,
}

impl TableSummary {
    fn from_lines(table: &str, lines: &[ReportLine]) -> Self {
        let mut summary = Self {
            table: table.to_string(),
            ..Self::default()
        };
        for line in lines {
            summary.files += 1;
            summary.source_bytes += line.source_size;
            summary.transfer_seconds += line.transfer_seconds;
            if let Some(dest) = line.dest_size {
                summary.dest_bytes += dest;
                summary.present_files += 1;
            }
            if !line.in_sync() {
                summary.missing_files.push(line.file.clone());
                summary.missing_bytes += line.source_size;
            }
        }
        summary
    }

    fn absorb(&mut self, other: &TableSummary) {
        self.files += other.files;
        self.source_bytes += other.source_bytes;
        self.dest_bytes += other.dest_bytes;
        self.missing_files.extend(
            other
                .missing_files
                .iter()
                .map(|file| format!("{}/{}", other.table, file)),
        );
        self.missing_bytes += other.missing_bytes;
        self.present_files += other.present_files;
        self.transfer_seconds += other.transfer_seconds;
    }

    pub fn missing_count(&self) -> usize {
        self.missing_files.len()
    }

    /// Whether every file is present with its source size.
    ///
    /// Zero-byte files contribute nothing to the byte totals, so the file
    /// list decides as well.
    pub fn in_sync(&self) -> bool {
        self.missing_files.is_empty()
            && self.missing_bytes == 0
            && self.source_bytes == self.dest_bytes
    }
}

impl fmt::Display for TableSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: source {} | destination {} ({}/{} files) | missing {} in {} files",
            self.table,
            format_size(self.source_bytes),
            format_size(self.dest_bytes),
            self.present_files,
            self.files,
            format_size(self.missing_bytes),
            self.missing_count()
        )?;
        if self.transfer_seconds > 0.0 {
            write!(f, " | transferred in {:.1}s", self.transfer_seconds)?;
        }
        Ok(())
    }
}

/// Result of folding a [`Report`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub tables: Vec<TableSummary>,
    pub total: TableSummary,
}

impl ReportSummary {
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Tables that still have something to move.
    pub fn out_of_sync(&self) -> impl Iterator<Item = &TableSummary> {
        self.tables.iter().filter(|t| !t.in_sync())
    }

    /// Multi-line rendering; fully synced tables are left out of the detail.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for table in self.out_of_sync() {
            out.push_str(&table.to_string());
            out.push('\n');
        }
        out.push_str(&self.total.to_string());
        out
    }
}

impl fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
