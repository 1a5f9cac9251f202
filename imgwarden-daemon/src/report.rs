//! Findings report rendering.
//!
//! One row per collected finding, in collection order, with the owning
//! team looked up from the repository's owner tag. Rendered as an aligned
//! text table or as CSV, to stdout or to a file.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use imgwarden_core::config::ReportConfig;
use imgwarden_core::types::{Finding, Inventory};

/// Report column headers.
pub const HEADERS: [&str; 9] = [
    "#",
    "Title",
    "Severity",
    "Fix Available",
    "Remediation",
    "Package Manager",
    "Repository",
    "Image Tag",
    "Owners",
];

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Table,
    Csv,
}

impl ReportFormat {
    /// Parse a format name; unknown names fall back to the table.
    pub fn from_str_loose(s: &str) -> Self {
        if s.eq_ignore_ascii_case("csv") {
            Self::Csv
        } else {
            Self::Table
        }
    }
}

/// A single report row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub index: usize,
    pub title: String,
    pub severity: String,
    pub fix_available: String,
    pub remediation: String,
    pub package_manager: String,
    pub repository: String,
    pub image_tag: String,
    pub owners: String,
}

impl ReportRow {
    fn fields(&self) -> [String; 9] {
        [
            self.index.to_string(),
            self.title.clone(),
            self.severity.clone(),
            self.fix_available.clone(),
            self.remediation.clone(),
            self.package_manager.clone(),
            self.repository.clone(),
            self.image_tag.clone(),
            self.owners.clone(),
        ]
    }
}

/// Build report rows. Rows are numbered from zero.
pub fn build_rows(findings: &[Finding], inventory: &Inventory, owner_tag_key: &str) -> Vec<ReportRow> {
    findings
        .iter()
        .enumerate()
        .map(|(index, f)| ReportRow {
            index,
            title: f.title.clone(),
            severity: f.severity.clone(),
            fix_available: f.fix_available.clone(),
            remediation: f.remediation.clone(),
            package_manager: f.package_manager.clone(),
            repository: f.repository.clone(),
            image_tag: f.image_tag.clone(),
            owners: inventory.owner_of(&f.repository, owner_tag_key).to_owned(),
        })
        .collect()
}

/// Render rows in the given format.
pub fn render<W: Write>(rows: &[ReportRow], format: ReportFormat, out: W) -> Result<()> {
    match format {
        ReportFormat::Table => render_table(rows, out),
        ReportFormat::Csv => render_csv(rows, out),
    }
}

fn render_csv<W: Write>(rows: &[ReportRow], out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(HEADERS)?;
    for row in rows {
        wtr.write_record(row.fields())?;
    }
    wtr.flush()?;
    Ok(())
}

fn render_table<W: Write>(rows: &[ReportRow], mut out: W) -> Result<()> {
    let cells: Vec<[String; 9]> = rows.iter().map(ReportRow::fields).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let border = format!("+{border}+");

    let write_line = |out: &mut W, fields: &[&str]| -> io::Result<()> {
        write!(out, "|")?;
        for (field, width) in fields.iter().zip(&widths) {
            let pad = width - field.chars().count();
            write!(out, " {field}{} |", " ".repeat(pad))?;
        }
        writeln!(out)
    };

    writeln!(out, "{border}")?;
    write_line(&mut out, &HEADERS[..])?;
    writeln!(out, "{border}")?;
    for row in &cells {
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        write_line(&mut out, &fields)?;
    }
    writeln!(out, "{border}")?;
    out.flush()?;
    Ok(())
}

/// Write the report to the configured destination.
///
/// `"stdout"` writes to standard output; anything else is a file path that
/// is created or truncated.
pub fn write_report(
    findings: &[Finding],
    inventory: &Inventory,
    owner_tag_key: &str,
    config: &ReportConfig,
) -> Result<()> {
    let rows = build_rows(findings, inventory, owner_tag_key);
    let format = ReportFormat::from_str_loose(&config.format);

    if config.output == "stdout" {
        let stdout = io::stdout();
        render(&rows, format, stdout.lock())?;
    } else {
        let path = Path::new(&config.output);
        let file = File::create(path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        render(&rows, format, BufWriter::new(file))?;
    }

    tracing::info!(
        rows = rows.len(),
        output = %config.output,
        format = ?format,
        "report written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use imgwarden_core::types::RepositoryRecord;

    use super::*;

    fn finding(title: &str, repository: &str) -> Finding {
        Finding {
            title: title.to_owned(),
            severity: "CRITICAL".to_owned(),
            fix_available: "YES".to_owned(),
            remediation: "Upgrade, to 1.2.3".to_owned(),
            package_manager: "NPM".to_owned(),
            repository: repository.to_owned(),
            image_tag: "v1".to_owned(),
        }
    }

    fn inventory() -> Inventory {
        Inventory::new(vec![
            RepositoryRecord::new("payments", "arn:payments").with_tag("Team", "core"),
        ])
    }

    #[test]
    fn rows_carry_owner_and_index() {
        let rows = build_rows(
            &[finding("CVE-1", "payments"), finding("CVE-2", "unknown")],
            &inventory(),
            "Team",
        );
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[0].owners, "core");
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].owners, "");
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let rows = build_rows(&[finding("CVE-1", "payments")], &inventory(), "Team");
        let mut buf = Vec::new();
        render(&rows, ReportFormat::Csv, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("#,Title,Severity,Fix Available,Remediation,Package Manager,Repository,Image Tag,Owners")
        );
        assert_eq!(
            lines.next(),
            Some("0,CVE-1,CRITICAL,YES,\"Upgrade, to 1.2.3\",NPM,payments,v1,core")
        );
    }

    #[test]
    fn table_columns_are_aligned() {
        let rows = build_rows(
            &[finding("CVE-2024-21538", "payments"), finding("X", "payments")],
            &inventory(),
            "Team",
        );
        let mut buf = Vec::new();
        render(&rows, ReportFormat::Table, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("Fix Available"));
        let width = lines[0].len();
        assert!(lines.iter().all(|l| l.len() == width));
    }

    #[test]
    fn empty_report_has_header_only() {
        let mut buf = Vec::new();
        render(&[], ReportFormat::Table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn unknown_format_falls_back_to_table() {
        assert_eq!(ReportFormat::from_str_loose("CSV"), ReportFormat::Csv);
        assert_eq!(ReportFormat::from_str_loose("json"), ReportFormat::Table);
    }
}
