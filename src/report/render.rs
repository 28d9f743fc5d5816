//! Text rendering of a comparison.
//!
//! Rendering is split in two: `render` builds styled lines without touching the
//! terminal, and a `ReportSink` presents them.

use std::io::Write;

use colored::Colorize;

use super::format::{human_value, truncate_left};
use super::regression::{ChangeKind, ComparisonRow};

/// Display width of the benchmark name column
pub const NAME_WIDTH: usize = 40;

pub const UNCHANGED_MESSAGE: &str = "BENCHMARKS NOT SIGNIFICANTLY CHANGED.";
pub const CHANGED_MESSAGE: &str = "SOME BENCHMARKS HAVE CHANGED SIGNIFICANTLY.";

/// Ordering of report rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowOrder {
    /// Strictly by ratio, largest first
    #[default]
    ByRatio,
    /// Slowdowns by ratio descending, then speedups by ratio ascending
    Grouped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Success,
    Failure,
    Header,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub style: LineStyle,
    pub text: String,
}

impl ReportLine {
    fn new(style: LineStyle, text: impl Into<String>) -> Self {
        ReportLine {
            style,
            text: text.into(),
        }
    }
}

/// Styled report lines plus the exit signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub lines: Vec<ReportLine>,
    pub regressed: bool,
}

impl RenderedReport {
    /// Uncolored report text, one line per entry.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    /// Process exit code: 1 when a regression was found.
    pub fn exit_code(&self) -> i32 {
        if self.regressed { 1 } else { 0 }
    }

    pub fn write_to(&self, sink: &mut dyn ReportSink) -> std::io::Result<()> {
        for line in &self.lines {
            sink.emit(line)?;
        }
        Ok(())
    }
}

/// Sort rows in place. `sort_by` is stable, so ties keep encounter order.
pub fn sort_rows(rows: &mut [ComparisonRow], order: RowOrder) {
    match order {
        RowOrder::ByRatio => rows.sort_by(|a, b| b.ratio.total_cmp(&a.ratio)),
        RowOrder::Grouped => rows.sort_by(|a, b| match (a.change, b.change) {
            (ChangeKind::Slower, ChangeKind::Faster) => std::cmp::Ordering::Less,
            (ChangeKind::Faster, ChangeKind::Slower) => std::cmp::Ordering::Greater,
            (ChangeKind::Slower, ChangeKind::Slower) => b.ratio.total_cmp(&a.ratio),
            (ChangeKind::Faster, ChangeKind::Faster) => a.ratio.total_cmp(&b.ratio),
        }),
    }
}

/// Rows sorted into a new vector.
pub fn sorted_rows(rows: &[ComparisonRow], order: RowOrder) -> Vec<ComparisonRow> {
    let mut sorted = rows.to_vec();
    sort_rows(&mut sorted, order);
    sorted
}

fn format_header() -> String {
    format!(
        "{:<width$}   {:>8}   {:>8}   {:>8}",
        "BENCHMARK",
        "BEFORE",
        "AFTER",
        "FACTOR",
        width = NAME_WIDTH
    )
}

fn format_row(row: &ComparisonRow) -> String {
    format!(
        "{:<width$}   {:>8}   {:>8}   {:.8}x",
        truncate_left(&row.name, NAME_WIDTH),
        human_value(row.before, &row.meta.unit),
        human_value(row.after, &row.meta.unit),
        row.ratio,
        width = NAME_WIDTH
    )
}

/// Build the report for a set of significant rows.
pub fn render(rows: &[ComparisonRow], regressed: bool, order: RowOrder) -> RenderedReport {
    let mut lines = vec![ReportLine::new(LineStyle::Plain, "")];

    if rows.is_empty() {
        lines.push(ReportLine::new(LineStyle::Success, UNCHANGED_MESSAGE));
        return RenderedReport {
            lines,
            regressed: false,
        };
    }

    let verdict_style = if regressed {
        LineStyle::Failure
    } else {
        LineStyle::Success
    };

    lines.push(ReportLine::new(verdict_style, CHANGED_MESSAGE));
    lines.push(ReportLine::new(LineStyle::Plain, ""));
    lines.push(ReportLine::new(LineStyle::Header, format_header()));
    for row in sorted_rows(rows, order) {
        lines.push(ReportLine::new(LineStyle::Plain, format_row(&row)));
    }
    lines.push(ReportLine::new(verdict_style, CHANGED_MESSAGE));

    RenderedReport { lines, regressed }
}

/// Destination of report lines.
pub trait ReportSink {
    fn emit(&mut self, line: &ReportLine) -> std::io::Result<()>;
}

/// Writes lines to a terminal, coloring them by style.
pub struct TerminalSink<W: Write> {
    out: W,
    color: bool,
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout(color: bool) -> Self {
        TerminalSink::new(std::io::stdout(), color)
    }
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        TerminalSink { out, color }
    }
}

impl<W: Write> ReportSink for TerminalSink<W> {
    fn emit(&mut self, line: &ReportLine) -> std::io::Result<()> {
        if !self.color {
            return writeln!(self.out, "{}", line.text);
        }
        match line.style {
            LineStyle::Success => writeln!(self.out, "{}", line.text.green()),
            LineStyle::Failure => writeln!(self.out, "{}", line.text.red()),
            LineStyle::Header => writeln!(self.out, "{}", line.text.blue()),
            LineStyle::Plain => writeln!(self.out, "{}", line.text),
        }
    }
}

/// Collects uncolored lines in memory.
#[derive(Debug, Default)]
pub struct PlainSink {
    pub lines: Vec<String>,
}

impl ReportSink for PlainSink {
    fn emit(&mut self, line: &ReportLine) -> std::io::Result<()> {
        self.lines.push(line.text.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::BenchmarkMeta;

    fn row(name: &str, before: f64, after: f64) -> ComparisonRow {
        let ratio = after / before;
        ComparisonRow {
            name: name.to_string(),
            before,
            after,
            ratio,
            change: if ratio > 1.0 {
                ChangeKind::Slower
            } else {
                ChangeKind::Faster
            },
            meta: BenchmarkMeta::new(name, "seconds"),
        }
    }

    fn names(rows: &[ComparisonRow]) -> Vec<&str> {
        rows.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_sort_by_ratio_descending() {
        let rows = vec![row("speedup", 1.0, 0.1), row("small", 1.0, 2.5), row("big", 1.0, 10.0)];
        let sorted = sorted_rows(&rows, RowOrder::ByRatio);
        assert_eq!(names(&sorted), vec!["big", "small", "speedup"]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let rows = vec![row("first", 1.0, 3.0), row("second", 2.0, 6.0), row("third", 1.0, 3.0)];
        let sorted = sorted_rows(&rows, RowOrder::ByRatio);
        assert_eq!(names(&sorted), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_grouped_order_puts_biggest_speedup_first_among_speedups() {
        let rows = vec![
            row("fast_a", 1.0, 0.4),
            row("slow_a", 1.0, 3.0),
            row("fast_b", 1.0, 0.1),
            row("slow_b", 1.0, 5.0),
        ];
        let sorted = sorted_rows(&rows, RowOrder::Grouped);
        assert_eq!(names(&sorted), vec!["slow_b", "slow_a", "fast_b", "fast_a"]);
    }

    #[test]
    fn test_render_empty_is_unchanged_success() {
        let report = render(&[], false, RowOrder::ByRatio);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.lines.last().unwrap().style, LineStyle::Success);
        assert!(report.text().contains(UNCHANGED_MESSAGE));
        assert!(!report.text().contains("BENCHMARK "));
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![row("bench.speedup", 1.0, 0.4), row("bench.slowdown", 1.0, 3.0)];
        let report = render(&rows, true, RowOrder::ByRatio);
        let text = report.text();

        assert_eq!(report.exit_code(), 1);
        assert_eq!(text.matches(CHANGED_MESSAGE).count(), 2);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], format_header());
        assert!(lines[4].starts_with("bench.slowdown"));
        assert!(lines[4].ends_with("3.00000000x"));
        assert!(lines[4].contains("      1s"));
        assert!(lines[4].contains("      3s"));
        assert!(lines[5].starts_with("bench.speedup"));
        assert!(lines[5].ends_with("0.40000000x"));
    }

    #[test]
    fn test_render_truncates_long_names() {
        let long = format!("{}.time_tail", "x".repeat(60));
        let report = render(&[row(&long, 1.0, 4.0)], true, RowOrder::ByRatio);
        let line = &report.lines[4].text;
        assert!(line.starts_with("..."));
        assert_eq!(&line[NAME_WIDTH - 10..NAME_WIDTH], ".time_tail");
    }

    #[test]
    fn test_speedups_only_keeps_success_exit() {
        let report = render(&[row("a", 1.0, 0.1)], false, RowOrder::ByRatio);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.lines[1].style, LineStyle::Success);
    }

    #[test]
    fn test_sinks() {
        let report = render(&[row("a", 1.0, 3.0)], true, RowOrder::ByRatio);

        let mut plain = PlainSink::default();
        report.write_to(&mut plain).unwrap();
        assert_eq!(plain.lines.len(), report.lines.len());

        let mut buf = Vec::new();
        report
            .write_to(&mut TerminalSink::new(&mut buf, false))
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), report.text());
    }
}
