//! Rendering the coverage comparison as a `diff` code block.
//!
//! ```text
//! @@           Coverage Diff            @@
//! ##           master     #123     +/-  ##
//! ========================================
//! - Coverage   81.62%   79.16%  -2.46%
//! ========================================
//!   Files          85       85
//! - Lines        1708     1699      -9
//! ========================================
//! + Misses        314      354     +40
//! ```
//!
//! A side without a report renders `-` in its column and never takes part
//! in arithmetic.

use std::fmt;
use std::fmt::Write;

use crate::model::{round2, CoverageReport, Summary};

const TITLE_LINE: &str = "@@           Coverage Diff            @@\n";
const SEPARATOR: &str = "========================================\n";
const PLACEHOLDER: &str = "-";

/// A single compared value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    /// Percentage, shown with two decimals and a `%` suffix.
    Percent(f64),
    Count(i64),
}

impl Metric {
    /// `self - master`, or `None` when the kinds differ.
    #[must_use]
    pub fn delta(self, master: Metric) -> Option<Metric> {
        match (self, master) {
            (Metric::Percent(a), Metric::Percent(b)) => Some(Metric::Percent(round2(a - b))),
            (Metric::Count(a), Metric::Count(b)) => Some(Metric::Count(a.saturating_sub(b))),
            _ => None,
        }
    }

    /// Sign of a delta.
    #[must_use]
    pub fn change(self) -> Change {
        let sign = match self {
            Metric::Percent(v) => v.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal),
            Metric::Count(v) => v.cmp(&0),
        };
        match sign {
            std::cmp::Ordering::Greater => Change::Increased,
            std::cmp::Ordering::Less => Change::Decreased,
            std::cmp::Ordering::Equal => Change::Unchanged,
        }
    }

    /// Render with an explicit sign, e.g. `-2.46%` or `+40`.
    #[must_use]
    pub fn signed(self) -> String {
        match self {
            Metric::Percent(v) => format!("{v:+.2}%"),
            Metric::Count(v) => format!("{v:+}"),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Percent(v) => write!(f, "{v:.2}%"),
            Metric::Count(v) => write!(f, "{v}"),
        }
    }
}

/// Direction of a row, shown as the `diff` line marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Unchanged,
    Increased,
    Decreased,
}

impl Change {
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Change::Unchanged => "  ",
            Change::Increased => "+ ",
            Change::Decreased => "- ",
        }
    }
}

/// One metric compared between the target (master) and current branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub title: &'static str,
    pub master: Option<Metric>,
    pub current: Option<Metric>,
}

impl Row {
    /// `current - master` when both sides are present.
    #[must_use]
    pub fn delta(&self) -> Option<Metric> {
        match (self.current, self.master) {
            (Some(current), Some(master)) => current.delta(master),
            _ => None,
        }
    }

    /// A missing side counts as a decrease.
    #[must_use]
    pub fn change(&self) -> Change {
        self.delta().map_or(Change::Decreased, Metric::change)
    }

    /// Render one line: marker, title, master, current and the delta column
    /// unless the row is unchanged or a side is missing.
    #[must_use]
    pub fn render(&self) -> String {
        let master = format_side(self.master);
        let current = format_side(self.current);
        let change = self.change();

        let mut line = format!("{}{:<9} {:>7}{:>9}", change.marker(), self.title, master, current);
        if let Some(delta) = self.delta() {
            if change != Change::Unchanged {
                write!(line, "{:>8}", delta.signed()).unwrap();
            }
        }
        line.push('\n');
        line
    }
}

fn format_side(metric: Option<Metric>) -> String {
    metric.map_or_else(|| PLACEHOLDER.to_string(), |m| m.to_string())
}

/// The four rows of a coverage comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub coverage: Row,
    pub files: Row,
    pub lines: Row,
    pub misses: Row,
}

impl Comparison {
    pub fn new(current: Option<&CoverageReport>, master: Option<&CoverageReport>) -> Self {
        let current = current.map(CoverageReport::summary);
        let master = master.map(CoverageReport::summary);

        let row = |title, pick: fn(&Summary) -> Metric| Row {
            title,
            master: master.as_ref().map(pick),
            current: current.as_ref().map(pick),
        };

        Self {
            coverage: row("Coverage", |s| Metric::Percent(s.covered_percent)),
            files: row("Files", |s| Metric::Count(s.files)),
            lines: row("Lines", |s| Metric::Count(s.total_lines)),
            misses: row("Misses", |s| Metric::Count(s.misses)),
        }
    }

    /// Render the full fenced block. `pr_label` is the PR number without
    /// `#`; `branch_label` names the target branch column.
    #[must_use]
    pub fn render(&self, pr_label: &str, branch_label: &str) -> String {
        let mut out = String::from("```diff\n");
        out.push_str(TITLE_LINE);
        writeln!(
            out,
            "## {:>16} {:>8} {:>7} {:>3}",
            branch_label,
            format!("#{pr_label}"),
            "+/-",
            "##"
        )
        .unwrap();
        out.push_str(SEPARATOR);
        out.push_str(&self.coverage.render());
        out.push_str(SEPARATOR);
        out.push_str(&self.files.render());
        out.push_str(&self.lines.render());
        out.push_str(SEPARATOR);
        out.push_str(&self.misses.render());
        out.push_str("```");
        out
    }

    /// A message for the reviewer when coverage went down. Nothing is
    /// reported when either side is missing.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match (self.coverage.master, self.coverage.current) {
            (Some(master), Some(current)) if self.coverage.change() == Change::Decreased => {
                Some(format!("Code coverage decreased from {master} to {current}"))
            }
            _ => None,
        }
    }
}

/// Render the comparison of `current` against `master`.
#[must_use]
pub fn render_diff(
    current: Option<&CoverageReport>,
    master: Option<&CoverageReport>,
    pr_label: &str,
    branch_label: &str,
) -> String {
    Comparison::new(current, master).render(pr_label, branch_label)
}
