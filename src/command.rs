use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::params::SqlParameters;
use crate::types::RowValues;

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    /// One or more SQL statements.
    #[default]
    Text,
    /// The name of a stored routine.
    StoredProcedure,
    /// A table name; every row of the table is returned.
    TableDirect,
}

/// Row window applied while materializing a result set.
///
/// `start` rows are skipped, then at most `max` rows are kept. A `max` of zero keeps every
/// remaining row, so the default `(0, 0)` means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RowWindow {
    pub start: usize,
    pub max: usize,
}

impl RowWindow {
    pub const UNBOUNDED: RowWindow = RowWindow { start: 0, max: 0 };

    #[must_use]
    pub const fn new(start: usize, max: usize) -> Self {
        Self { start, max }
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        *self == Self::UNBOUNDED
    }

    /// Whether the row at zero-based `index` falls inside the window.
    #[must_use]
    pub fn admits(&self, index: usize) -> bool {
        index >= self.start && (self.max == 0 || index - self.start < self.max)
    }

    /// Whether no row at or after `index` can fall inside the window.
    #[must_use]
    pub fn exhausted_at(&self, index: usize) -> bool {
        self.max != 0 && index >= self.start.saturating_add(self.max)
    }
}

/// A command to execute: text, parameters, kind, and row window.
///
/// ```rust
/// use sql_dac::prelude::*;
///
/// let cmd = SqlCommand::text("SELECT * FROM users WHERE id = @id")
///     .param("@id", 5)
///     .window(10, 20);
/// assert_eq!(cmd.window, RowWindow::new(10, 20));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlCommand {
    pub sql: String,
    pub parameters: SqlParameters,
    pub kind: CommandKind,
    pub window: RowWindow,
}

impl SqlCommand {
    #[must_use]
    pub fn new(sql: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            sql: sql.into(),
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, CommandKind::Text)
    }

    #[must_use]
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::StoredProcedure)
    }

    #[must_use]
    pub fn table_direct(table: impl Into<String>) -> Self {
        Self::new(table, CommandKind::TableDirect)
    }

    /// Replace the parameter list. Accepts [`SqlParameters`], `Vec<Parameter>`, or name/value
    /// pairs.
    #[must_use]
    pub fn params(mut self, parameters: impl Into<SqlParameters>) -> Self {
        self.parameters = parameters.into();
        self
    }

    /// Append one input parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.parameters.add(name, value);
        self
    }

    #[must_use]
    pub fn window(mut self, start: usize, max: usize) -> Self {
        self.window = RowWindow::new(start, max);
        self
    }
}

impl From<&str> for SqlCommand {
    fn from(sql: &str) -> Self {
        SqlCommand::text(sql)
    }
}

impl From<String> for SqlCommand {
    fn from(sql: String) -> Self {
        SqlCommand::text(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_window_admits_everything() {
        let w = RowWindow::UNBOUNDED;
        assert!(w.admits(0));
        assert!(w.admits(1_000_000));
        assert!(!w.exhausted_at(usize::MAX));
    }

    #[test]
    fn window_skips_then_limits() {
        let w = RowWindow::new(2, 3);
        let admitted: Vec<usize> = (0..10).filter(|i| w.admits(*i)).collect();
        assert_eq!(admitted, [2, 3, 4]);
        assert!(!w.exhausted_at(4));
        assert!(w.exhausted_at(5));
    }

    #[test]
    fn start_without_max_keeps_the_tail() {
        let w = RowWindow::new(3, 0);
        let admitted: Vec<usize> = (0..6).filter(|i| w.admits(*i)).collect();
        assert_eq!(admitted, [3, 4, 5]);
    }
}
