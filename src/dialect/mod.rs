//! SQL dialect descriptors.
//!
//! A [`Dialect`] is pure data: identifier quoting, native placeholder style,
//! the bound-parameter limit, default isolation level, row-lock hint, paging
//! syntax and the native bulk-copy flag. One instance exists per provider and
//! it is shared read-only for the lifetime of a factory configuration.

pub mod placeholder;
pub mod registry;

pub use registry::ProviderRegistry;

use crate::error::DbResult;
use crate::models::Value;
use serde::Serialize;

/// How positional arguments are written in native SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `@0, @1` (SQL Server)
    AtIndex,
    /// `$1, $2` (PostgreSQL)
    DollarIndex,
    /// `?1, ?2` (SQLite)
    QuestionIndex,
    /// `?` with arguments reordered to occurrence order (MySQL)
    Question,
}

/// Where the pessimistic row-lock hint goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockHint {
    /// Engine has no row locks (SQLite locks the whole file).
    None,
    /// Table hint placed right after the first FROM target.
    Table(String),
    /// Clause appended to the end of the statement.
    Suffix(String),
}

/// Row limiting syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingStyle {
    /// `SELECT TOP n` and `OFFSET n ROWS FETCH NEXT m ROWS ONLY`
    TopOffsetFetch,
    /// `LIMIT m OFFSET n`
    LimitOffset,
}

/// How a transaction with an explicit isolation level is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeginStyle {
    /// `SET TRANSACTION ISOLATION LEVEL x` then `BEGIN TRANSACTION`
    SetThenBegin,
    /// `SET TRANSACTION ISOLATION LEVEL x` then `START TRANSACTION`
    SetThenStart,
    /// `BEGIN TRANSACTION ISOLATION LEVEL x`
    Inline,
    /// `BEGIN` (isolation is fixed by the engine)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Syntax and capability profile of one database engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dialect {
    /// Registry key, e.g. "SqlServer".
    pub provider: String,
    pub quote_open: char,
    pub quote_close: char,
    pub placeholder: PlaceholderStyle,
    /// Maximum bound parameters per statement.
    pub max_parameters: usize,
    /// Maximum rows in one multi-row VALUES list, if the engine caps it.
    pub max_rows_per_statement: Option<usize>,
    pub isolation: IsolationLevel,
    pub lock_hint: LockHint,
    pub paging: PagingStyle,
    pub begin_style: BeginStyle,
    /// Engine exposes a native bulk-copy API.
    pub supports_bulk_copy: bool,
    /// NULL arguments are written as a `NULL` literal instead of being bound.
    /// The engine types a bound parameter up front, so a NULL bound as text
    /// would be rejected by non-text columns.
    pub inline_nulls: bool,
    /// Infix concatenation operator; `None` means `CONCAT(a, b)`.
    pub concat_operator: Option<String>,
    pub wildcard: char,
}

impl Dialect {
    pub fn sql_server() -> Self {
        Self {
            provider: "SqlServer".into(),
            quote_open: '[',
            quote_close: ']',
            placeholder: PlaceholderStyle::AtIndex,
            max_parameters: 2100,
            max_rows_per_statement: Some(1000),
            isolation: IsolationLevel::ReadCommitted,
            lock_hint: LockHint::Table("WITH (UPDLOCK)".into()),
            paging: PagingStyle::TopOffsetFetch,
            begin_style: BeginStyle::SetThenBegin,
            supports_bulk_copy: true,
            inline_nulls: false,
            concat_operator: Some("+".into()),
            wildcard: '%',
        }
    }

    pub fn sqlite() -> Self {
        Self {
            provider: "SQLite".into(),
            quote_open: '"',
            quote_close: '"',
            placeholder: PlaceholderStyle::QuestionIndex,
            max_parameters: 999,
            max_rows_per_statement: None,
            isolation: IsolationLevel::Serializable,
            lock_hint: LockHint::None,
            paging: PagingStyle::LimitOffset,
            begin_style: BeginStyle::Plain,
            supports_bulk_copy: false,
            inline_nulls: false,
            concat_operator: Some("||".into()),
            wildcard: '%',
        }
    }

    pub fn postgres() -> Self {
        Self {
            provider: "PostgreSQL".into(),
            quote_open: '"',
            quote_close: '"',
            placeholder: PlaceholderStyle::DollarIndex,
            max_parameters: 65535,
            max_rows_per_statement: None,
            isolation: IsolationLevel::ReadCommitted,
            lock_hint: LockHint::Suffix("FOR UPDATE".into()),
            paging: PagingStyle::LimitOffset,
            begin_style: BeginStyle::Inline,
            supports_bulk_copy: true,
            inline_nulls: true,
            concat_operator: Some("||".into()),
            wildcard: '%',
        }
    }

    pub fn mysql() -> Self {
        Self {
            provider: "MySql".into(),
            quote_open: '`',
            quote_close: '`',
            placeholder: PlaceholderStyle::Question,
            max_parameters: 65535,
            max_rows_per_statement: None,
            isolation: IsolationLevel::ReadCommitted,
            lock_hint: LockHint::Suffix("FOR UPDATE".into()),
            paging: PagingStyle::LimitOffset,
            begin_style: BeginStyle::SetThenStart,
            supports_bulk_copy: false,
            inline_nulls: false,
            concat_operator: None,
            wildcard: '%',
        }
    }

    /// Quote an identifier, doubling any embedded closing quote.
    pub fn quote(&self, name: &str) -> String {
        let close = self.quote_close.to_string();
        let doubled = format!("{0}{0}", self.quote_close);
        format!(
            "{}{}{}",
            self.quote_open,
            name.replace(&close, &doubled),
            self.quote_close
        )
    }

    /// Reverse [`quote`](Self::quote). Returns `None` for text that is not a
    /// single quoted identifier.
    pub fn unquote(&self, quoted: &str) -> Option<String> {
        let inner = quoted
            .strip_prefix(self.quote_open)?
            .strip_suffix(self.quote_close)?;
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == self.quote_close {
                // a lone closing quote would have ended the identifier
                if chars.next() != Some(self.quote_close) {
                    return None;
                }
            }
            out.push(c);
        }
        Some(out)
    }

    /// Quote a possibly schema-qualified table name (`schema.table`).
    pub fn quote_table(&self, name: &str) -> String {
        name.split('.')
            .map(|part| self.quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Escape text for inclusion inside a single-quoted literal.
    pub fn escape_string(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    /// Single-quoted string literal.
    pub fn string_literal(&self, text: &str) -> String {
        format!("'{}'", self.escape_string(text))
    }

    /// Concatenate SQL expressions.
    pub fn concat(&self, parts: &[&str]) -> String {
        match &self.concat_operator {
            Some(op) => parts.join(&format!(" {} ", op)),
            None => format!("CONCAT({})", parts.join(", ")),
        }
    }

    /// Native placeholder text for a zero-based argument index.
    pub fn placeholder(&self, index: usize) -> String {
        match self.placeholder {
            PlaceholderStyle::AtIndex => format!("@{}", index),
            PlaceholderStyle::DollarIndex => format!("${}", index + 1),
            PlaceholderStyle::QuestionIndex => format!("?{}", index + 1),
            PlaceholderStyle::Question => "?".to_string(),
        }
    }

    /// Whether `[...]` is identifier quoting in this dialect.
    pub(crate) fn uses_brackets(&self) -> bool {
        self.quote_open == '['
    }

    /// Translate neutral `@k` placeholders into native ones.
    pub fn render(&self, sql: &str, args: &[Value]) -> DbResult<(String, Vec<Value>)> {
        placeholder::render(self, sql, args)
    }

    /// Statements that open a transaction at the given isolation level.
    pub fn begin_transaction(&self, level: IsolationLevel) -> Vec<String> {
        match self.begin_style {
            BeginStyle::SetThenBegin => vec![
                format!("SET TRANSACTION ISOLATION LEVEL {}", level),
                "BEGIN TRANSACTION".to_string(),
            ],
            BeginStyle::SetThenStart => vec![
                format!("SET TRANSACTION ISOLATION LEVEL {}", level),
                "START TRANSACTION".to_string(),
            ],
            BeginStyle::Inline => vec![format!("BEGIN TRANSACTION ISOLATION LEVEL {}", level)],
            BeginStyle::Plain => vec!["BEGIN".to_string()],
        }
    }

    /// Largest number of rows one multi-row INSERT can carry: the parameter
    /// limit divided by the column count, capped by the engine's row limit.
    /// `None` when there are no bound columns (no limit); `Some(0)` when a
    /// single row already exceeds the parameter limit.
    pub fn max_rows_per_insert(&self, columns: usize) -> Option<usize> {
        if columns == 0 {
            return None;
        }
        let by_parameters = self.max_parameters / columns;
        Some(match self.max_rows_per_statement {
            Some(cap) => by_parameters.min(cap),
            None => by_parameters,
        })
    }
}
