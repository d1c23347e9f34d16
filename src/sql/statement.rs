//! Finished statements.

use crate::error::DbResult;
use crate::models::Value;
use crate::sql::builder::Sql;

/// Finished SQL text (neutral `@k` placeholders) and its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
    /// Whether the retry layer may re-execute this statement. Off by default.
    pub retryable: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
            retryable: false,
        }
    }

    /// Allow the retry layer to re-execute this statement on a transient
    /// failure. Only mark statements that are safe to run twice.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// SQL followed by a comment listing the arguments, for diagnostics.
    pub fn to_text(&self) -> String {
        if self.args.is_empty() {
            return self.sql.clone();
        }
        let listed: Vec<String> = self
            .args
            .iter()
            .enumerate()
            .map(|(idx, v)| format!("@{}:{}", idx, v))
            .collect();
        format!("{} -- {}", self.sql, listed.join(" "))
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Anything that can be executed as one statement.
pub trait IntoStatement {
    fn into_statement(self) -> DbResult<Statement>;
}

impl IntoStatement for Statement {
    fn into_statement(self) -> DbResult<Statement> {
        Ok(self)
    }
}

impl IntoStatement for Sql {
    fn into_statement(self) -> DbResult<Statement> {
        self.build()
    }
}

impl IntoStatement for &str {
    fn into_statement(self) -> DbResult<Statement> {
        Ok(Statement::new(self, Vec::new()))
    }
}

impl IntoStatement for String {
    fn into_statement(self) -> DbResult<Statement> {
        Ok(Statement::new(self, Vec::new()))
    }
}

impl<S: Into<String>> IntoStatement for (S, Vec<Value>) {
    fn into_statement(self) -> DbResult<Statement> {
        Ok(Statement::new(self.0, self.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_lists_args() {
        let stmt = Statement::new(
            "SELECT * FROM [Widget] WHERE ([Widget].[Name] = @0) AND ([Widget].[Price] > @1)",
            vec![Value::String("A".into()), Value::Float(1.5)],
        );
        assert!(stmt.to_text().ends_with(" -- @0:A @1:1.5"));
        assert_eq!(Statement::new("SELECT 1", vec![]).to_text(), "SELECT 1");
    }

    #[test]
    fn test_retry_is_opt_in() {
        let stmt = "SELECT 1".into_statement().unwrap();
        assert!(!stmt.retryable);
        assert!(stmt.retryable().retryable);
        assert!(!Statement::new("UPDATE t SET a = 1", vec![]).retryable);
    }
}
