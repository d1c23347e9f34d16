use super::{BulkInsertPlan, BulkInsertStrategy};
use crate::db::DecoratedConnection;
use crate::dialect::{Dialect, PlaceholderStyle};
use crate::error::{DbError, DbResult};
use crate::metadata::TableDescriptor;
use crate::models::Value;
use crate::sql::Statement;
use futures_util::future::BoxFuture;
use tracing::debug;

/// Generic strategy: multi-row INSERT statements executed in sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandBulkInsert;

impl BulkInsertStrategy for CommandBulkInsert {
    fn name(&self) -> &'static str {
        "command"
    }

    fn insert<'a>(
        &'a self,
        conn: &'a mut DecoratedConnection,
        table: &'a TableDescriptor,
        rows: &'a [Vec<Value>],
    ) -> BoxFuture<'a, DbResult<u64>> {
        Box::pin(async move {
            let columns = table.writable_columns().len();
            let plan = BulkInsertPlan::for_dialect(conn.dialect(), rows.len(), columns)?;

            for (batch, range) in plan.groups().enumerate() {
                let stmt = insert_statement(conn.dialect(), table, &rows[range.clone()])?;
                debug!(
                    table = %table.table_name,
                    batch = batch + 1,
                    batches = plan.statement_count,
                    rows = range.len(),
                    "Executing bulk insert batch"
                );
                conn.execute(&stmt).await?;
            }

            Ok(rows.len() as u64)
        })
    }
}

/// One multi-row INSERT for `rows` (writable-column values).
pub fn insert_statement(
    dialect: &Dialect,
    table: &TableDescriptor,
    rows: &[Vec<Value>],
) -> DbResult<Statement> {
    let name = dialect.quote_table(table.require_named()?);
    let columns = table.writable_columns();

    if columns.is_empty() {
        // MySQL has no DEFAULT VALUES form
        let single = match dialect.placeholder {
            PlaceholderStyle::Question => format!("INSERT INTO {} () VALUES ()", name),
            _ => format!("INSERT INTO {} DEFAULT VALUES", name),
        };
        let sql = vec![single; rows.len().max(1)].join("; ");
        return Ok(Statement::new(sql, Vec::new()));
    }

    let column_list = columns
        .iter()
        .map(|c| dialect.quote(&c.name))
        .collect::<Vec<_>>()
        .join(",");

    let mut args = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            return Err(DbError::builder(format!(
                "Bulk row has {} values for {} writable columns",
                row.len(),
                columns.len()
            )));
        }
        let placeholders = row
            .iter()
            .map(|value| {
                args.push(value.clone());
                format!("@{}", args.len() - 1)
            })
            .collect::<Vec<_>>()
            .join(",");
        tuples.push(format!("({})", placeholders));
    }

    Ok(Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            name,
            column_list,
            tuples.join(",")
        ),
        args,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_record;
    use crate::metadata::MetadataCache;

    define_record! {
        struct Widget in "Widget" {
            #[auto_increment]
            ID => id: Option<i64> = "Id",
            NAME => name: String = "Name",
            PRICE => price: f64 = "Price",
        }
    }

    define_record! {
        struct Counter in "Counter" {
            #[auto_increment]
            ID => id: Option<i64> = "Id",
        }
    }

    define_record! {
        struct Nameless {
            NOTE => note: String = "Note",
        }
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec!["A".into(), 1.0.into()],
            vec!["B".into(), 2.0.into()],
            vec!["C".into(), 3.0.into()],
        ]
    }

    #[test]
    fn test_insert_statement_sql_server() {
        let table = MetadataCache::new().resolve::<Widget>();
        let stmt = insert_statement(&Dialect::sql_server(), &table, &rows()).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [Widget] ([Name],[Price]) VALUES (@0,@1),(@2,@3),(@4,@5)"
        );
        assert_eq!(
            stmt.args,
            vec![
                Value::from("A"),
                Value::Float(1.0),
                Value::from("B"),
                Value::Float(2.0),
                Value::from("C"),
                Value::Float(3.0),
            ]
        );
    }

    #[test]
    fn test_insert_statement_quotes_per_dialect() {
        let table = MetadataCache::new().resolve::<Widget>();
        let stmt = insert_statement(&Dialect::mysql(), &table, &rows()[..1]).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `Widget` (`Name`,`Price`) VALUES (@0,@1)");
    }

    #[test]
    fn test_insert_statement_without_writable_columns() {
        let table = MetadataCache::new().resolve::<Counter>();
        let empty = vec![Vec::new(), Vec::new()];

        let stmt = insert_statement(&Dialect::sqlite(), &table, &empty).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"Counter\" DEFAULT VALUES; INSERT INTO \"Counter\" DEFAULT VALUES"
        );
        assert!(stmt.args.is_empty());

        let stmt = insert_statement(&Dialect::mysql(), &table, &empty[..1]).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `Counter` () VALUES ()");
    }

    #[test]
    fn test_insert_statement_unnamed_table() {
        let table = MetadataCache::new().resolve::<Nameless>();
        let err = insert_statement(&Dialect::sqlite(), &table, &[vec!["x".into()]]).unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
    }
}
