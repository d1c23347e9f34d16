use super::BulkInsertStrategy;
use crate::db::{DecoratedConnection, SqlxConnection};
use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::metadata::TableDescriptor;
use crate::models::Value;
use futures_util::future::BoxFuture;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Flush the CSV buffer to the server once it grows past this size.
const CHUNK_BYTES: usize = 64 * 1024;

/// Native PostgreSQL strategy: `COPY ... FROM STDIN` in CSV format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresCopyBulkInsert;

impl BulkInsertStrategy for PostgresCopyBulkInsert {
    fn name(&self) -> &'static str {
        "postgres-copy"
    }

    fn insert<'a>(
        &'a self,
        conn: &'a mut DecoratedConnection,
        table: &'a TableDescriptor,
        rows: &'a [Vec<Value>],
    ) -> BoxFuture<'a, DbResult<u64>> {
        Box::pin(async move {
            let statement = copy_statement(conn.dialect(), table)?;
            let provider = conn.dialect().provider.clone();

            let native = conn.unwrap_native::<SqlxConnection>()?;
            let backend = native.backend_name();
            let pg = native.as_postgres_mut().ok_or_else(|| {
                DbError::configuration(
                    format!("COPY requires a PostgreSQL connection, got {}", backend),
                    Some(&provider),
                )
            })?;

            debug!(table = %table.table_name, rows = rows.len(), "Starting COPY");
            let mut copy = pg
                .copy_in_raw(&statement)
                .await
                .map_err(|e| DbError::from(e).with_sql(statement.as_str()))?;

            let mut buf = String::with_capacity(CHUNK_BYTES);
            for (idx, row) in rows.iter().enumerate() {
                encode_csv_row(&mut buf, row);
                if buf.len() >= CHUNK_BYTES || idx + 1 == rows.len() {
                    let chunk = std::mem::take(&mut buf).into_bytes();
                    if let Err(e) = copy.send(chunk).await.map(|_| ()) {
                        if let Err(abort_err) = copy.abort(e.to_string()).await {
                            warn!(
                                table = %table.table_name,
                                error = %abort_err,
                                "Failed to abort COPY after send error"
                            );
                        }
                        return Err(DbError::from(e).with_sql(statement));
                    }
                }
            }

            let inserted = copy
                .finish()
                .await
                .map_err(|e| DbError::from(e).with_sql(statement.as_str()))?;
            debug!(table = %table.table_name, rows = inserted, "COPY finished");
            Ok(inserted)
        })
    }
}

/// `COPY "t" ("c1","c2") FROM STDIN WITH (FORMAT csv)` for the writable columns.
pub fn copy_statement(dialect: &Dialect, table: &TableDescriptor) -> DbResult<String> {
    let name = dialect.quote_table(table.require_named()?);
    let columns = table
        .writable_columns()
        .iter()
        .map(|c| dialect.quote(&c.name))
        .collect::<Vec<_>>()
        .join(",");
    Ok(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        name, columns
    ))
}

/// Append one CSV line. NULL is an unquoted empty field; text is always
/// quoted so the empty string stays distinct from NULL.
pub fn encode_csv_row(buf: &mut String, row: &[Value]) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        match value {
            Value::Null => {}
            Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => {
                let _ = write!(buf, "{}", n);
            }
            Value::Float(f) if f.is_nan() => buf.push_str("NaN"),
            Value::Float(f) if f.is_infinite() => {
                buf.push_str(if *f > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Float(f) => {
                let _ = write!(buf, "{}", f);
            }
            Value::String(s) => push_quoted(buf, s),
            Value::Json(j) => push_quoted(buf, &j.to_string()),
            Value::Bytes(bytes) => {
                buf.push_str("\"\\x");
                for byte in bytes {
                    let _ = write!(buf, "{:02x}", byte);
                }
                buf.push('"');
            }
        }
    }
    buf.push('\n');
}

fn push_quoted(buf: &mut String, text: &str) {
    buf.push('"');
    for c in text.chars() {
        if c == '"' {
            buf.push('"');
        }
        buf.push(c);
    }
    buf.push('"');
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

    fn line(row: &[Value]) -> String {
        let mut buf = String::new();
        encode_csv_row(&mut buf, row);
        buf
    }

    #[test]
    fn test_copy_statement() {
        let table = MetadataCache::new().resolve::<Widget>();
        assert_eq!(
            copy_statement(&Dialect::postgres(), &table).unwrap(),
            "COPY \"Widget\" (\"Name\",\"Price\") FROM STDIN WITH (FORMAT csv)"
        );
    }

    #[test]
    fn test_csv_null_and_empty_string_differ() {
        assert_eq!(line(&[Value::Null, Value::String(String::new())]), ",\"\"\n");
    }

    #[test]
    fn test_csv_quotes_text() {
        assert_eq!(
            line(&[Value::String("say \"hi\", ok".into()), Value::Int(3)]),
            "\"say \"\"hi\"\", ok\",3\n"
        );
    }

    #[test]
    fn test_csv_scalars() {
        assert_eq!(
            line(&[
                Value::Bool(true),
                Value::Float(1.5),
                Value::Float(f64::NEG_INFINITY),
                Value::Bytes(vec![0xde, 0xad]),
            ]),
            "true,1.5,-Infinity,\"\\xdead\"\n"
        );
    }

    #[test]
    fn test_csv_json() {
        let row = [Value::Json(serde_json::json!({"a": "b"}))];
        assert_eq!(line(&row), "\"{\"\"a\"\":\"\"b\"\"}\"\n");
    }
}
