//! Neutral placeholder handling.
//!
//! Builder SQL refers to arguments as `@0, @1, …`. The scanner here finds those
//! references while skipping string literals, quoted identifiers and comments,
//! so a literal like `'me@1'` or a variable like `@@ROWCOUNT` is never touched.

use crate::dialect::{Dialect, PlaceholderStyle};
use crate::error::{DbError, DbResult};
use crate::models::Value;

/// One `@k` reference in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub start: usize,
    pub end: usize,
    pub index: usize,
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// Index just past a quoted section opened at `start`. Doubled closing
/// characters are escapes. Unterminated sections run to the end.
fn skip_quoted(bytes: &[u8], start: usize, close: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_until(bytes: &[u8], start: usize, terminator: &[u8]) -> usize {
    bytes[start.min(bytes.len())..]
        .windows(terminator.len())
        .position(|w| w == terminator)
        .map(|pos| start + pos + terminator.len())
        .unwrap_or(bytes.len())
}

/// Find all `@k` references. `brackets` marks `[...]` as identifier quoting.
pub(crate) fn scan(sql: &str, brackets: bool) -> DbResult<Vec<Placeholder>> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\''),
            b'"' => i = skip_quoted(bytes, i, b'"'),
            b'`' => i = skip_quoted(bytes, i, b'`'),
            b'[' if brackets => i = skip_quoted(bytes, i, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_until(bytes, i + 2, b"\n"),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_until(bytes, i + 2, b"*/"),
            b'@' if bytes.get(i + 1) == Some(&b'@') => {
                // server variable such as @@IDENTITY
                i += 2;
                while i < bytes.len() && is_ident(bytes[i]) {
                    i += 1;
                }
            }
            b'@' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                let has_digits = j > i + 1;
                let preceded = i > 0 && is_ident(bytes[i - 1]);
                let followed = j < bytes.len() && is_ident(bytes[j]);
                if has_digits && !preceded && !followed {
                    let index = sql[i + 1..j].parse::<usize>().map_err(|_| {
                        DbError::builder(format!("Placeholder {} is out of range", &sql[i..j]))
                    })?;
                    found.push(Placeholder {
                        start: i,
                        end: j,
                        index,
                    });
                }
                i = j;
            }
            _ => i += 1,
        }
    }
    Ok(found)
}

/// Shift every `@k` by `offset`, for appending a fragment after existing args.
pub(crate) fn renumber(sql: &str, offset: usize, brackets: bool) -> DbResult<String> {
    if offset == 0 {
        return Ok(sql.to_string());
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut last = 0;
    for p in scan(sql, brackets)? {
        out.push_str(&sql[last..p.start]);
        out.push('@');
        out.push_str(&(p.index + offset).to_string());
        last = p.end;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Check that references and arguments match one-to-one by index.
pub(crate) fn validate(sql: &str, arg_count: usize, brackets: bool) -> DbResult<()> {
    let found = scan(sql, brackets)?;
    check_usage(&found, arg_count)
}

fn check_usage(found: &[Placeholder], arg_count: usize) -> DbResult<()> {
    let mut used = vec![false; arg_count];
    for p in found {
        match used.get_mut(p.index) {
            Some(slot) => *slot = true,
            None => {
                return Err(DbError::builder(format!(
                    "Placeholder @{} has no argument ({} supplied)",
                    p.index, arg_count
                )));
            }
        }
    }
    if let Some(unused) = used.iter().position(|u| !u) {
        return Err(DbError::builder(format!(
            "Argument @{} is never referenced ({} supplied)",
            unused, arg_count
        )));
    }
    Ok(())
}

/// Translate neutral placeholders to the dialect's native style.
pub(crate) fn render(dialect: &Dialect, sql: &str, args: &[Value]) -> DbResult<(String, Vec<Value>)> {
    let found = scan(sql, dialect.uses_brackets())?;
    check_usage(&found, args.len())?;

    let inline = dialect.inline_nulls && args.iter().any(Value::is_null);
    if dialect.placeholder == PlaceholderStyle::AtIndex && !inline {
        return Ok((sql.to_string(), args.to_vec()));
    }

    // native index per neutral index, `None` for inlined NULLs
    let mut bound = Vec::with_capacity(args.len());
    let mut kept = Vec::with_capacity(args.len());
    for arg in args {
        if inline && arg.is_null() {
            bound.push(None);
        } else {
            bound.push(Some(kept.len()));
            kept.push(arg.clone());
        }
    }

    let mut out = String::with_capacity(sql.len() + found.len());
    let mut ordered = Vec::new();
    let mut last = 0;
    for p in &found {
        out.push_str(&sql[last..p.start]);
        match bound[p.index] {
            None => out.push_str("NULL"),
            Some(native) => {
                out.push_str(&dialect.placeholder(native));
                if dialect.placeholder == PlaceholderStyle::Question {
                    ordered.push(args[p.index].clone());
                }
            }
        }
        last = p.end;
    }
    out.push_str(&sql[last..]);

    let args = if dialect.placeholder == PlaceholderStyle::Question {
        ordered
    } else {
        kept
    };
    Ok((out, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(sql: &str, brackets: bool) -> Vec<usize> {
        scan(sql, brackets).unwrap().iter().map(|p| p.index).collect()
    }

    #[test]
    fn test_scan_skips_literals_and_comments() {
        assert_eq!(indices("a = @0 AND b = @1", false), vec![0, 1]);
        assert_eq!(indices("a = 'me@1' AND b = @0", false), vec![0]);
        assert_eq!(indices("\"col@2\" = @0 -- @5\n AND c = @1", false), vec![0, 1]);
        assert_eq!(indices("/* @3 */ x = @0", false), vec![0]);
        assert_eq!(indices("[a@1] = @0", true), vec![0]);
        assert_eq!(indices("SELECT @@IDENTITY, @name, x@1, @0", false), vec![0]);
        assert_eq!(indices("a = 'it''s @1' OR b = @0", false), vec![0]);
    }

    #[test]
    fn test_renumber() {
        assert_eq!(renumber("x = @0 OR y = @1", 3, false).unwrap(), "x = @3 OR y = @4");
        assert_eq!(renumber("x = '@0'", 3, false).unwrap(), "x = '@0'");
    }

    #[test]
    fn test_validate_mismatch() {
        assert!(validate("a = @0", 1, false).is_ok());
        assert!(matches!(
            validate("a = @1", 1, false),
            Err(DbError::Builder { .. })
        ));
        assert!(matches!(
            validate("a = @0", 2, false),
            Err(DbError::Builder { .. })
        ));
    }

    #[test]
    fn test_render_styles() {
        let args = vec![Value::Int(1), Value::Int(2)];
        let sql = "a = @1 AND b = @0 AND c = @1";

        let (text, _) = render(&Dialect::postgres(), sql, &args).unwrap();
        assert_eq!(text, "a = $2 AND b = $1 AND c = $2");

        let (text, _) = render(&Dialect::sqlite(), sql, &args).unwrap();
        assert_eq!(text, "a = ?2 AND b = ?1 AND c = ?2");

        let (text, _) = render(&Dialect::sql_server(), sql, &args).unwrap();
        assert_eq!(text, sql);

        let (text, ordered) = render(&Dialect::mysql(), sql, &args).unwrap();
        assert_eq!(text, "a = ? AND b = ? AND c = ?");
        assert_eq!(ordered, vec![Value::Int(2), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_render_inlines_nulls_for_postgres() {
        let args = vec![Value::String("a".into()), Value::Null, Value::Int(3)];
        let sql = "INSERT INTO t (a, b, c) VALUES (@0, @1, @2)";

        let (text, bound) = render(&Dialect::postgres(), sql, &args).unwrap();
        assert_eq!(text, "INSERT INTO t (a, b, c) VALUES ($1, NULL, $2)");
        assert_eq!(bound, vec![Value::String("a".into()), Value::Int(3)]);

        let (text, bound) = render(&Dialect::sqlite(), sql, &args).unwrap();
        assert_eq!(text, "INSERT INTO t (a, b, c) VALUES (?1, ?2, ?3)");
        assert_eq!(bound, args);
    }

    #[test]
    fn test_render_repeated_null_reference() {
        let args = vec![Value::Null, Value::Int(5)];
        let (text, bound) =
            render(&Dialect::postgres(), "a = @1 OR b = @0 OR c = @1", &args).unwrap();
        assert_eq!(text, "a = $1 OR b = NULL OR c = $1");
        assert_eq!(bound, vec![Value::Int(5)]);
    }
}
