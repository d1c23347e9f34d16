//! Fluent SQL builder.
//!
//! [`Sql`] accumulates clause text and positional arguments. Every method
//! consumes the builder and returns the next state, so a half-built statement
//! is never shared. Arguments are written as neutral `@k` placeholders and
//! translated to the provider's native style at execution time.
//!
//! Failures (an unmapped member, an unnamed table, a raw fragment whose
//! placeholders don't match its arguments) are recorded on first occurrence
//! and reported by [`Sql::build`].

use crate::dialect::{LockHint, PagingStyle, placeholder};
use crate::error::{DbError, DbResult};
use crate::metadata::{Field, FieldRef, Record};
use crate::models::{ToValue, Value};
use crate::sql::context::SqlContext;
use crate::sql::expr::Predicate;
use crate::sql::statement::Statement;

/// Clause most recently appended; decides between `WHERE`/`AND` and
/// `ORDER BY`/`,` continuations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Clause {
    None,
    Select,
    From,
    Join,
    Where,
    OrderBy,
    GroupBy,
    Other,
}

#[derive(Debug, Clone)]
pub struct Sql {
    ctx: SqlContext,
    text: String,
    args: Vec<Value>,
    last: Clause,
    /// Output names of the current SELECT list, for collision detection.
    output_names: Vec<String>,
    /// Byte offset right after the first FROM target.
    lock_anchor: Option<usize>,
    for_update: bool,
    limit: Option<u64>,
    paging: Option<(u64, u64)>,
    has_order_by: bool,
    error: Option<DbError>,
    retryable: bool,
}

impl Sql {
    pub fn new(ctx: SqlContext) -> Self {
        Self {
            ctx,
            text: String::new(),
            args: Vec::new(),
            last: Clause::None,
            output_names: Vec::new(),
            lock_anchor: None,
            for_update: false,
            limit: None,
            paging: None,
            has_order_by: false,
            error: None,
            retryable: false,
        }
    }

    pub fn context(&self) -> &SqlContext {
        &self.ctx
    }

    /// SQL accumulated so far, without paging or lock hints.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn apply<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Self) -> DbResult<()>,
    {
        if self.error.is_some() {
            return self;
        }
        if let Err(e) = f(&mut self) {
            self.error = Some(e);
        }
        self
    }

    fn push(&mut self, fragment: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    /// Validate a fragment's local placeholders against its arguments, shift
    /// them past the arguments already held and take ownership of the values.
    fn push_args(&mut self, text: &str, args: Vec<Value>) -> DbResult<String> {
        let brackets = self.ctx.dialect().uses_brackets();
        placeholder::validate(text, args.len(), brackets)?;
        let shifted = placeholder::renumber(text, self.args.len(), brackets)?;
        self.args.extend(args);
        Ok(shifted)
    }

    fn output_name_taken(&self, name: &str) -> bool {
        self.output_names
            .iter()
            .any(|taken| taken.eq_ignore_ascii_case(name))
    }

    /// Render one select-list column, aliasing on collision. Generated
    /// aliases get a numeric suffix until they are unique in the list.
    fn render_column(&mut self, qualifier: &str, column: &str, alias: Option<&str>) -> String {
        let alias = match alias {
            Some(explicit) => Some(explicit.to_string()),
            None if self.output_name_taken(column) => {
                let base = format!("{}__{}", qualifier.replace('.', "_"), column);
                let mut candidate = base.clone();
                let mut n = 2;
                while self.output_name_taken(&candidate) {
                    candidate = format!("{}{}", base, n);
                    n += 1;
                }
                Some(candidate)
            }
            None => None,
        };
        let dialect = self.ctx.dialect();
        let rendered = format!("{}.{}", dialect.quote_table(qualifier), dialect.quote(column));
        let text = match &alias {
            Some(alias) => format!("{} AS {}", rendered, dialect.quote(alias)),
            None => rendered,
        };
        self.output_names
            .push(alias.unwrap_or_else(|| column.to_string()));
        text
    }

    fn render_select_list(&mut self, fields: Vec<FieldRef>) -> DbResult<String> {
        let mut items = Vec::with_capacity(fields.len());
        for field in &fields {
            let (qualifier, column) = self.ctx.resolve_field(field)?;
            items.push(self.render_column(&qualifier, &column, field.alias()));
        }
        Ok(items.join(", "))
    }

    fn render_record_columns<R: Record>(&mut self, table_alias: Option<&str>) -> DbResult<String> {
        let table = self.ctx.table::<R>();
        let qualifier = match table_alias {
            Some(alias) => alias.to_string(),
            None => table.require_named()?.to_string(),
        };
        let items: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.render_column(&qualifier, &c.name, None))
            .collect();
        Ok(items.join(", "))
    }

    /// Qualified column list for ORDER BY / GROUP BY. Empty means all columns.
    fn qualified_list(&self, fields: Vec<FieldRef>, record: Option<&[String]>) -> DbResult<Vec<String>> {
        if fields.is_empty() {
            return Ok(record.map(|cols| cols.to_vec()).unwrap_or_default());
        }
        fields.iter().map(|f| self.ctx.quoted_field(f)).collect()
    }

    fn all_columns<R: Record>(&self) -> DbResult<Vec<String>> {
        let table = self.ctx.table::<R>();
        let name = table.require_named()?;
        let dialect = self.ctx.dialect();
        Ok(table
            .columns
            .iter()
            .map(|c| format!("{}.{}", dialect.quote_table(name), dialect.quote(&c.name)))
            .collect())
    }

    fn start_select(&mut self, head: &str, list: &str) {
        self.push(&format!("{} {}", head, list));
        self.last = Clause::Select;
    }

    fn push_where(&mut self, condition: &str) {
        let keyword = if self.last == Clause::Where {
            "AND"
        } else {
            "WHERE"
        };
        self.push(&format!("{} ({})", keyword, condition));
        self.last = Clause::Where;
    }

    fn push_by(&mut self, kind: Clause, columns: Vec<String>, descending: bool) {
        let suffix = if descending { " DESC" } else { "" };
        let list = columns
            .iter()
            .map(|c| format!("{}{}", c, suffix))
            .collect::<Vec<_>>()
            .join(", ");
        if self.last == kind {
            self.text.push_str(", ");
            self.text.push_str(&list);
        } else {
            let keyword = if kind == Clause::OrderBy {
                "ORDER BY"
            } else {
                "GROUP BY"
            };
            self.push(&format!("{} {}", keyword, list));
        }
        if kind == Clause::OrderBy {
            self.has_order_by = true;
        }
        self.last = kind;
    }

    fn table_target<R: Record>(&self, alias: Option<&str>) -> DbResult<String> {
        let table = self.ctx.quoted_table::<R>()?;
        Ok(match alias {
            Some(alias) => format!("{} {}", table, self.ctx.dialect().quote(alias)),
            None => table,
        })
    }

    // -------------------------------------------------------------------------
    // SELECT
    // -------------------------------------------------------------------------

    /// `SELECT cols`. An empty list selects `*`.
    pub fn select<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            s.output_names.clear();
            let list = if fields.is_empty() {
                "*".to_string()
            } else {
                s.render_select_list(fields)?
            };
            s.start_select("SELECT", &list);
            Ok(())
        })
    }

    pub fn select_all(self) -> Self {
        self.apply(|s| {
            s.output_names.clear();
            s.start_select("SELECT", "*");
            Ok(())
        })
    }

    pub fn select_count(self) -> Self {
        self.apply(|s| {
            s.start_select("SELECT", "COUNT(*)");
            Ok(())
        })
    }

    pub fn select_count_as(self, alias: &str) -> Self {
        self.apply(|s| {
            let list = format!("COUNT(*) AS {}", s.ctx.dialect().quote(alias));
            s.start_select("SELECT", &list);
            Ok(())
        })
    }

    /// `SELECT COUNT(cols)`. An empty list counts `*`.
    pub fn select_count_of<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            let list = if fields.is_empty() {
                "*".to_string()
            } else {
                s.qualified_list(fields, None)?.join(", ")
            };
            s.start_select("SELECT", &format!("COUNT({})", list));
            Ok(())
        })
    }

    pub fn select_distinct<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            s.output_names.clear();
            let list = if fields.is_empty() {
                "*".to_string()
            } else {
                s.render_select_list(fields)?
            };
            s.start_select("SELECT DISTINCT", &list);
            Ok(())
        })
    }

    /// `SELECT TOP n` on dialects that have it, `LIMIT n` elsewhere.
    pub fn select_top<I>(self, n: u64, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            s.output_names.clear();
            let list = if fields.is_empty() {
                "*".to_string()
            } else {
                s.render_select_list(fields)?
            };
            match s.ctx.dialect().paging {
                PagingStyle::TopOffsetFetch => {
                    s.start_select(&format!("SELECT TOP {}", n), &list);
                }
                PagingStyle::LimitOffset => {
                    s.start_select("SELECT", &list);
                    s.limit = Some(n);
                }
            }
            Ok(())
        })
    }

    /// Select every column of a record type.
    pub fn select_record<R: Record>(self) -> Self {
        self.apply(|s| {
            s.output_names.clear();
            let list = s.render_record_columns::<R>(None)?;
            s.start_select("SELECT", &list);
            Ok(())
        })
    }

    /// Select every column of a record type through a table alias.
    pub fn select_record_as<R: Record>(self, table_alias: &str) -> Self {
        self.apply(|s| {
            s.output_names.clear();
            let list = s.render_record_columns::<R>(Some(table_alias))?;
            s.start_select("SELECT", &list);
            Ok(())
        })
    }

    /// Extend the current SELECT list.
    pub fn and_select<I>(self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            if fields.is_empty() {
                return Ok(());
            }
            let list = s.render_select_list(fields)?;
            s.text.push_str(", ");
            s.text.push_str(&list);
            Ok(())
        })
    }

    /// Extend the current SELECT list with every column of a record type.
    pub fn and_select_record<R: Record>(self) -> Self {
        self.apply(|s| {
            let list = s.render_record_columns::<R>(None)?;
            s.text.push_str(", ");
            s.text.push_str(&list);
            Ok(())
        })
    }

    /// Extend the current SELECT list with `COUNT(*)`.
    pub fn and_select_count(self, alias: Option<&str>) -> Self {
        self.apply(|s| {
            s.text.push_str(", COUNT(*)");
            if let Some(alias) = alias {
                let quoted = s.ctx.dialect().quote(alias);
                s.text.push_str(&format!(" AS {}", quoted));
                s.output_names.push(alias.to_string());
            }
            Ok(())
        })
    }

    /// `SELECT CASE WHEN EXISTS (nested) THEN 1 ELSE 0 END`.
    pub fn select_any_if_exists(self, nested: Sql) -> Self {
        self.apply(|s| {
            let nested = nested.build()?;
            let fragment = s.push_args(&nested.sql, nested.args)?;
            s.output_names.clear();
            s.push(&format!("SELECT CASE WHEN EXISTS ({}) THEN 1 ELSE 0 END", fragment));
            s.last = Clause::Other;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // FROM / JOIN
    // -------------------------------------------------------------------------

    pub fn from<R: Record>(self) -> Self {
        self.from_target::<R>(None)
    }

    pub fn from_as<R: Record>(self, alias: &str) -> Self {
        self.from_target::<R>(Some(alias))
    }

    fn from_target<R: Record>(self, alias: Option<&str>) -> Self {
        self.apply(|s| {
            let target = s.table_target::<R>(alias)?;
            s.push(&format!("FROM {}", target));
            if s.lock_anchor.is_none() {
                s.lock_anchor = Some(s.text.len());
            }
            s.last = Clause::From;
            Ok(())
        })
    }

    fn join_target<R: Record>(self, kind: &str, alias: Option<&str>) -> Self {
        self.apply(|s| {
            let target = s.table_target::<R>(alias)?;
            s.push(&format!("{} {}", kind, target));
            s.last = Clause::Join;
            Ok(())
        })
    }

    pub fn cross_join<R: Record>(self) -> Self {
        self.join_target::<R>("CROSS JOIN", None)
    }

    pub fn cross_join_as<R: Record>(self, alias: &str) -> Self {
        self.join_target::<R>("CROSS JOIN", Some(alias))
    }

    pub fn inner_join<R: Record>(self) -> JoinClause {
        JoinClause::new(self.join_target::<R>("INNER JOIN", None))
    }

    pub fn inner_join_as<R: Record>(self, alias: &str) -> JoinClause {
        JoinClause::new(self.join_target::<R>("INNER JOIN", Some(alias)))
    }

    pub fn left_join<R: Record>(self) -> JoinClause {
        JoinClause::new(self.join_target::<R>("LEFT JOIN", None))
    }

    pub fn left_join_as<R: Record>(self, alias: &str) -> JoinClause {
        JoinClause::new(self.join_target::<R>("LEFT JOIN", Some(alias)))
    }

    pub fn right_join<R: Record>(self) -> JoinClause {
        JoinClause::new(self.join_target::<R>("RIGHT JOIN", None))
    }

    pub fn right_join_as<R: Record>(self, alias: &str) -> JoinClause {
        JoinClause::new(self.join_target::<R>("RIGHT JOIN", Some(alias)))
    }

    // -------------------------------------------------------------------------
    // WHERE
    // -------------------------------------------------------------------------

    /// `WHERE (p)`, or `AND (p)` after another WHERE.
    pub fn where_(self, predicate: Predicate) -> Self {
        self.apply(|s| {
            let condition = predicate.render(&s.ctx, &mut s.args)?;
            s.push_where(&condition);
            Ok(())
        })
    }

    /// Raw condition with its own `@0..` placeholders.
    pub fn where_raw(self, text: &str, args: Vec<Value>) -> Self {
        self.apply(|s| {
            let condition = s.push_args(text, args)?;
            s.push_where(&condition);
            Ok(())
        })
    }

    pub fn where_in<F, I>(self, field: F, values: I) -> Self
    where
        F: Into<FieldRef>,
        I: IntoIterator,
        I::Item: ToValue,
    {
        let field: FieldRef = field.into();
        self.where_(field.in_(values))
    }

    pub fn where_not_in<F, I>(self, field: F, values: I) -> Self
    where
        F: Into<FieldRef>,
        I: IntoIterator,
        I::Item: ToValue,
    {
        let field: FieldRef = field.into();
        self.where_(field.not_in(values))
    }

    /// `field IN (subquery)`.
    pub fn where_in_sql<F: Into<FieldRef>>(self, field: F, subquery: Sql) -> Self {
        self.where_subquery(field.into(), subquery, false)
    }

    pub fn where_not_in_sql<F: Into<FieldRef>>(self, field: F, subquery: Sql) -> Self {
        self.where_subquery(field.into(), subquery, true)
    }

    fn where_subquery(self, field: FieldRef, subquery: Sql, negated: bool) -> Self {
        self.apply(|s| {
            let column = s.ctx.quoted_field(&field)?;
            let inner = subquery.build()?;
            let inner_sql = s.push_args(&inner.sql, inner.args)?;
            let keyword = if negated { "NOT IN" } else { "IN" };
            s.push_where(&format!("{} {} ({})", column, keyword, inner_sql));
            Ok(())
        })
    }

    pub fn where_null<F: Into<FieldRef>>(self, field: F) -> Self {
        let field: FieldRef = field.into();
        self.where_(field.is_null())
    }

    pub fn where_not_null<F: Into<FieldRef>>(self, field: F) -> Self {
        let field: FieldRef = field.into();
        self.where_(field.is_not_null())
    }

    pub fn where_like<F: Into<FieldRef>>(self, field: F, pattern: impl ToValue) -> Self {
        let field: FieldRef = field.into();
        self.where_(field.like(pattern))
    }

    /// `col LIKE '%' || @k || '%'`, wrapping the bound text in the dialect's
    /// wildcard with its concatenation syntax.
    pub fn where_contains<F: Into<FieldRef>>(self, field: F, text: &str) -> Self {
        let field: FieldRef = field.into();
        let text = Value::String(text.to_string());
        self.apply(|s| {
            let dialect = s.ctx.dialect();
            let column = s.ctx.quoted_field(&field)?;
            let wildcard = dialect.string_literal(&dialect.wildcard.to_string());
            let pattern = dialect.concat(&[wildcard.as_str(), "@0", wildcard.as_str()]);
            let condition = s.push_args(&format!("{} LIKE {}", column, pattern), vec![text])?;
            s.push_where(&condition);
            Ok(())
        })
    }

    /// OR together several WHERE groups, each built on its own builder:
    /// `WHERE ((g1)) OR ((g2))`. No groups is a no-op.
    pub fn where_any<I>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = Sql>,
    {
        let groups: Vec<Sql> = groups.into_iter().collect();
        self.apply(|s| {
            if groups.is_empty() {
                return Ok(());
            }
            let mut parts = Vec::with_capacity(groups.len());
            for group in groups {
                if let Some(err) = group.error {
                    return Err(err);
                }
                let text = group
                    .text
                    .strip_prefix("WHERE ")
                    .unwrap_or(&group.text)
                    .to_string();
                let shifted = s.push_args(&text, group.args)?;
                parts.push(format!("({})", shifted));
            }
            s.push_where(&parts.join(" OR "));
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // ORDER BY / GROUP BY
    // -------------------------------------------------------------------------

    /// `ORDER BY cols`. An empty list orders by every column of `R`.
    pub fn order_by<R: Record>(self, fields: &[Field<R>]) -> Self {
        self.by_record::<R>(Clause::OrderBy, fields, false)
    }

    pub fn order_by_desc<R: Record>(self, fields: &[Field<R>]) -> Self {
        self.by_record::<R>(Clause::OrderBy, fields, true)
    }

    /// `ORDER BY` over fields of possibly different record types.
    pub fn order_by_ref<I>(self, fields: I, descending: bool) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        let fields: Vec<FieldRef> = fields.into_iter().map(Into::into).collect();
        self.apply(|s| {
            if fields.is_empty() {
                return Err(DbError::builder("ORDER BY needs at least one field"));
            }
            let columns = s.qualified_list(fields, None)?;
            s.push_by(Clause::OrderBy, columns, descending);
            Ok(())
        })
    }

    /// `GROUP BY cols`. An empty list groups by every column of `R`.
    pub fn group_by<R: Record>(self, fields: &[Field<R>]) -> Self {
        self.by_record::<R>(Clause::GroupBy, fields, false)
    }

    /// Continue the preceding ORDER BY or GROUP BY list.
    pub fn and_by<R: Record>(self, fields: &[Field<R>]) -> Self {
        self.continue_by::<R>(fields, false)
    }

    pub fn and_by_desc<R: Record>(self, fields: &[Field<R>]) -> Self {
        self.continue_by::<R>(fields, true)
    }

    fn continue_by<R: Record>(self, fields: &[Field<R>], descending: bool) -> Self {
        let kind = if self.last == Clause::GroupBy {
            Clause::GroupBy
        } else {
            Clause::OrderBy
        };
        self.by_record::<R>(kind, fields, descending)
    }

    fn by_record<R: Record>(self, kind: Clause, fields: &[Field<R>], descending: bool) -> Self {
        let fields: Vec<FieldRef> = fields.iter().map(|f| f.field()).collect();
        self.apply(|s| {
            let all = if fields.is_empty() {
                Some(s.all_columns::<R>()?)
            } else {
                None
            };
            let columns = s.qualified_list(fields, all.as_deref())?;
            s.push_by(kind, columns, descending);
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // UPDATE / DELETE
    // -------------------------------------------------------------------------

    /// `UPDATE t SET c = @k, ...`.
    ///
    /// A NULL value renders `c = NULL` and an empty string renders `c = ''`;
    /// everything else is bound as an argument.
    pub fn update<R: Record>(self, set: impl FnOnce(Updates<R>) -> Updates<R>) -> Self {
        let updates = set(Updates::new());
        self.apply(|s| {
            if updates.sets.is_empty() {
                return Err(DbError::builder("UPDATE needs at least one SET clause"));
            }
            let table = s.ctx.quoted_table::<R>()?;
            let mut clauses = Vec::with_capacity(updates.sets.len());
            for (field, value) in updates.sets {
                let column = s.ctx.quoted_column(&field.field())?;
                let rhs = match value {
                    Value::Null => "NULL".to_string(),
                    Value::String(ref text) if text.is_empty() => "''".to_string(),
                    value => {
                        s.args.push(value);
                        format!("@{}", s.args.len() - 1)
                    }
                };
                clauses.push(format!("{} = {}", column, rhs));
            }
            s.push(&format!("UPDATE {} SET {}", table, clauses.join(", ")));
            s.last = Clause::Other;
            Ok(())
        })
    }

    /// Bare `UPDATE t`, for a SET clause supplied through [`append`](Self::append).
    pub fn update_table<R: Record>(self) -> Self {
        self.apply(|s| {
            let table = s.ctx.quoted_table::<R>()?;
            s.push(&format!("UPDATE {}", table));
            s.last = Clause::Other;
            Ok(())
        })
    }

    /// Bare `DELETE`, to be followed by `from`.
    pub fn delete(self) -> Self {
        self.apply(|s| {
            s.push("DELETE");
            s.last = Clause::Other;
            Ok(())
        })
    }

    pub fn delete_from<R: Record>(self) -> Self {
        self.apply(|s| {
            let table = s.ctx.quoted_table::<R>()?;
            s.push(&format!("DELETE FROM {}", table));
            s.last = Clause::From;
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Locking, paging, composition
    // -------------------------------------------------------------------------

    /// Request the dialect's pessimistic row lock for the selected rows.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Skip `skip` rows and return at most `take`.
    pub fn page(mut self, skip: u64, take: u64) -> Self {
        self.paging = Some((skip, take));
        self
    }

    /// Raw fragment with its own `@0..` placeholders.
    pub fn append(self, text: &str, args: Vec<Value>) -> Self {
        self.apply(|s| {
            let fragment = s.push_args(text, args)?;
            s.push(&fragment);
            s.last = Clause::Other;
            Ok(())
        })
    }

    /// `... UNION other`.
    pub fn union(self, other: Sql) -> Self {
        self.apply(|s| {
            let other = other.build()?;
            let fragment = s.push_args(&other.sql, other.args)?;
            s.push(&format!("UNION {}", fragment));
            s.output_names.clear();
            s.last = Clause::Other;
            Ok(())
        })
    }

    /// Let the retry layer re-execute the finished statement on a transient
    /// failure.
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Finish the statement: apply paging and the lock hint, then check that
    /// placeholders and arguments match.
    pub fn build(self) -> DbResult<Statement> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let dialect = self.ctx.dialect();
        let mut sql = self.text;

        if let (true, LockHint::Table(hint)) = (self.for_update, &dialect.lock_hint) {
            let anchor = self
                .lock_anchor
                .ok_or_else(|| DbError::builder("for_update requires a FROM clause"))?;
            sql.insert_str(anchor, &format!(" {}", hint));
        }

        match (self.paging, dialect.paging) {
            (Some((skip, take)), PagingStyle::LimitOffset) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", take, skip));
            }
            (Some((skip, take)), PagingStyle::TopOffsetFetch) => {
                if !self.has_order_by {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                }
                sql.push_str(&format!(
                    " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    skip, take
                ));
            }
            (None, _) => {
                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {}", limit));
                }
            }
        }

        if let (true, LockHint::Suffix(hint)) = (self.for_update, &dialect.lock_hint) {
            sql.push(' ');
            sql.push_str(hint);
        }

        placeholder::validate(&sql, self.args.len(), dialect.uses_brackets())?;
        Ok(Statement {
            sql,
            args: self.args,
            retryable: self.retryable,
        })
    }

    /// SQL plus an argument listing, for diagnostics.
    pub fn to_text(&self) -> DbResult<String> {
        self.clone().build().map(|stmt| stmt.to_text())
    }
}

/// A join target awaiting its `ON` condition.
#[derive(Debug, Clone)]
pub struct JoinClause {
    sql: Sql,
}

impl JoinClause {
    fn new(sql: Sql) -> Self {
        Self { sql }
    }

    /// `ON predicate`, usually a typed equality across two record types.
    pub fn on(self, predicate: Predicate) -> Sql {
        self.sql.apply(|s| {
            let condition = predicate.render(&s.ctx, &mut s.args)?;
            s.text.push_str(&format!(" ON {}", condition));
            Ok(())
        })
    }

    /// `ON` with a raw fragment and its own `@0..` placeholders.
    pub fn on_raw(self, text: &str, args: Vec<Value>) -> Sql {
        self.sql.apply(|s| {
            let condition = s.push_args(text, args)?;
            s.text.push_str(&format!(" ON {}", condition));
            Ok(())
        })
    }
}

/// SET list for [`Sql::update`].
pub struct Updates<R> {
    sets: Vec<(Field<R>, Value)>,
}

impl<R: Record> Updates<R> {
    fn new() -> Self {
        Self { sets: Vec::new() }
    }

    pub fn set(mut self, field: Field<R>, value: impl ToValue) -> Self {
        self.sets.push((field, value.to_value()));
        self
    }
}
