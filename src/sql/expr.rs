//! Typed predicates.
//!
//! Predicates are built from [`Field`] constants (`Widget::NAME.eq("A")`) and
//! rendered against a [`SqlContext`], which resolves every field to its quoted
//! `table.column` form and appends values as positional arguments.

use crate::dialect::placeholder;
use crate::error::DbResult;
use crate::metadata::{Field, FieldRef, Record};
use crate::models::{ToValue, Value};
use crate::sql::context::SqlContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// `field op value`
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Value,
    },
    /// `left op right`, typically a join condition across two record types.
    Columns {
        left: FieldRef,
        op: CompareOp,
        right: FieldRef,
    },
    Null {
        field: FieldRef,
        negated: bool,
    },
    In {
        field: FieldRef,
        values: Vec<Value>,
        negated: bool,
    },
    Like {
        field: FieldRef,
        pattern: Value,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Raw text with its own local `@0..` placeholders.
    Raw { text: String, args: Vec<Value> },
}

impl Predicate {
    pub fn raw(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Raw {
            text: text.into(),
            args,
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    fn is_compound(&self) -> bool {
        matches!(self, Self::And(_) | Self::Or(_))
    }

    /// Render to SQL, appending bound values to `args`.
    pub fn render(&self, ctx: &SqlContext, args: &mut Vec<Value>) -> DbResult<String> {
        match self {
            Self::Compare { field, op, value } => {
                let column = ctx.quoted_field(field)?;
                match (op, value) {
                    (CompareOp::Eq, Value::Null) => Ok(format!("{} IS NULL", column)),
                    (CompareOp::Ne, Value::Null) => Ok(format!("{} IS NOT NULL", column)),
                    _ => Ok(format!("{} {} {}", column, op.as_sql(), bind(args, value.clone()))),
                }
            }
            Self::Columns { left, op, right } => Ok(format!(
                "{} {} {}",
                ctx.quoted_field(left)?,
                op.as_sql(),
                ctx.quoted_field(right)?
            )),
            Self::Null { field, negated } => Ok(format!(
                "{} IS {}NULL",
                ctx.quoted_field(field)?,
                if *negated { "NOT " } else { "" }
            )),
            Self::In {
                field,
                values,
                negated,
            } => {
                let column = ctx.quoted_field(field)?;
                if values.is_empty() {
                    // nothing is IN an empty set; everything is NOT IN it
                    return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let list: Vec<String> = values.iter().map(|v| bind(args, v.clone())).collect();
                Ok(format!(
                    "{} {}IN ({})",
                    column,
                    if *negated { "NOT " } else { "" },
                    list.join(",")
                ))
            }
            Self::Like {
                field,
                pattern,
                negated,
            } => Ok(format!(
                "{} {}LIKE {}",
                ctx.quoted_field(field)?,
                if *negated { "NOT " } else { "" },
                bind(args, pattern.clone())
            )),
            Self::And(items) => render_joined(ctx, args, items, " AND ", "1 = 1"),
            Self::Or(items) => render_joined(ctx, args, items, " OR ", "1 = 0"),
            Self::Not(inner) => Ok(format!("NOT ({})", inner.render(ctx, args)?)),
            Self::Raw { text, args: local } => {
                let brackets = ctx.dialect().uses_brackets();
                placeholder::validate(text, local.len(), brackets)?;
                let shifted = placeholder::renumber(text, args.len(), brackets)?;
                args.extend(local.iter().cloned());
                Ok(shifted)
            }
        }
    }
}

fn bind(args: &mut Vec<Value>, value: Value) -> String {
    args.push(value);
    format!("@{}", args.len() - 1)
}

fn render_joined(
    ctx: &SqlContext,
    args: &mut Vec<Value>,
    items: &[Predicate],
    separator: &str,
    empty: &str,
) -> DbResult<String> {
    if items.is_empty() {
        return Ok(empty.to_string());
    }
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let text = item.render(ctx, args)?;
        if item.is_compound() {
            parts.push(format!("({})", text));
        } else {
            parts.push(text);
        }
    }
    Ok(parts.join(separator))
}

// =============================================================================
// Predicate constructors on fields
// =============================================================================

impl FieldRef {
    fn compare(self, op: CompareOp, value: impl ToValue) -> Predicate {
        Predicate::Compare {
            field: self,
            op,
            value: value.to_value(),
        }
    }

    pub fn eq(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl ToValue) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    /// Column-to-column equality, e.g. a join condition.
    pub fn eq_field(self, other: impl Into<FieldRef>) -> Predicate {
        Predicate::Columns {
            left: self,
            op: CompareOp::Eq,
            right: other.into(),
        }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::Null {
            field: self,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::Null {
            field: self,
            negated: true,
        }
    }

    pub fn in_<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        Predicate::In {
            field: self,
            values: values.into_iter().map(|v| v.to_value()).collect(),
            negated: false,
        }
    }

    pub fn not_in<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        Predicate::In {
            field: self,
            values: values.into_iter().map(|v| v.to_value()).collect(),
            negated: true,
        }
    }

    pub fn like(self, pattern: impl ToValue) -> Predicate {
        Predicate::Like {
            field: self,
            pattern: pattern.to_value(),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: impl ToValue) -> Predicate {
        Predicate::Like {
            field: self,
            pattern: pattern.to_value(),
            negated: true,
        }
    }
}

impl<R: Record> Field<R> {
    pub fn eq(self, value: impl ToValue) -> Predicate {
        self.field().eq(value)
    }

    pub fn ne(self, value: impl ToValue) -> Predicate {
        self.field().ne(value)
    }

    pub fn lt(self, value: impl ToValue) -> Predicate {
        self.field().lt(value)
    }

    pub fn le(self, value: impl ToValue) -> Predicate {
        self.field().le(value)
    }

    pub fn gt(self, value: impl ToValue) -> Predicate {
        self.field().gt(value)
    }

    pub fn ge(self, value: impl ToValue) -> Predicate {
        self.field().ge(value)
    }

    pub fn eq_field(self, other: impl Into<FieldRef>) -> Predicate {
        self.field().eq_field(other)
    }

    pub fn is_null(self) -> Predicate {
        self.field().is_null()
    }

    pub fn is_not_null(self) -> Predicate {
        self.field().is_not_null()
    }

    pub fn in_<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.field().in_(values)
    }

    pub fn not_in<I>(self, values: I) -> Predicate
    where
        I: IntoIterator,
        I::Item: ToValue,
    {
        self.field().not_in(values)
    }

    pub fn like(self, pattern: impl ToValue) -> Predicate {
        self.field().like(pattern)
    }

    pub fn not_like(self, pattern: impl ToValue) -> Predicate {
        self.field().not_like(pattern)
    }
}
