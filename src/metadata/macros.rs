//! Declarative record mapping.

/// Define a struct mapped to a table.
///
/// Generates the struct, one `Field` constant per member and the `Record`
/// implementation. Column flags are given as attributes on the member line:
/// `#[primary_key]`, `#[auto_increment]` (implies primary key) and
/// `#[result_only]`. Omitting `in "Table"` leaves the table name empty, which
/// the builder rejects before generating SQL.
///
/// # Example
///
/// ```ignore
/// define_record! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Widget in "Widget" {
///         #[auto_increment]
///         ID => pub id: Option<i64> = "Id",
///         NAME => pub name: String = "Name",
///         PRICE => pub price: f64 = "Price",
///     }
/// }
/// ```
///
/// Unknown flags are rejected at compile time:
///
/// ```compile_fail
/// sqlbridge::define_record! {
///     pub struct Typo in "Typo" {
///         #[primary_kye]
///         ID => pub id: i64 = "Id",
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $table:literal {
            $(
                $(#[$flag:ident])*
                $konst:ident => $fvis:vis $field:ident : $ty:ty = $column:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $ty, )*
        }

        impl $name {
            $(
                pub const $konst: $crate::metadata::Field<$name> =
                    $crate::metadata::Field::new(stringify!($field));
            )*
        }

        impl $crate::metadata::Record for $name {
            fn definition() -> $crate::metadata::RecordDefinition {
                $crate::metadata::RecordDefinition::new($table)
                    $(
                        .column(
                            $crate::metadata::ColumnSpec::new(stringify!($field), $column)
                                .with_flags(&[$($crate::column_flag!($flag)),*]),
                        )
                    )*
            }

            fn values(&self) -> ::std::vec::Vec<$crate::models::Value> {
                ::std::vec![$( $crate::models::ToValue::to_value(&self.$field) ),*]
            }

            fn from_row(row: &$crate::models::Row) -> $crate::error::DbResult<Self> {
                Ok(Self {
                    $( $field: row.get_as::<$ty>($column)?, )*
                })
            }
        }
    };

    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident { $($body:tt)* }
    ) => {
        $crate::define_record! {
            $(#[$meta])*
            $vis struct $name in "" { $($body)* }
        }
    };
}

/// Map a `define_record!` flag attribute to its [`ColumnFlag`](crate::metadata::ColumnFlag).
#[doc(hidden)]
#[macro_export]
macro_rules! column_flag {
    (primary_key) => {
        $crate::metadata::ColumnFlag::PrimaryKey
    };
    (auto_increment) => {
        $crate::metadata::ColumnFlag::AutoIncrement
    };
    (result_only) => {
        $crate::metadata::ColumnFlag::ResultOnly
    };
    ($other:ident) => {
        compile_error!(concat!(
            "unknown column flag `",
            stringify!($other),
            "`, expected primary_key, auto_increment or result_only"
        ))
    };
}

pub use define_record;
