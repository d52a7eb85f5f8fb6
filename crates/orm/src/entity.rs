use anyhow::Result;
use sea_query::Value;

use crate::Row;
use crate::filter::{Cmp, Column, Filter};
use crate::join::Join;
use crate::select::OrderSpec;

/// Declares an ORM entity together with its probe.
///
/// The probe is a struct of the same fields wrapped in `Option`: `None` leaves
/// a field out, `Some(v)` filters by (or assigns) `v`, zero values included.
///
/// Optional settings, in this order:
///
/// - `key = field`: primary key column (defaults to `id`); the field must be
///   an `i64` and the entity implements [`Record`];
/// - `auto_id = bool`: after `key`, whether inserts generate ids for a zero
///   key (defaults to `false`);
/// - `columns = [(table, column, field), ...]`: fields read from joined tables;
/// - `joins = [Join, ...]`: joins applied to every select.
///
/// # Examples
///
/// ```ignore
/// entity! {
///     table = "posts",
///     probe = PostProbe,
///     key = id,
///     auto_id = true,
///     #[derive(Debug, Clone)]
///     pub struct Post {
///         pub id: i64,
///         pub title: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! entity {
    (
        table = $table:literal,
        probe = $probe:ident,
        $($rest:tt)*
    ) => {
        $crate::entity! { @key [$table, $probe] $($rest)* }
    };

    (@key [$($head:tt)*] key = $key:ident, auto_id = $auto:literal, $($rest:tt)*) => {
        $crate::entity! { @columns [$($head)*, key = [$key], record = [$key, $auto]] $($rest)* }
    };
    (@key [$($head:tt)*] key = $key:ident, $($rest:tt)*) => {
        $crate::entity! { @columns [$($head)*, key = [$key], record = [$key, false]] $($rest)* }
    };
    (@key [$($head:tt)*] $($rest:tt)*) => {
        $crate::entity! { @columns [$($head)*, key = [], record = []] $($rest)* }
    };

    (@columns [$($head:tt)*] columns = [$($columns:tt)*], $($rest:tt)*) => {
        $crate::entity! { @joins [$($head)*, columns = [$($columns)*]] $($rest)* }
    };
    (@columns [$($head:tt)*] $($rest:tt)*) => {
        $crate::entity! { @joins [$($head)*, columns = []] $($rest)* }
    };

    (@joins [$($head:tt)*] joins = [$($joins:tt)*], $($rest:tt)*) => {
        $crate::entity! { @emit [$($head)*, joins = [$($joins)*]] $($rest)* }
    };
    (@joins [$($head:tt)*] $($rest:tt)*) => {
        $crate::entity! { @emit [$($head)*, joins = []] $($rest)* }
    };

    (
        @emit [
            $table:literal, $probe:ident,
            key = [$($key:ident)?],
            record = [$($record_key:ident, $auto_id:literal)?],
            columns = [$( ($col_table:literal, $col_name:literal, $col_field:literal) ),* $(,)?],
            joins = [$($join:expr),* $(,)?]
        ]
        $(#[$meta:meta])*
        pub struct $struct_name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field_name:ident : $field_type:ty
            ),* $(,)?
        }
    ) => {
        #[allow(missing_docs)]
        $(#[$meta])*
        pub struct $struct_name {
            $(
                $(#[$field_meta])*
                pub $field_name : $field_type
            ),*
        }

        #[allow(missing_docs)]
        #[derive(Debug, Clone, Default)]
        pub struct $probe {
            $(
                pub $field_name : Option<$field_type>
            ),*
        }

        impl $crate::Entity for $struct_name {
            const TABLE: &'static str = $table;
            $(const PRIMARY_KEY: &'static str = stringify!($key);)?

            fn projection() -> &'static [&'static str] {
                &[ $( stringify!($field_name) ),* ]
            }

            fn joins() -> Vec<$crate::Join> {
                vec![$($join),*]
            }

            fn column_specs() -> Vec<(&'static str, &'static str, &'static str)> {
                vec![$( ($col_field, $col_table, $col_name) ),*]
            }

            fn from_row(row: &$crate::Row) -> $crate::__private::anyhow::Result<Self> {
                Ok(Self {
                    $(
                        $field_name: <$field_type as $crate::FetchValue>::fetch(row, stringify!($field_name))?,
                    )*
                })
            }

            fn values(&self) -> Vec<(&'static str, $crate::Value)> {
                vec![
                    $(
                        (stringify!($field_name), self.$field_name.clone().into()),
                    )*
                ]
            }
        }

        $(
            impl $crate::Record for $struct_name {
                fn pk(&self) -> i64 {
                    self.$record_key
                }

                fn set_pk(&mut self, id: i64) {
                    self.$record_key = id;
                }

                fn use_auto_id(&self) -> bool {
                    $auto_id
                }
            }
        )?

        impl $crate::Probe for $probe {
            type Entity = $struct_name;

            fn values(&self) -> Vec<(&'static str, $crate::Value)> {
                let mut values = Vec::new();
                $(
                    if let Some(value) = &self.$field_name {
                        values.push((stringify!($field_name), value.clone().into()));
                    }
                )*
                values
            }

            fn hydrate(&mut self, row: &$crate::Row) -> $crate::__private::anyhow::Result<()> {
                $(
                    if $crate::has_column(row, stringify!($field_name)) {
                        self.$field_name = Some(
                            <$field_type as $crate::FetchValue>::fetch(row, stringify!($field_name))?,
                        );
                    }
                )*
                Ok(())
            }
        }

        impl TryFrom<$probe> for $struct_name {
            type Error = $crate::__private::anyhow::Error;

            fn try_from(probe: $probe) -> $crate::__private::anyhow::Result<Self> {
                Ok(Self {
                    $(
                        $field_name: probe.$field_name.ok_or_else(|| {
                            $crate::__private::anyhow::anyhow!(
                                "field '{}' of '{}' is unset",
                                stringify!($field_name),
                                $table
                            )
                        })?,
                    )*
                })
            }
        }

        impl From<$struct_name> for $probe {
            fn from(entity: $struct_name) -> Self {
                Self {
                    $(
                        $field_name: Some(entity.$field_name),
                    )*
                }
            }
        }
    };
}

/// Trait for database entities with metadata for query building.
///
/// Typically implemented via the `entity!` macro rather than manually.
pub trait Entity: Sized {
    /// The database table name for this entity.
    const TABLE: &'static str;

    /// Primary key column.
    const PRIMARY_KEY: &'static str = "id";

    /// Column names to select when fetching this entity.
    fn projection() -> &'static [&'static str];

    /// Default ordering specification for queries.
    #[must_use]
    fn ordering() -> Vec<OrderSpec> {
        Vec::new()
    }

    /// Default joins to include when querying this entity.
    #[must_use]
    fn joins() -> Vec<Join> {
        Vec::new()
    }

    /// Column specifications for fields from joined tables.
    /// Returns tuples of (``struct_field``, ``source_table``, ``source_column``).
    /// Fields not listed here will be auto-qualified with the main table.
    #[must_use]
    fn column_specs() -> Vec<(&'static str, &'static str, &'static str)> {
        Vec::new()
    }

    /// Construct an entity instance from a database row.
    ///
    /// # Errors
    ///
    /// Returns an error if any required column is missing or cannot be converted to the expected type.
    fn from_row(row: &Row) -> Result<Self>;

    /// Every field value, keyed by field name, in projection order.
    fn values(&self) -> Vec<(&'static str, Value)>;
}

/// An entity whose `i64` primary key may be assigned by an id generator.
pub trait Record: Entity {
    /// Current primary key; `0` when not yet assigned.
    fn pk(&self) -> i64;

    /// Assign the primary key.
    fn set_pk(&mut self, id: i64);

    /// Whether inserts should assign a generated id when the key is `0`.
    fn use_auto_id(&self) -> bool {
        true
    }
}

/// A partially-populated mirror of an [`Entity`], used both as a filter and as
/// a target for hydration.
pub trait Probe: Default {
    /// The entity this probe mirrors.
    type Entity: Entity;

    /// The set fields, keyed by field name.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Overwrite the fields present in `row`, leaving the others untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if a present column cannot be converted to its field type.
    fn hydrate(&mut self, row: &Row) -> Result<()>;

    /// Whether no field is set.
    fn is_empty(&self) -> bool {
        self.values().is_empty()
    }

    /// The value of a set field.
    fn value(&self, field: &str) -> Option<Value> {
        self.values().into_iter().find(|(name, _)| *name == field).map(|(_, value)| value)
    }

    /// Equality on every set field, `None` when nothing is set. A field set to
    /// `NULL` becomes an `IS NULL` test.
    fn filter(&self) -> Option<Filter> {
        let specs = Self::Entity::column_specs();

        let mut filters: Vec<Filter> = self
            .values()
            .into_iter()
            .map(|(field, value)| {
                let column = specs
                    .iter()
                    .find(|(name, _, _)| *name == field)
                    .map_or(Column::new(field), |&(_, table, column)| Column::of(table, column));
                if value == value.as_null() {
                    Filter::IsNull(column)
                } else {
                    Filter::Cmp(column, Cmp::Eq, value)
                }
            })
            .collect();

        match filters.len() {
            0 | 1 => filters.pop(),
            _ => Some(Filter::And(filters)),
        }
    }
}
