use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Quotes an identifier for SQL Server, doubling any closing brackets.
pub fn quote_ident(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

/// A schema-qualified table name.
///
/// Equality and hashing are case-insensitive, matching the default collation
/// behaviour of SQL Server identifiers. The original casing is preserved for
/// display and SQL rendering.
#[derive(Debug, Clone)]
pub struct TableRef {
    schema: String,
    name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parses `schema.name`, defaulting a bare `name` to the `dbo` schema.
    pub fn parse(qualified: &str) -> Self {
        match qualified.split_once('.') {
            Some((schema, name)) => Self::new(schema, name),
            None => Self::new("dbo", qualified),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `schema.name`, as serialized in reports and accepted from selections.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// `[schema].[name]`, as rendered into SQL statements.
    pub fn bracketed(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// Canonical lowercase `schema.name`, the key used by name-indexed maps.
    pub fn lookup_key(&self) -> String {
        format!(
            "{}.{}",
            self.schema.to_lowercase(),
            self.name.to_lowercase()
        )
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.schema.eq_ignore_ascii_case(&other.schema)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for TableRef {}

impl Hash for TableRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema.to_lowercase().hash(state);
        self.name.to_lowercase().hash(state);
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl Serialize for TableRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified())
    }
}

impl<'de> Deserialize<'de> for TableRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableRefVisitor;

        impl Visitor<'_> for TableRefVisitor {
            type Value = TableRef;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a `schema.name` qualified table name")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<TableRef, E> {
                Ok(TableRef::parse(value))
            }
        }

        deserializer.deserialize_str(TableRefVisitor)
    }
}

/// One column of a table as reported by the catalog.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub ordinal: i32,
    pub is_identity: bool,
    pub is_computed: bool,
    pub is_generated_always: bool,
}

impl ColumnInfo {
    /// Whether the column can appear in a sync projection. Computed and
    /// generated-always columns are owned by the server and never written.
    pub fn is_projectable(&self) -> bool {
        !self.is_computed && !self.is_generated_always
    }
}

/// An enabled foreign-key edge from a referencing (child) table to the
/// referenced (parent) table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub child: TableRef,
    pub parent: TableRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn table_ref_equality_is_case_insensitive() {
        let a = TableRef::new("dbo", "Users");
        let b = TableRef::new("DBO", "users");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn table_ref_preserves_original_casing() {
        let t = TableRef::new("Sales", "OrderLines");
        assert_eq!(t.qualified(), "Sales.OrderLines");
        assert_eq!(t.bracketed(), "[Sales].[OrderLines]");
        assert_eq!(t.lookup_key(), "sales.orderlines");
    }

    #[test]
    fn parse_defaults_to_dbo() {
        assert_eq!(TableRef::parse("Users"), TableRef::new("dbo", "Users"));
        assert_eq!(
            TableRef::parse("sales.Orders"),
            TableRef::new("sales", "Orders")
        );
    }

    #[test]
    fn quote_ident_doubles_closing_brackets() {
        assert_eq!(quote_ident("plain"), "[plain]");
        assert_eq!(quote_ident("odd]name"), "[odd]]name]");
    }

    #[test]
    fn table_ref_serializes_as_qualified_name() {
        let t = TableRef::new("dbo", "Users");
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"dbo.Users\"");
        let back: TableRef = serde_json::from_str("\"dbo.Users\"").unwrap();
        assert_eq!(back, t);
    }
}
