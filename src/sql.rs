//! SQL text generation for dynamic tables.
//!
//! Every builder returns the statement text together with its positional
//! arguments. Values never appear in the text.

use crate::core::db::schema::{Column, TableSchema};
use crate::core::{Result, TablekitError, Value};
use crate::row::Record;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

static PLAIN_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// SQLite's keyword table. Any of these is quoted when used as a name.
const KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

/// Statement text plus the values for its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Writes an identifier bare when it is safe to, double-quoted otherwise.
pub fn quote_ident(name: &str) -> Cow<'_, str> {
    let reserved = KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(name));
    if PLAIN_IDENT.is_match(name) && !reserved {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// `p1 = ? AND p2 = ?` over the primary key, in declaration order.
///
/// Fails before anything is sent to the backend when the table has no
/// primary key or the number of values is wrong.
fn pk_where(schema: &TableSchema, pk: &[Value]) -> Result<(String, Vec<Value>)> {
    let columns = schema.primary_key();
    if columns.is_empty() {
        return Err(TablekitError::NoPrimaryKey(schema.name().to_string()));
    }
    if columns.len() != pk.len() {
        return Err(TablekitError::PrimaryKeyArity {
            table: schema.name().to_string(),
            expected: columns.len(),
            got: pk.len(),
        });
    }
    let clause = columns
        .iter()
        .map(|c| format!("{} = ?", quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok((clause, pk.to_vec()))
}

/// Supplied record fields in schema order. Fields naming no column are rejected.
fn supplied_columns<'s>(
    schema: &'s TableSchema,
    record: &Record,
) -> Result<Vec<(&'s Column, Value)>> {
    if let Some(unknown) = record.field_names().find(|name| !schema.has_column(name)) {
        return Err(TablekitError::UnknownColumn {
            table: schema.name().to_string(),
            column: unknown.to_string(),
        });
    }
    Ok(schema
        .columns()
        .iter()
        .filter_map(|c| record.get(&c.name).bound_value().map(|v| (c, v)))
        .collect())
}

pub fn select_all(schema: &TableSchema) -> SqlStatement {
    SqlStatement {
        sql: format!("SELECT * FROM {}", quote_ident(schema.name())),
        params: Vec::new(),
    }
}

pub fn select_by_pk(schema: &TableSchema, pk: &[Value]) -> Result<SqlStatement> {
    let (clause, params) = pk_where(schema, pk)?;
    Ok(SqlStatement {
        sql: format!("SELECT * FROM {} WHERE {}", quote_ident(schema.name()), clause),
        params,
    })
}

pub fn exists_by_pk(schema: &TableSchema, pk: &[Value]) -> Result<SqlStatement> {
    let (clause, params) = pk_where(schema, pk)?;
    Ok(SqlStatement {
        sql: format!(
            "SELECT 1 FROM {} WHERE {} LIMIT 1",
            quote_ident(schema.name()),
            clause
        ),
        params,
    })
}

pub fn insert(schema: &TableSchema, record: &Record) -> Result<SqlStatement> {
    let supplied = supplied_columns(schema, record)?;
    let table = quote_ident(schema.name());
    if supplied.is_empty() {
        return Ok(SqlStatement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", table),
            params: Vec::new(),
        });
    }
    let names = supplied
        .iter()
        .map(|(c, _)| quote_ident(&c.name).into_owned())
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; supplied.len()].join(", ");
    Ok(SqlStatement {
        sql: format!("INSERT INTO {} ({}) VALUES ({})", table, names, placeholders),
        params: supplied.into_iter().map(|(_, v)| v).collect(),
    })
}

/// `None` when the record supplies nothing to change.
pub fn update(schema: &TableSchema, record: &Record, pk: &[Value]) -> Result<Option<SqlStatement>> {
    let (clause, pk_params) = pk_where(schema, pk)?;
    let supplied = supplied_columns(schema, record)?;
    if supplied.is_empty() {
        return Ok(None);
    }
    let assignments = supplied
        .iter()
        .map(|(c, _)| format!("{} = ?", quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params: Vec<Value> = supplied.into_iter().map(|(_, v)| v).collect();
    params.extend(pk_params);
    Ok(Some(SqlStatement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(schema.name()),
            assignments,
            clause
        ),
        params,
    }))
}

pub fn delete(schema: &TableSchema, pk: &[Value]) -> Result<SqlStatement> {
    let (clause, params) = pk_where(schema, pk)?;
    Ok(SqlStatement {
        sql: format!("DELETE FROM {} WHERE {}", quote_ident(schema.name()), clause),
        params,
    })
}

/// Renders the CREATE TABLE statement for a schema.
pub fn create_table(schema: &TableSchema) -> String {
    let mut lines: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| {
            let mut line = quote_ident(&c.name).into_owned();
            if !c.declared_type.is_empty() {
                line.push(' ');
                line.push_str(&c.declared_type);
            }
            if !c.nullable {
                line.push_str(" NOT NULL");
            }
            if let Some(default) = &c.default {
                line.push_str(" DEFAULT ");
                line.push_str(default);
            }
            line
        })
        .collect();

    let pk = schema.primary_key();
    if !pk.is_empty() {
        let names = pk
            .iter()
            .map(|c| quote_ident(&c.name).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("PRIMARY KEY ({})", names));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        quote_ident(schema.name()),
        lines.join(",\n    ")
    )
}
