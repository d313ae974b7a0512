/// Query Execution Module
///
/// Parameter binding and the cursor adapter that turns SQLite rows into
/// ordered tuples of [`Value`].

use crate::core::value::Value;
use crate::core::{Result, TablekitError};
use crate::row::Row;
use rusqlite::{Rows, Statement};

/// Arguments bound to a statement's placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    /// Bound to `?` / `?N` placeholders, first value to index 1
    Positional(Vec<Value>),
    /// Bound to `:name`, `@name` or `$name` placeholders. Names may be given
    /// with or without their prefix.
    Named(Vec<(String, Value)>),
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Params::Positional(values.to_vec())
    }
}

impl From<Vec<(String, Value)>> for Params {
    fn from(values: Vec<(String, Value)>) -> Self {
        Params::Named(values)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl Params {
    /// Binds every argument onto a prepared statement.
    pub(crate) fn bind(&self, stmt: &mut Statement<'_>) -> rusqlite::Result<()> {
        match self {
            Params::None => Ok(()),
            Params::Positional(values) => {
                let expected = stmt.parameter_count();
                if values.len() != expected {
                    return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected));
                }
                for (i, value) in values.iter().enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
                Ok(())
            }
            Params::Named(values) => {
                for (name, value) in values {
                    let index = named_index(stmt, name)?
                        .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.clone()))?;
                    stmt.raw_bind_parameter(index, value)?;
                }
                Ok(())
            }
        }
    }
}

fn named_index(stmt: &Statement<'_>, name: &str) -> rusqlite::Result<Option<usize>> {
    if name.starts_with(|c| matches!(c, ':' | '@' | '$')) {
        return stmt.parameter_index(name);
    }
    for prefix in [':', '@', '$'] {
        if let Some(index) = stmt.parameter_index(&format!("{}{}", prefix, name))? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// Result of executing one statement.
///
/// Read-only statements that return columns are stepped lazily as tuples
/// are pulled. Statements without result columns, and writes with a
/// `RETURNING` clause, run to completion before [`Connection::execute`]
/// returns, so the write happens even if the cursor is never read.
///
/// The cursor is single-pass: once [`CursorResult::tuples`] or
/// [`CursorResult::rows`] has been called, further calls yield nothing and
/// the query is never re-run. The statement is finalized when this value
/// is dropped.
///
/// [`Connection::execute`]: crate::core::db::Connection::execute
pub struct CursorResult<'conn> {
    stmt: Statement<'conn>,
    columns: Vec<String>,
    rowcount: usize,
    /// Rows of a write statement, read eagerly
    buffered: Option<Vec<Vec<Value>>>,
    consumed: bool,
}

impl<'conn> CursorResult<'conn> {
    /// Wraps a prepared and bound statement, running it right away unless
    /// it is a read-only query.
    pub(crate) fn new(mut stmt: Statement<'conn>) -> rusqlite::Result<Self> {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rowcount = 0;
        let mut buffered = None;
        if columns.is_empty() {
            rowcount = stmt.raw_execute()?;
        } else if !stmt.readonly() {
            let mut tuples = Vec::new();
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next()? {
                tuples.push(read_tuple(row, columns.len())?);
            }
            rowcount = tuples.len();
            buffered = Some(tuples);
        }
        Ok(CursorResult {
            stmt,
            consumed: columns.is_empty(),
            columns,
            rowcount,
            buffered,
        })
    }

    /// Result column names in SELECT order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows changed by a statement without result columns, or rows returned
    /// by a write with `RETURNING`
    pub fn rowcount(&self) -> usize {
        self.rowcount
    }

    /// Lazy sequence of fixed-width tuples, one per row.
    pub fn tuples(&mut self) -> Tuples<'_> {
        let width = self.columns.len();
        let source = if self.consumed {
            None
        } else {
            self.consumed = true;
            Some(match self.buffered.take() {
                Some(tuples) => Source::Buffered(tuples.into_iter()),
                None => Source::Live(self.stmt.raw_query()),
            })
        };
        Tuples { source, width }
    }

    /// Like [`CursorResult::tuples`] but pairs every value with its column name.
    pub fn rows(&mut self) -> impl Iterator<Item = Result<Row>> + '_ {
        let columns = self.columns.clone();
        self.tuples()
            .map(move |values| values.map(|values| Row::new(columns.iter().cloned().zip(values).collect())))
    }
}

impl std::fmt::Debug for CursorResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorResult")
            .field("columns", &self.columns)
            .field("rowcount", &self.rowcount)
            .field("consumed", &self.consumed)
            .finish()
    }
}

fn read_tuple(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Vec<Value>> {
    (0..width)
        .map(|i| row.get_ref(i).map(Value::from_raw))
        .collect()
}

enum Source<'stmt> {
    Live(Rows<'stmt>),
    Buffered(std::vec::IntoIter<Vec<Value>>),
}

/// Iterator over the remaining rows of a [`CursorResult`].
pub struct Tuples<'stmt> {
    source: Option<Source<'stmt>>,
    width: usize,
}

impl Iterator for Tuples<'_> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match self.source.as_mut()? {
            Source::Buffered(tuples) => tuples.next().map(Ok),
            Source::Live(rows) => match rows.next() {
                Ok(Some(row)) => Some(read_tuple(row, self.width)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
        };
        match next {
            Some(Ok(values)) => Some(Ok(values)),
            Some(Err(e)) => {
                self.source = None;
                Some(Err(TablekitError::backend("fetch", "")(e)))
            }
            None => {
                self.source = None;
                None
            }
        }
    }
}
