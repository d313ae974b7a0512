//! Dynamic rows read from tables, write payloads, and row-shape descriptors.

use crate::core::db::schema::{Column, ColumnType, TableSchema};
use crate::core::{Field, Result, TablekitError, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// One fetched row: ordered column name -> value pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Row { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Reads a column as a concrete Rust type.
    pub fn get_as<'a, T>(&'a self, column: &str) -> Result<T>
    where
        T: TryFrom<&'a Value, Error = TablekitError>,
    {
        let value = self.get(column).ok_or_else(|| TablekitError::UnknownColumn {
            table: String::new(),
            column: column.to_string(),
        })?;
        T::try_from(value)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.columns.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The row as an ordered tuple, dropping column names
    pub fn into_tuple(self) -> Vec<Value> {
        self.columns.into_iter().map(|(_, value)| value).collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A write payload for insert and update.
///
/// Fields that were never assigned are [`Field::Unset`] and are left out of
/// the generated statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a field, replacing any earlier assignment
    pub fn set(mut self, column: &str, value: impl Into<Field>) -> Self {
        self.assign(column, value.into());
        self
    }

    /// Assigns NULL to a field
    pub fn null(self, column: &str) -> Self {
        self.set(column, Field::Null)
    }

    pub fn assign(&mut self, column: &str, field: Field) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((column.to_string(), field)),
        }
    }

    /// Returns [`Field::Unset`] for fields never mentioned
    pub fn get(&self, column: &str) -> &Field {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, field)| field)
            .unwrap_or(&Field::Unset)
    }

    /// Names of every mentioned field, assigned or not
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Whether at least one field would be written
    pub fn has_values(&self) -> bool {
        self.fields.iter().any(|(_, field)| !field.is_unset())
    }
}

impl From<Row> for Record {
    fn from(row: Row) -> Self {
        Record {
            fields: row
                .columns
                .into_iter()
                .map(|(name, value)| (name, Field::from(value)))
                .collect(),
        }
    }
}

/// One field of a [`RowShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// Declarative description of a table's rows, used to create tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowShape {
    fields: Vec<FieldSpec>,
    primary_key: Vec<String>,
}

impl RowShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a nullable field
    pub fn field(self, name: &str, column_type: ColumnType) -> Self {
        self.push(name, column_type, true)
    }

    /// Adds a NOT NULL field
    pub fn required(self, name: &str, column_type: ColumnType) -> Self {
        self.push(name, column_type, false)
    }

    fn push(mut self, name: &str, column_type: ColumnType, nullable: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            column_type,
            nullable,
        });
        self
    }

    /// Sets the primary-key fields
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The table schema this shape declares
    pub fn to_schema(&self, table: &str) -> Result<TableSchema> {
        if let Some(missing) = self
            .primary_key
            .iter()
            .find(|pk| !self.fields.iter().any(|f| &f.name == *pk))
        {
            return Err(TablekitError::UnknownColumn {
                table: table.to_string(),
                column: missing.clone(),
            });
        }

        let columns = self
            .fields
            .iter()
            .map(|spec| {
                let mut column = Column::new(spec.name.clone(), spec.column_type);
                column.nullable = spec.nullable;
                column.primary_key = self.primary_key.contains(&spec.name);
                column
            })
            .collect();
        Ok(TableSchema::new(table, columns))
    }
}
