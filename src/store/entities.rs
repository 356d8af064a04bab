use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use uuid::Uuid;

use super::{IntoValue, Persistable};
use crate::error::{Error, Result};
use crate::types::{DataType, Field, Model, Stream};

impl FromSql for DataType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        DataType::parse(code).ok_or(FromSqlError::InvalidType)
    }
}

impl ToSql for DataType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl IntoValue for DataType {
    fn into_value(self) -> Value {
        Value::Text(self.as_str().to_string())
    }
}

fn text(table: &str, column: &str, value: Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(Error::BadRequest(format!(
            "{table}.{column} expects text, got {other:?}"
        ))),
    }
}

fn flag(table: &str, column: &str, value: Value) -> Result<bool> {
    match value {
        Value::Integer(i) => Ok(i != 0),
        other => Err(Error::BadRequest(format!(
            "{table}.{column} expects a boolean, got {other:?}"
        ))),
    }
}

fn unknown(table: &'static str, column: &str) -> Error {
    Error::UnknownColumn {
        table,
        column: column.to_string(),
    }
}

impl Persistable for Stream {
    const TABLE: &'static str = "streams";
    const COLUMNS: &'static [&'static str] = &["id", "external_uuid", "description", "active"];

    fn id(&self) -> &str {
        &self.id
    }

    fn blank() -> Self {
        Stream::new(String::new(), String::new())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Stream {
            id: row.get(0)?,
            external_uuid: row.get(1)?,
            description: row.get(2)?,
            active: row.get(3)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.as_str().into_value(),
            self.external_uuid.as_str().into_value(),
            self.description.as_str().into_value(),
            self.active.into_value(),
        ]
    }

    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = text(Self::TABLE, column, value)?,
            "external_uuid" => self.external_uuid = text(Self::TABLE, column, value)?,
            "description" => self.description = text(Self::TABLE, column, value)?,
            "active" => self.active = flag(Self::TABLE, column, value)?,
            _ => return Err(unknown(Self::TABLE, column)),
        }
        Ok(())
    }
}

impl Persistable for Model {
    const TABLE: &'static str = "models";
    const COLUMNS: &'static [&'static str] =
        &["id", "external_uuid", "description", "active", "stream_id"];

    fn id(&self) -> &str {
        &self.id
    }

    fn blank() -> Self {
        Model::new(String::new(), String::new(), String::new())
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Model {
            id: row.get(0)?,
            external_uuid: row.get(1)?,
            description: row.get(2)?,
            active: row.get(3)?,
            stream_id: row.get(4)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.as_str().into_value(),
            self.external_uuid.as_str().into_value(),
            self.description.as_str().into_value(),
            self.active.into_value(),
            self.stream_id.as_str().into_value(),
        ]
    }

    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = text(Self::TABLE, column, value)?,
            "external_uuid" => self.external_uuid = text(Self::TABLE, column, value)?,
            "description" => self.description = text(Self::TABLE, column, value)?,
            "active" => self.active = flag(Self::TABLE, column, value)?,
            "stream_id" => self.stream_id = text(Self::TABLE, column, value)?,
            _ => return Err(unknown(Self::TABLE, column)),
        }
        Ok(())
    }
}

impl Persistable for Field {
    const TABLE: &'static str = "fields";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "model_id",
        "name",
        "source_table",
        "data_type",
        "description",
    ];

    fn id(&self) -> &str {
        &self.id
    }

    fn blank() -> Self {
        Field {
            id: Uuid::new_v4().to_string(),
            model_id: String::new(),
            name: String::new(),
            source_table: String::new(),
            data_type: DataType::Unknown,
            description: String::new(),
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Field {
            id: row.get(0)?,
            model_id: row.get(1)?,
            name: row.get(2)?,
            source_table: row.get(3)?,
            data_type: row.get(4)?,
            description: row.get(5)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.as_str().into_value(),
            self.model_id.as_str().into_value(),
            self.name.as_str().into_value(),
            self.source_table.as_str().into_value(),
            self.data_type.into_value(),
            self.description.as_str().into_value(),
        ]
    }

    fn set_value(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "id" => self.id = text(Self::TABLE, column, value)?,
            "model_id" => self.model_id = text(Self::TABLE, column, value)?,
            "name" => self.name = text(Self::TABLE, column, value)?,
            "source_table" => self.source_table = text(Self::TABLE, column, value)?,
            "data_type" => {
                let code = text(Self::TABLE, column, value)?;
                self.data_type = DataType::parse(&code).ok_or_else(|| {
                    Error::BadRequest(format!("unknown data type code '{code}'"))
                })?;
            }
            "description" => self.description = text(Self::TABLE, column, value)?,
            _ => return Err(unknown(Self::TABLE, column)),
        }
        Ok(())
    }
}
