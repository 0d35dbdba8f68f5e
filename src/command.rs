//! Database command model handed to interceptors by the execution pipeline
//!
//! A [`DbCommand`] is the unit of work for one execution attempt: the SQL text
//! plus its ordered parameters. Interceptors borrow it mutably just before the
//! pipeline executes it.

use std::fmt;
use std::str::FromStr;

/// Size given to every parameter rewritten into a full-text predicate
pub const FULL_TEXT_PARAMETER_SIZE: u32 = 4096;

/// Declared type of a command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    AnsiString,
    AnsiStringFixedLength,
    String,
    StringFixedLength,
    Binary,
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Decimal,
    Double,
    DateTime,
    DateTime2,
    Guid,
    Xml,
}

impl DbType {
    /// Whether values of this type are character data and may carry a full-text tag
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            DbType::AnsiString
                | DbType::AnsiStringFixedLength
                | DbType::String
                | DbType::StringFixedLength
        )
    }

    /// Whether this type holds whole numbers
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            DbType::Byte | DbType::Int16 | DbType::Int32 | DbType::Int64
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::AnsiString => "AnsiString",
            DbType::AnsiStringFixedLength => "AnsiStringFixedLength",
            DbType::String => "String",
            DbType::StringFixedLength => "StringFixedLength",
            DbType::Binary => "Binary",
            DbType::Boolean => "Boolean",
            DbType::Byte => "Byte",
            DbType::Int16 => "Int16",
            DbType::Int32 => "Int32",
            DbType::Int64 => "Int64",
            DbType::Decimal => "Decimal",
            DbType::Double => "Double",
            DbType::DateTime => "DateTime",
            DbType::DateTime2 => "DateTime2",
            DbType::Guid => "Guid",
            DbType::Xml => "Xml",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ansistring" => Ok(DbType::AnsiString),
            "ansistringfixedlength" => Ok(DbType::AnsiStringFixedLength),
            "string" => Ok(DbType::String),
            "stringfixedlength" => Ok(DbType::StringFixedLength),
            "binary" => Ok(DbType::Binary),
            "boolean" => Ok(DbType::Boolean),
            "byte" => Ok(DbType::Byte),
            "int16" => Ok(DbType::Int16),
            "int32" => Ok(DbType::Int32),
            "int64" => Ok(DbType::Int64),
            "decimal" => Ok(DbType::Decimal),
            "double" => Ok(DbType::Double),
            "datetime" => Ok(DbType::DateTime),
            "datetime2" => Ok(DbType::DateTime2),
            "guid" => Ok(DbType::Guid),
            "xml" => Ok(DbType::Xml),
            _ => Err(format!("Unknown DbType: {}", s)),
        }
    }
}

/// Runtime value bound to a parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// The provider's "no value" marker, distinct from a null string
    DbNull,
    /// A null reference of the parameter's type
    Null,
    Text(String),
    Integer(i64),
    Binary(Vec<u8>),
}

impl ParameterValue {
    /// Borrow the value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

/// A single command parameter
#[derive(Debug, Clone, PartialEq)]
pub struct DbParameter {
    /// Parameter name without the leading `@`
    pub name: String,
    pub db_type: DbType,
    /// Capacity hint in characters or bytes (0 lets the provider infer it)
    pub size: u32,
    pub value: ParameterValue,
}

impl DbParameter {
    /// Create a parameter; a leading `@` on `name` is dropped
    pub fn new(name: &str, db_type: DbType, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.trim_start_matches('@').to_string(),
            db_type,
            size: 0,
            value: value.into(),
        }
    }

    /// Create an nvarchar parameter, the type ORM translators bind string constants as
    pub fn text(name: &str, value: &str) -> Self {
        Self::new(name, DbType::String, value)
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

/// A command about to be executed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbCommand {
    pub text: String,
    pub parameters: Vec<DbParameter>,
}

impl DbCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: DbParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a parameter by name, with or without the leading `@`
    pub fn parameter(&self, name: &str) -> Option<&DbParameter> {
        let name = name.trim_start_matches('@');
        self.parameters.iter().find(|p| p.name == name)
    }
}
