//! Parser for command capture files
//!
//! A capture records one command as the pipeline would hand it to an
//! interceptor:
//!
//! ```xml
//! <Command Kind="Reader" Provider="System.Data.SqlClient">
//!   <CommandText>SELECT ... WHERE [Extent1].[Title] LIKE @p__linq__0 ESCAPE N'~'</CommandText>
//!   <Parameters>
//!     <Parameter Name="p__linq__0" DbType="String" Size="4000">-FTSCONTAINS-%rust%-/FTSCONTAINS-</Parameter>
//!     <Parameter Name="p__linq__1" DbType="Int32" DbNull="true" />
//!   </Parameters>
//! </Command>
//! ```

use std::path::{Path, PathBuf};

use encoding_rs::WINDOWS_1252;
use roxmltree::{Document, Node};

use super::CommandCapture;
use crate::command::{DbCommand, DbParameter, DbType, ParameterValue};
use crate::error::CaptureError;
use crate::interceptor::{CommandKind, InterceptionContext, ProviderTag};

/// Read a file as a string, trying UTF-8 first, then Windows-1252 as fallback
fn read_file_with_encoding_fallback(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = WINDOWS_1252.decode(&bytes);
            if had_errors {
                Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "File contains invalid characters",
                ))
            } else {
                Ok(decoded.into_owned())
            }
        }
    }
}

/// Parse a capture file
pub fn parse_capture(path: &Path) -> Result<CommandCapture, CaptureError> {
    let content =
        read_file_with_encoding_fallback(path).map_err(|e| CaptureError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
    parse_capture_str(&content, path)
}

/// Parse capture XML already in memory; `path` is used for error reporting
pub fn parse_capture_str(content: &str, path: &Path) -> Result<CommandCapture, CaptureError> {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);

    let doc = Document::parse(content).map_err(|e| CaptureError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let root = doc.root_element();
    if !root.has_tag_name("Command") {
        return Err(invalid(
            path,
            format!("expected <Command> root, found <{}>", root.tag_name().name()),
        ));
    }

    let kind = match root.attribute("Kind") {
        Some(kind) => kind.parse::<CommandKind>().map_err(|e| invalid(path, e))?,
        None => CommandKind::Reader,
    };

    let provider = root
        .attribute("Provider")
        .map(ProviderTag::from_invariant_name)
        .unwrap_or_default();

    let text = root
        .children()
        .find(|n| n.has_tag_name("CommandText"))
        .map(|n| n.text().unwrap_or("").to_string())
        .ok_or_else(|| invalid(path, "missing <CommandText>".to_string()))?;

    let mut command = DbCommand::new(text);
    if let Some(parameters) = root.children().find(|n| n.has_tag_name("Parameters")) {
        for node in parameters
            .children()
            .filter(|n| n.has_tag_name("Parameter"))
        {
            let parameter = parse_parameter(&node, path)?;
            if command.parameter(&parameter.name).is_some() {
                return Err(invalid(
                    path,
                    format!("duplicate parameter @{}", parameter.name),
                ));
            }
            command.parameters.push(parameter);
        }
    }

    Ok(CommandCapture {
        source: path.to_path_buf(),
        kind,
        context: InterceptionContext::new(provider),
        command,
    })
}

fn parse_parameter(node: &Node, path: &Path) -> Result<DbParameter, CaptureError> {
    let name = node
        .attribute("Name")
        .map(|n| n.trim_start_matches('@'))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| invalid(path, "parameter without Name".to_string()))?;

    let db_type = match node.attribute("DbType") {
        Some(t) => t.parse::<DbType>().map_err(|e| invalid(path, e))?,
        None => DbType::String,
    };

    let size = match node.attribute("Size") {
        Some(s) => s
            .parse::<u32>()
            .map_err(|_| invalid(path, format!("invalid Size '{}' on @{}", s, name)))?,
        None => 0,
    };

    let raw = node.text().unwrap_or("");
    let value = if is_true(node.attribute("DbNull")) {
        ParameterValue::DbNull
    } else if is_true(node.attribute("IsNull")) {
        ParameterValue::Null
    } else if db_type.is_integral() {
        raw.trim()
            .parse::<i64>()
            .map(ParameterValue::Integer)
            .map_err(|_| invalid(path, format!("invalid integer value on @{}", name)))?
    } else if db_type == DbType::Binary {
        hex::decode(raw.trim())
            .map(ParameterValue::Binary)
            .map_err(|e| invalid(path, format!("invalid hex value on @{}: {}", name, e)))?
    } else {
        ParameterValue::Text(raw.to_string())
    };

    Ok(DbParameter::new(name, db_type, value).with_size(size))
}

fn is_true(attribute: Option<&str>) -> bool {
    attribute
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn invalid(path: &Path, message: String) -> CaptureError {
    CaptureError::InvalidFormat {
        path: PathBuf::from(path),
        message,
    }
}
