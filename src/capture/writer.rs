//! Write command captures back out as XML

use std::io::{self, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::CommandCapture;
use crate::command::{DbParameter, ParameterValue};
use crate::error::CaptureError;

/// Write `capture` as XML to `writer`
pub fn write_capture<W: Write>(writer: W, capture: &CommandCapture) -> io::Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);

    xml_writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let kind = capture.kind.to_string();
    let provider = capture.context.provider.to_string();
    let mut root = BytesStart::new("Command");
    root.push_attribute(("Kind", kind.as_str()));
    root.push_attribute(("Provider", provider.as_str()));
    xml_writer.write_event(Event::Start(root))?;

    write_element(&mut xml_writer, "CommandText", &capture.command.text)?;

    if !capture.command.parameters.is_empty() {
        xml_writer.write_event(Event::Start(BytesStart::new("Parameters")))?;
        for parameter in &capture.command.parameters {
            write_parameter(&mut xml_writer, parameter)?;
        }
        xml_writer.write_event(Event::End(BytesEnd::new("Parameters")))?;
    }

    xml_writer.write_event(Event::End(BytesEnd::new("Command")))?;
    Ok(())
}

/// Write a capture to `path`, replacing any existing file
pub fn write_capture_file(path: &Path, capture: &CommandCapture) -> Result<(), CaptureError> {
    let file = std::fs::File::create(path).map_err(|e| CaptureError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut buffered = io::BufWriter::new(file);
    write_capture(&mut buffered, capture)
        .and_then(|()| buffered.flush())
        .map_err(|e| CaptureError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
}

fn write_parameter<W: Write>(
    writer: &mut Writer<W>,
    parameter: &DbParameter,
) -> io::Result<()> {
    let db_type = parameter.db_type.to_string();
    let size = parameter.size.to_string();
    let mut elem = BytesStart::new("Parameter");
    elem.push_attribute(("Name", parameter.name.as_str()));
    elem.push_attribute(("DbType", db_type.as_str()));
    if parameter.size > 0 {
        elem.push_attribute(("Size", size.as_str()));
    }

    let text = match &parameter.value {
        ParameterValue::DbNull => {
            elem.push_attribute(("DbNull", "true"));
            None
        }
        ParameterValue::Null => {
            elem.push_attribute(("IsNull", "true"));
            None
        }
        ParameterValue::Text(s) if s.is_empty() => None,
        ParameterValue::Text(s) => Some(s.clone()),
        ParameterValue::Integer(i) => Some(i.to_string()),
        ParameterValue::Binary(bytes) => Some(hex::encode(bytes)),
    };

    match text {
        Some(text) => {
            writer.write_event(Event::Start(elem))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new("Parameter")))?;
        }
        None => {
            writer.write_event(Event::Empty(elem))?;
        }
    }
    Ok(())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    value: &str,
) -> io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
