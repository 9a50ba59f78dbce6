//!
//! Turns [`Value`] trees into EBML bytes, driven by a [`Schema`].
//!

use ebml_tree_specification::{DataType, ElementDescriptor, ElementKey, Schema};

use super::errors::tool::ToolError;
use super::errors::writer::EncodeError;
use super::scalars;
use super::tools::{encode_element_id, unknown_size_vint, Vint};
use super::value::Value;

///
/// Options for encoding a single element.
///
/// The default encodes payloads and sizes in their shortest form.
///
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    ///
    /// Explicit payload length, overriding the length declared for the element in the schema.  Values are truncated or
    /// padded to it where their data type allows.
    ///
    pub length: Option<u64>,

    ///
    /// Explicit width of the size field, 1 to 8 bytes.
    ///
    pub size_length: Option<usize>,

    ///
    /// Write the unknown size marker instead of the payload size.  Only master elements may be open-ended.
    ///
    pub open_ended: bool,
}

impl EncodeOptions {
    pub fn with_length(length: u64) -> Self {
        EncodeOptions { length: Some(length), ..Default::default() }
    }

    pub fn open_ended() -> Self {
        EncodeOptions { open_ended: true, ..Default::default() }
    }
}

///
/// Encodes one element (or, for a [`Value::Multiple`], one element per item) with the given options.
///
/// ## Example
///
/// ```
/// use ebml_tree::{encode_element, EncodeOptions, Value};
/// use ebml_tree::specs::{ebml_header, ElementKey, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Schema::from_definitions(None, ebml_header::header_definitions())?;
/// let header = Value::master([("EBMLVersion", Value::from(16u64))]);
/// let bytes = encode_element(&schema, &ElementKey::Id(0x1A45DFA3), &header, EncodeOptions::default())?;
/// assert_eq!(vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x10], bytes);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an [`EncodeError`] if the key is not in the schema or the value cannot be encoded as the element's data type.
///
pub fn encode_element(schema: &Schema, key: &ElementKey, value: &Value, options: EncodeOptions) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    encode_into(schema, key, value, options, &mut out)?;
    Ok(out)
}

pub(crate) fn encode_into(schema: &Schema, key: &ElementKey, value: &Value, options: EncodeOptions, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let descriptor = schema.get(key).ok_or_else(|| EncodeError::UnknownElement(key.clone()))?;

    match value {
        Value::Multiple(values) => {
            if !descriptor.multiple() {
                return Err(EncodeError::MultipleNotPermitted(descriptor.name().to_string()));
            }
            for value in values {
                encode_single(schema, descriptor, value, options, out)?;
            }
            Ok(())
        },
        value => encode_single(schema, descriptor, value, options, out),
    }
}

fn encode_single(schema: &Schema, descriptor: &ElementDescriptor, value: &Value, options: EncodeOptions, out: &mut Vec<u8>) -> Result<(), EncodeError> {
    let is_master = descriptor.data_type() == DataType::Master;
    if options.open_ended && !is_master {
        return Err(EncodeError::OpenEndedNotMaster(descriptor.name().to_string()));
    }

    let length = options.length.or(descriptor.length());
    let payload = encode_payload(schema, descriptor, value, length)?;

    let size = if options.open_ended {
        unknown_size_vint(options.size_length.unwrap_or(1))?
    } else {
        write_size(payload.len() as u64, options.size_length)?
    };

    out.extend_from_slice(&encode_element_id(descriptor.id())?);
    out.extend_from_slice(&size);
    out.extend_from_slice(&payload);
    Ok(())
}

pub(crate) fn write_size(size: u64, size_length: Option<usize>) -> Result<Vec<u8>, ToolError> {
    match size_length {
        Some(width) => size.as_vint_with_length(width),
        None => size.as_vint(),
    }
}

///
/// Encodes the payload of one element.  `length` is the explicit payload length, if any.
///
/// # Errors
///
/// Returns an [`EncodeError`] if the value does not match the element's data type or does not fit in `length`.
///
pub fn encode_payload(schema: &Schema, descriptor: &ElementDescriptor, value: &Value, length: Option<u64>) -> Result<Vec<u8>, EncodeError> {
    let name = descriptor.name();
    let data_type = descriptor.data_type();
    let mismatch = || EncodeError::ValueMismatch { name: name.to_string(), data_type, found: value.kind() };
    let sized = |err: ToolError| match err {
        ToolError::ValueTooLong { needed, length } => EncodeError::LengthExceeded { name: name.to_string(), needed, length },
        other => EncodeError::Tool(other),
    };

    match data_type {
        DataType::Master => {
            if length.is_some() {
                return Err(EncodeError::UnsupportedLength(name.to_string()));
            }
            let Value::Master(entries) = value else {
                return Err(mismatch());
            };
            let mut payload = Vec::new();
            for (key, child) in entries {
                encode_into(schema, key, child, EncodeOptions::default(), &mut payload)?;
            }
            Ok(payload)
        },
        DataType::UnsignedInt => {
            let value = match value {
                Value::UnsignedInt(_) | Value::Integer(_) => value.as_u64().ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            };
            scalars::encode_unsigned(value, length).map_err(sized)
        },
        DataType::Integer => {
            let value = match value {
                Value::UnsignedInt(_) | Value::Integer(_) => value.as_i64().ok_or_else(mismatch)?,
                _ => return Err(mismatch()),
            };
            scalars::encode_signed(value, length).map_err(sized)
        },
        DataType::Float => match value {
            Value::Float(value) => scalars::encode_float(*value, length).map_err(sized),
            _ => Err(mismatch()),
        },
        DataType::String => match value {
            Value::String(value) | Value::Utf8(value) => Ok(scalars::encode_string(value, length)),
            _ => Err(mismatch()),
        },
        DataType::Utf8 => match value {
            Value::String(value) | Value::Utf8(value) => Ok(scalars::encode_utf8(value, length)),
            _ => Err(mismatch()),
        },
        DataType::Date => match value {
            Value::Date(value) => scalars::encode_date(*value, length).map_err(sized),
            _ => Err(mismatch()),
        },
        DataType::Binary => match value {
            Value::Binary(value) => scalars::encode_binary(value, length).map_err(sized),
            Value::String(value) | Value::Utf8(value) => scalars::encode_binary(value.as_bytes(), length).map_err(sized),
            _ => Err(mismatch()),
        },
        DataType::Void => Ok(scalars::encode_void(length)),
        DataType::Unknown => Err(mismatch()),
    }
}
