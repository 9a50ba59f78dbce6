//!
//! Decoders and encoders for the payloads of non-master elements.
//!
//! Every encoder takes an optional explicit payload `length`.  Without one, values are written in their shortest form.
//!

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::warn;

use ebml_tree_specification::DataType;

use super::errors::tool::ToolError;
use super::tools::{arr_to_f64, arr_to_i64, arr_to_u64};
use super::value::Value;

///
/// The EBML date epoch, `2001-01-01T00:00:00`.  Dates are stored as signed nanoseconds relative to it.
///
pub fn date_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2001, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("2001-01-01T00:00:00 is a valid date")
}

///
/// Decodes a payload according to `data_type`.
///
/// Void payloads are never inspected and decode to empty binary data.  Unknown, binary and master payloads are returned
/// as raw binary data.
///
/// # Errors
///
/// Returns a `ToolError` if the payload length is invalid for the data type.
///
pub fn decode(data_type: DataType, payload: &[u8]) -> Result<Value, ToolError> {
    Ok(match data_type {
        DataType::UnsignedInt => Value::UnsignedInt(arr_to_u64(payload)?),
        DataType::Integer => Value::Integer(arr_to_i64(payload)?),
        DataType::Float => Value::Float(arr_to_f64(payload)?),
        DataType::String => Value::String(decode_string(payload)),
        DataType::Utf8 => Value::Utf8(decode_utf8(payload)),
        DataType::Date => Value::Date(decode_date(payload)?),
        DataType::Void => Value::Binary(Vec::new()),
        DataType::Binary | DataType::Master | DataType::Unknown => Value::Binary(payload.to_vec()),
    })
}

fn until_nul(payload: &[u8]) -> &[u8] {
    match payload.iter().position(|b| *b == 0) {
        Some(end) => &payload[..end],
        None => payload,
    }
}

///
/// Decodes an ASCII string.  Decoding stops at the first NUL byte; bytes above 127 become U+FFFD.
///
pub fn decode_string(payload: &[u8]) -> String {
    let payload = until_nul(payload);
    if !payload.is_ascii() {
        warn!(length = payload.len(), "non-ascii bytes in string payload, replacing them");
    }
    payload.iter().map(|b| if b.is_ascii() { *b as char } else { char::REPLACEMENT_CHARACTER }).collect()
}

///
/// Decodes a UTF-8 string.  Decoding stops at the first NUL byte; invalid sequences are replaced with U+FFFD.
///
pub fn decode_utf8(payload: &[u8]) -> String {
    let payload = until_nul(payload);
    match std::str::from_utf8(payload) {
        Ok(s) => s.to_string(),
        Err(err) => {
            warn!(length = payload.len(), valid_up_to = err.valid_up_to(), "invalid utf-8 in string payload, decoding lossily");
            String::from_utf8_lossy(payload).into_owned()
        }
    }
}

///
/// Decodes a date: exactly 8 bytes of signed nanoseconds since [`date_epoch`].
///
/// # Errors
///
/// Returns [`ToolError::ReadDateMismatch`] for any other payload length.
///
pub fn decode_date(payload: &[u8]) -> Result<NaiveDateTime, ToolError> {
    if payload.len() != 8 {
        return Err(ToolError::ReadDateMismatch(payload.to_vec()));
    }
    let nanos = arr_to_i64(payload)?;
    date_epoch()
        .checked_add_signed(Duration::nanoseconds(nanos))
        .ok_or_else(|| ToolError::DateOutOfRange(format!("{} ns from the epoch", nanos)))
}

fn check_int_length(length: u64, needed: usize) -> Result<usize, ToolError> {
    if length > 8 {
        return Err(ToolError::InvalidIntLength(length));
    }
    if (needed as u64) > length {
        return Err(ToolError::ValueTooLong { needed: needed as u64, length });
    }
    Ok(length as usize)
}

///
/// Encodes an unsigned integer, big-endian.  Zero is written as a single `0x00` byte unless a length is given.
///
/// # Errors
///
/// Returns a `ToolError` if `length` is greater than 8 or too short for the value.
///
pub fn encode_unsigned(value: u64, length: Option<u64>) -> Result<Vec<u8>, ToolError> {
    let bytes = value.to_be_bytes();
    let needed = 8 - (value.leading_zeros() / 8) as usize;
    match length {
        None => Ok(bytes[(8 - needed.max(1))..].to_vec()),
        Some(length) => {
            let length = check_int_length(length, needed)?;
            Ok(bytes[(8 - length)..].to_vec())
        }
    }
}

///
/// Encodes a signed integer, big-endian two's complement.  The first byte's top bit always matches the sign, so
/// `128` takes two bytes (`00 80`) and `-128` one (`80`).
///
/// # Errors
///
/// Returns a `ToolError` if `length` is greater than 8 or too short for the value.
///
pub fn encode_signed(value: i64, length: Option<u64>) -> Result<Vec<u8>, ToolError> {
    let bytes = value.to_be_bytes();
    let mut needed = 1;
    while needed < 8 {
        let bits = 8 * needed as u32;
        if value >= -(1i64 << (bits - 1)) && value < (1i64 << (bits - 1)) {
            break;
        }
        needed += 1;
    }
    let length = match length {
        None => needed,
        Some(length) => check_int_length(length, if value == 0 { 0 } else { needed })?,
    };
    Ok(bytes[(8 - length)..].to_vec())
}

///
/// Encodes a float.  Without a length, positive zero is written as an empty payload and anything else as 8 bytes.
///
/// # Errors
///
/// Returns [`ToolError::InvalidFloatLength`] for lengths other than 0, 4 or 8, or a length of 0 for a non-zero value, and
/// [`ToolError::FloatOutOfRange`] for a finite value too large for 4 bytes.
///
pub fn encode_float(value: f64, length: Option<u64>) -> Result<Vec<u8>, ToolError> {
    let positive_zero = value == 0.0 && value.is_sign_positive();
    match length {
        None if positive_zero => Ok(Vec::new()),
        None | Some(8) => Ok(value.to_be_bytes().to_vec()),
        Some(4) => {
            let narrowed = value as f32;
            if value.is_finite() && !narrowed.is_finite() {
                return Err(ToolError::FloatOutOfRange(value));
            }
            Ok(narrowed.to_be_bytes().to_vec())
        },
        Some(0) if positive_zero => Ok(Vec::new()),
        Some(length) => Err(ToolError::InvalidFloatLength(length)),
    }
}

fn fit(mut payload: Vec<u8>, length: Option<u64>) -> Vec<u8> {
    if let Some(length) = length {
        payload.resize(length as usize, 0);
    }
    payload
}

///
/// Encodes an ASCII string.  Every character outside the printable range (32 to 126) is written as `?`.  With a length,
/// the result is truncated or padded with NUL bytes.
///
pub fn encode_string(value: &str, length: Option<u64>) -> Vec<u8> {
    let payload = value.chars()
        .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b'?' })
        .collect();
    fit(payload, length)
}

///
/// Encodes a UTF-8 string.  With a length, the result is truncated (possibly inside a multi-byte character) or padded
/// with NUL bytes.
///
pub fn encode_utf8(value: &str, length: Option<u64>) -> Vec<u8> {
    fit(value.as_bytes().to_vec(), length)
}

///
/// Encodes a date as 8 bytes of signed nanoseconds since [`date_epoch`].
///
/// # Errors
///
/// Returns a `ToolError` if a length other than 8 is requested, or if the date is more than about 292 years from the
/// epoch.
///
pub fn encode_date(value: NaiveDateTime, length: Option<u64>) -> Result<Vec<u8>, ToolError> {
    if let Some(length) = length.filter(|l| *l != 8) {
        return Err(ToolError::InvalidDateLength(length));
    }
    let nanos = value.signed_duration_since(date_epoch())
        .num_nanoseconds()
        .ok_or_else(|| ToolError::DateOutOfRange(value.to_string()))?;
    Ok(nanos.to_be_bytes().to_vec())
}

///
/// Encodes binary data, padded with NUL bytes to `length` if given.
///
/// # Errors
///
/// Returns [`ToolError::ValueTooLong`] if the data is longer than `length`.
///
pub fn encode_binary(value: &[u8], length: Option<u64>) -> Result<Vec<u8>, ToolError> {
    if let Some(length) = length {
        if value.len() as u64 > length {
            return Err(ToolError::ValueTooLong { needed: value.len() as u64, length });
        }
    }
    Ok(fit(value.to_vec(), length))
}

///
/// Encodes a void payload: `length` bytes of `0xFF`.
///
pub fn encode_void(length: Option<u64>) -> Vec<u8> {
    vec![0xFF; length.unwrap_or(0) as usize]
}
