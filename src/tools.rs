//!
//! Contains a number of tools that are useful when working with EBML encoded files.
//!

use ebml_tree_specification::element_id_length;

use super::element_util::EbmlSize;
use super::errors::tool::ToolError;

///
/// Trait to enable easy serialization to a vint.
///
/// This is only available for types that can be cast as `u64`.  The all-ones value of every width is reserved for the
/// unknown size marker (see [`unknown_size_vint`]), so the largest value that can be written is `2^56 - 2`.
///
pub trait Vint: Into<u64> + Copy {
    ///
    /// Returns a representation of the current value as a vint array, using the fewest bytes possible.
    ///
    /// # Errors
    ///
    /// This can return an error if the value is too large to be representable as a vint.
    ///
    fn as_vint(&self) -> Result<Vec<u8>, ToolError> {
        let val: u64 = (*self).into();
        check_size_u64(val, 8)?;
        let mut length = 1;
        while length < 8 && val > max_value(length) {
            length += 1;
        }

        Ok(as_vint_no_check_u64(val, length))
    }

    ///
    /// Returns a representation of the current value as a vint array with a specified length.
    ///
    /// # Errors
    ///
    /// This can return an error if the length is not between 1 and 8, or if the value does not fit in that many bytes.
    ///
    fn as_vint_with_length(&self, length: usize) -> Result<Vec<u8>, ToolError> {
        if !(1..=8).contains(&length) {
            return Err(ToolError::InvalidVintLength(length));
        }
        let val: u64 = (*self).into();
        check_size_u64(val, length)?;
        Ok(as_vint_no_check_u64(val, length))
    }
}

impl Vint for u64 { }
impl Vint for u32 { }
impl Vint for u16 { }
impl Vint for u8 { }

#[inline]
fn max_value(length: usize) -> u64 {
    (1 << (7 * length)) - 2
}

#[inline]
fn check_size_u64(val: u64, max_length: usize) -> Result<(), ToolError> {
    if val > max_value(max_length) {
        Err(ToolError::WriteVintOverflow(val))
    } else {
        Ok(())
    }
}

#[inline]
fn as_vint_no_check_u64(val: u64, length: usize) -> Vec<u8> {
    let bytes: [u8; 8] = val.to_be_bytes();
    let mut result: Vec<u8> = Vec::from(&bytes[(8-length)..]);
    result[0] |= 1 << (8 - length);
    result
}

///
/// Returns the unknown size marker of the given width: a length marker followed by all ones.
///
/// ```
/// # use ebml_tree::tools::unknown_size_vint;
/// assert_eq!(vec![0xFF], unknown_size_vint(1).unwrap());
/// assert_eq!(vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], unknown_size_vint(8).unwrap());
/// ```
///
/// # Errors
///
/// Returns [`ToolError::InvalidVintLength`] if `length` is not between 1 and 8.
///
pub fn unknown_size_vint(length: usize) -> Result<Vec<u8>, ToolError> {
    if !(1..=8).contains(&length) {
        return Err(ToolError::InvalidVintLength(length));
    }
    let mut result = vec![0xFF; length];
    result[0] = 0xFF >> (length - 1);
    Ok(result)
}

///
/// Inspects the first byte of a vint.
///
/// Returns the total length of the vint (one plus the number of leading zero bits) and the first byte with its length
/// marker cleared.
///
/// # Errors
///
/// A first byte of zero has no length marker and produces [`ToolError::ReadVintOverflow`].
///
pub fn decode_header_int(first_byte: u8) -> Result<(usize, u8), ToolError> {
    if first_byte == 0 {
        return Err(ToolError::ReadVintOverflow);
    }
    let length = first_byte.leading_zeros() as usize + 1;
    Ok((length, first_byte & (0xFF >> length)))
}

///
/// Reads a vint from the beginning of the input array slice.
///
/// This method returns an option with the `None` variant used to indicate there was not enough data in the buffer to completely read a vint.
///
/// The returned tuple contains the value of the vint (`u64`) and the length of the vint (`usize`).  The length will be less than or equal to the length of the input slice.
///
/// # Errors
///
/// This method can return a `ToolError` if the input array cannot be read as a vint.
///
pub fn read_vint(buffer: &[u8]) -> Result<Option<(u64, usize)>, ToolError> {
    let Some(first) = buffer.first() else {
        return Ok(None);
    };

    let (length, value_bits) = decode_header_int(*first)?;

    if length > buffer.len() {
        // Not enough data in the buffer to read out the vint value
        return Ok(None);
    }

    let mut value = value_bits as u64;
    for item in buffer.iter().take(length).skip(1) {
        value <<= 8;
        value += *item as u64;
    }

    Ok(Some((value, length)))
}

///
/// Reads an element id from the beginning of the input array slice.
///
/// Unlike sizes, ids keep their length marker bits, so the bytes `[0x1A, 0x45, 0xDF, 0xA3]` read as `0x1A45DFA3`.  Returns
/// `None` if there is not enough data in the buffer to read the whole id.
///
/// # Errors
///
/// Returns a `ToolError` if the first byte has no length marker or marks an id longer than 4 bytes.
///
pub fn read_element_id(buffer: &[u8]) -> Result<Option<(u32, usize)>, ToolError> {
    let Some(first) = buffer.first() else {
        return Ok(None);
    };

    let (length, _) = decode_header_int(*first)?;
    if length > 4 {
        return Err(ToolError::InvalidIdLength(length));
    }
    if length > buffer.len() {
        return Ok(None);
    }

    let id = buffer[..length].iter().fold(0u32, |id, byte| (id << 8) | *byte as u32);
    Ok(Some((id, length)))
}

///
/// Reads an element data size from the beginning of the input array slice.
///
/// A size whose value bits are all ones is the unknown size marker and is returned as [`EbmlSize::Unknown`].
///
/// # Errors
///
/// Returns a `ToolError` if the input cannot be read as a vint.
///
pub fn read_element_size(buffer: &[u8]) -> Result<Option<(EbmlSize, usize)>, ToolError> {
    Ok(read_vint(buffer)?.map(|(value, length)| (EbmlSize::new(value, length), length)))
}

///
/// Returns the encoded bytes of an element id.
///
/// # Errors
///
/// Returns [`ToolError::InvalidElementId`] if the id's length marker does not match its byte length.
///
pub fn encode_element_id(id: u32) -> Result<Vec<u8>, ToolError> {
    let length = element_id_length(id).ok_or(ToolError::InvalidElementId(id))?;
    Ok(id.to_be_bytes()[(4 - length)..].to_vec())
}

///
/// Reads a `u64` value from any length array slice.
///
/// Rather than forcing the input to be a `[u8; 8]` like standard library methods, this can interpret a `u64` from a slice of any length < 8.  Bytes are assumed to be least significant when reading the value - i.e. an array of `[4, 0]` would return a value of `1024`.  An empty slice reads as `0`.
///
/// # Errors
///
/// This method will return an error if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_tree::tools::arr_to_u64;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let result = arr_to_u64(&[16,0])?;
/// assert_eq!(result, 4096);
/// # Ok(())
/// # }
/// ```
///
pub fn arr_to_u64(arr: &[u8]) -> Result<u64, ToolError> {
    if arr.len() > 8 {
        return Err(ToolError::ReadU64Overflow(Vec::from(arr)));
    }

    let mut val = 0u64;
    for byte in arr {
        val <<= 8;
        val += *byte as u64;
    }
    Ok(val)
}

///
/// Reads an `i64` value from any length array slice.
///
/// Works like [`arr_to_u64`], but the most significant bit of the first byte is treated as the sign and extended to the full 64 bits.
///
/// # Errors
///
/// This method will return an error if the input slice has a length > 8.
///
/// ## Example
///
/// ```
/// # use ebml_tree::tools::arr_to_i64;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// assert_eq!(arr_to_i64(&[4,0])?, 1024);
/// assert_eq!(arr_to_i64(&[0xFF,0xFE])?, -2);
/// # Ok(())
/// # }
/// ```
///
pub fn arr_to_i64(arr: &[u8]) -> Result<i64, ToolError> {
    if arr.len() > 8 {
        return Err(ToolError::ReadI64Overflow(Vec::from(arr)));
    }

    let unsigned = arr_to_u64(arr)?;
    match arr.first() {
        Some(first) if *first > 127 && arr.len() < 8 => Ok((unsigned | (!0u64 << (arr.len() * 8))) as i64),
        _ => Ok(unsigned as i64),
    }
}

///
/// Reads an `f64` value from an array slice of length 0, 4 or 8.
///
/// This method wraps `f32` and `f64` conversions from big endian byte arrays and casts the result as an `f64`.  An empty slice reads as `0.0`.
///
/// # Errors
///
/// This method will throw an error if the input slice length is not 0, 4 or 8.
///
pub fn arr_to_f64(arr: &[u8]) -> Result<f64, ToolError> {
    match arr.len() {
        0 => Ok(0.0),
        4 => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(arr);
            Ok(f32::from_be_bytes(bytes) as f64)
        },
        8 => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(arr);
            Ok(f64::from_be_bytes(bytes))
        },
        _ => Err(ToolError::ReadF64Mismatch(Vec::from(arr))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_vint_sixteen() {
        let buffer = [144];
        let result = read_vint(&buffer).unwrap().expect("Reading vint failed");

        assert_eq!(16, result.0);
        assert_eq!(1, result.1);
    }

    #[test]
    fn write_vint_sixteen() {
        let result = 16u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![144u8], result);
    }

    #[test]
    fn read_vint_one_twenty_six() {
        let buffer = [254u8];
        let result = read_vint(&buffer).unwrap().expect("Reading vint failed");

        assert_eq!(126, result.0);
        assert_eq!(1, result.1);
    }

    #[test]
    fn write_vint_one_twenty_six() {
        let result = 126u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![254u8], result);
    }

    #[test]
    fn write_vint_one_twenty_seven_needs_two_bytes() {
        let result = 127u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![0x40, 0x7F], result);
    }

    #[test]
    fn vint_length_boundaries() {
        assert_eq!(2, 16382u64.as_vint().unwrap().len());
        assert_eq!(3, 16383u64.as_vint().unwrap().len());
        assert_eq!(3, 2097150u64.as_vint().unwrap().len());
        assert_eq!(4, 2097151u64.as_vint().unwrap().len());
        assert_eq!(8, ((1u64 << 56) - 2).as_vint().unwrap().len());
    }

    #[test]
    fn read_vint_two_hundred() {
        let buffer = [64, 200];
        let result = read_vint(&buffer).unwrap().expect("Reading vint failed");

        assert_eq!(200, result.0);
        assert_eq!(2, result.1);
    }

    #[test]
    fn write_vint_two_hundred() {
        let result = 200u64.as_vint().expect("Writing vint failed");
        assert_eq!(vec![64u8, 200u8], result);
    }

    #[test]
    fn read_id_for_ebml_tag() {
        let buffer = [0x1a, 0x45, 0xdf, 0xa3, 0x84];
        let result = read_element_id(&buffer).unwrap().expect("Reading id failed");

        assert_eq!(0x1a45dfa3, result.0);
        assert_eq!(4, result.1);
    }

    #[test]
    fn read_id_too_long() {
        let buffer = [0x08, 0x45, 0xdf, 0xa3, 0x84];
        assert_eq!(Err(ToolError::InvalidIdLength(5)), read_element_id(&buffer));
    }

    #[test]
    fn zero_first_byte_has_no_marker() {
        assert_eq!(Err(ToolError::ReadVintOverflow), read_vint(&[0, 1, 2]));
        assert_eq!(Err(ToolError::ReadVintOverflow), read_element_id(&[0, 1, 2]));
    }

    #[test]
    fn read_unknown_sizes() {
        assert_eq!(Some((EbmlSize::Unknown, 1)), read_element_size(&[0xFF]).unwrap());
        assert_eq!(Some((EbmlSize::Unknown, 2)), read_element_size(&[0x7F, 0xFF]).unwrap());
        assert_eq!(Some((EbmlSize::Unknown, 8)), read_element_size(&unknown_size_vint(8).unwrap()).unwrap());
        assert_eq!(Some((EbmlSize::Known(127), 2)), read_element_size(&[0x40, 0x7F]).unwrap());
    }

    #[test]
    fn read_vint_very_long() {
        let buffer = [1, 0, 0, 0, 0, 0, 0, 1];
        let result = read_vint(&buffer).unwrap().expect("Reading vint failed");

        assert_eq!(1, result.0);
        assert_eq!(8, result.1);
    }

    #[test]
    fn write_vint_very_long() {
        let result = 1u64.as_vint_with_length(8).expect("Writing vint failed");
        assert_eq!(vec![1, 0, 0, 0, 0, 0, 0, 1], result);
    }

    #[test]
    fn write_vint_with_bad_lengths() {
        assert_eq!(Err(ToolError::InvalidVintLength(0)), 1u64.as_vint_with_length(0));
        assert_eq!(Err(ToolError::InvalidVintLength(9)), 1u64.as_vint_with_length(9));
        assert_eq!(Err(ToolError::WriteVintOverflow(127)), 127u64.as_vint_with_length(1));
    }

    #[test]
    fn read_vint_overflow() {
        let buffer = [1, 0, 0, 0];
        let result = read_vint(&buffer).expect("Reading vint failed");

        assert_eq!(true, result.is_none());
    }

    #[test]
    #[should_panic]
    fn too_big_for_vint() {
        ((1u64 << 56) - 1).as_vint().expect("Writing vint failed");
    }

    #[test]
    fn vint_encode_decode_range() {
        for val in 0..500_000u64 {
            let bytes = val.as_vint().unwrap();
            let (result, length) = read_vint(bytes.as_slice()).unwrap().unwrap();
            assert_eq!(val, result);
            assert_eq!(bytes.len(), length);
            assert_eq!(EbmlSize::Known(val), EbmlSize::new(result, length));
        }
    }

    #[test]
    fn encode_ids() {
        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3], encode_element_id(0x1a45dfa3).unwrap());
        assert_eq!(vec![0xec], encode_element_id(0xec).unwrap());
        assert_eq!(Err(ToolError::InvalidElementId(0x7f)), encode_element_id(0x7f));
    }

    #[test]
    fn read_u64_values() {
        let mut buffer = vec![];
        let mut expected = 0;
        assert_eq!(0, arr_to_u64(&buffer).unwrap());
        for _ in 0..8 {
            buffer.push(0x25);
            expected = (expected << 8) + 0x25;

            let result = arr_to_u64(&buffer).unwrap();
            assert_eq!(expected, result);
        }
        buffer.push(0x25);
        assert!(arr_to_u64(&buffer).is_err());
    }

    #[test]
    fn read_i64_values() {
        let mut buffer = vec![];
        let mut expected = 0;
        assert_eq!(0, arr_to_i64(&buffer).unwrap());
        for _ in 0..8 {
            buffer.push(0x0a);
            expected = (expected << 8) + 0x0a;

            let result = arr_to_i64(&buffer).unwrap();
            assert_eq!(expected, result);

            let neg_result = arr_to_i64(&(buffer.iter().map(|b| !b).collect::<Vec<u8>>())).unwrap() + 1;
            assert_eq!(-expected, neg_result);
        }
    }

    #[test]
    fn read_f64_values() {
        assert_eq!(0.0, arr_to_f64(&[]).unwrap());
        assert_eq!(1.5, arr_to_f64(&1.5f32.to_be_bytes()).unwrap());
        assert_eq!(-0.1, arr_to_f64(&(-0.1f64).to_be_bytes()).unwrap());
        assert!(arr_to_f64(&[0, 0]).is_err());
    }
}
