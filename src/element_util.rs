use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::errors::element::ElementError;
use super::tools::{self, decode_header_int};

///
/// The data size of an element as declared in its header.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EbmlSize {
    Known(u64),
    Unknown,
}

impl EbmlSize {
    ///
    /// Interprets a decoded size vint.  A vint whose value bits are all ones is the unknown size marker.
    ///
    pub fn new(size: u64, vint_length: usize) -> Self {
        if (1..=8).contains(&vint_length) && size == (1 << (7 * vint_length)) - 1 {
            EbmlSize::Unknown
        } else {
            EbmlSize::Known(size)
        }
    }

    pub fn known(&self) -> Option<u64> {
        match self {
            EbmlSize::Known(size) => Some(*size),
            EbmlSize::Unknown => None,
        }
    }
}

///
/// A parsed element header.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ElementHeader {
    pub id: u32,
    pub size: EbmlSize,
    pub header_len: u64,
}

///
/// Resolved payload size and child count of a master element, memoized together.
///
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Extent {
    pub size: u64,
    pub children: usize,
}

fn read_up_to<R: Read>(source: &mut R, buffer: &mut [u8]) -> Result<usize, ElementError> {
    let mut filled = 0;
    while filled < buffer.len() {
        match source.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(ElementError::ReadError { source }),
        }
    }
    Ok(filled)
}

fn corrupted(position: u64, problem: impl ToString) -> ElementError {
    ElementError::CorruptedData { position, problem: problem.to_string() }
}

///
/// Reads the element header at `position`.
///
/// Returns `None` if the source ends before a complete header could be read, whether that happens at `position` or in
/// the middle of the header.
///
pub(crate) fn read_header<R: Read + Seek>(source: &mut R, position: u64) -> Result<Option<ElementHeader>, ElementError> {
    source.seek(SeekFrom::Start(position))?;

    // 4 id bytes + 8 size bytes at most
    let mut buffer = [0u8; 12];
    if read_up_to(source, &mut buffer[..1])? == 0 {
        return Ok(None);
    }

    let (id_length, _) = decode_header_int(buffer[0]).map_err(|e| corrupted(position, e))?;
    if id_length > 4 {
        return Err(corrupted(position, format!("element id is {} bytes long", id_length)));
    }
    if read_up_to(source, &mut buffer[1..=id_length])? < id_length {
        return Ok(None);
    }

    let (size_length, _) = decode_header_int(buffer[id_length]).map_err(|e| corrupted(position, e))?;
    let total = id_length + size_length;
    if read_up_to(source, &mut buffer[(id_length + 1)..total])? < size_length - 1 {
        return Ok(None);
    }

    let id = tools::read_element_id(&buffer[..id_length]).map_err(|e| corrupted(position, e))?;
    let size = tools::read_element_size(&buffer[id_length..total]).map_err(|e| corrupted(position, e))?;
    match (id, size) {
        (Some((id, _)), Some((size, _))) => Ok(Some(ElementHeader { id, size, header_len: total as u64 })),
        _ => Ok(None),
    }
}

///
/// Reads exactly `size` bytes starting at `position`.  The buffer grows with the data actually read, so a corrupt
/// size never causes a huge allocation up front.
///
pub(crate) fn read_payload<R: Read + Seek>(source: &mut R, position: u64, size: u64) -> Result<Option<Vec<u8>>, ElementError> {
    source.seek(SeekFrom::Start(position))?;
    let mut buffer = Vec::new();
    source.by_ref().take(size).read_to_end(&mut buffer)?;
    if (buffer.len() as u64) < size {
        Ok(None)
    } else {
        Ok(Some(buffer))
    }
}
