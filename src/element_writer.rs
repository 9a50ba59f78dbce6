use std::io::Write;
use std::sync::Arc;

use tracing::warn;

use ebml_tree_specification::{DataType, ElementKey, Schema};

use super::encoding::{encode_into, write_size, EncodeOptions};
use super::errors::writer::EncodeError;
use super::tools::{encode_element_id, unknown_size_vint, Vint};
use super::value::Value;

///
/// Provides a tool to write EBML files element by element.  Writes to a destination that implements [`std::io::Write`].
///
/// Whole elements can be written from [`Value`]s, and master elements can also be written piecewise by bracketing their
/// children with [`start_master`](ElementWriter::start_master) and [`end_master`](ElementWriter::end_master).  The size
/// of an open master is only known once it is closed, so everything written inside it is kept in memory until the
/// outermost open master ends.  Bytes already handed to the destination are never rewritten.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use ebml_tree::{ElementWriter, Value};
/// use ebml_tree::specs::{ebml_header, ElementKey, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Arc::new(Schema::from_definitions(None, ebml_header::header_definitions())?);
/// let mut dest = Vec::new();
/// let mut writer = ElementWriter::new(&mut dest, schema);
/// writer.start_master(&ElementKey::from("EBML"))?;
/// writer.write(&ElementKey::from("EBMLVersion"), &Value::from(16u64))?;
/// writer.end_master(&ElementKey::from("EBML"))?;
/// drop(writer);
/// assert_eq!(vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x10], dest);
/// # Ok(())
/// # }
/// ```
///
pub struct ElementWriter<W: Write>
{
    dest: W,
    schema: Arc<Schema>,
    open_tags: Vec<(u32, usize)>,
    working_buffer: Vec<u8>,
}

impl<W: Write> ElementWriter<W>
{
    pub fn new(dest: W, schema: Arc<Schema>) -> Self {
        ElementWriter {
            dest,
            schema,
            open_tags: Vec::new(),
            working_buffer: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    ///
    /// Number of master elements started but not yet ended.
    ///
    pub fn depth(&self) -> usize {
        self.open_tags.len()
    }

    fn master_id(&self, key: &ElementKey) -> Result<u32, EncodeError> {
        let descriptor = self.schema.get(key).ok_or_else(|| EncodeError::UnknownElement(key.clone()))?;
        if descriptor.data_type() != DataType::Master {
            return Err(EncodeError::ValueMismatch {
                name: descriptor.name().to_string(),
                data_type: descriptor.data_type(),
                found: "the start of a master element",
            });
        }
        Ok(descriptor.id())
    }

    ///
    /// Opens a master element.  Everything written until the matching [`end_master`](ElementWriter::end_master) becomes
    /// its payload.
    ///
    pub fn start_master(&mut self, key: &ElementKey) -> Result<(), EncodeError> {
        let id = self.master_id(key)?;
        self.open_tags.push((id, self.working_buffer.len()));
        Ok(())
    }

    ///
    /// Writes the header of a master element with the unknown size marker.  The element does not need to be ended: it
    /// ends at the first following element that is not one of its valid children.
    ///
    pub fn start_open_ended_master(&mut self, key: &ElementKey) -> Result<(), EncodeError> {
        let id = self.master_id(key)?;
        self.working_buffer.extend_from_slice(&encode_element_id(id)?);
        self.working_buffer.extend_from_slice(&unknown_size_vint(1)?);
        self.flush_completed()
    }

    ///
    /// Closes the innermost open master element.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnexpectedClosingTag`] if `key` is not the innermost open master element.
    ///
    pub fn end_master(&mut self, key: &ElementKey) -> Result<(), EncodeError> {
        let id = self.schema.get(key).ok_or_else(|| EncodeError::UnknownElement(key.clone()))?.id();
        match self.open_tags.pop() {
            Some((open_id, start)) => {
                if open_id == id {
                    let size = (self.working_buffer.len() - start) as u64;
                    self.finalize_tag(id, size)
                } else {
                    self.open_tags.push((open_id, start));
                    Err(EncodeError::UnexpectedClosingTag { id, expected_id: Some(open_id) })
                }
            },
            None => Err(EncodeError::UnexpectedClosingTag { id, expected_id: None }),
        }
    }

    fn finalize_tag(&mut self, id: u32, size: u64) -> Result<(), EncodeError> {
        let id_bytes = encode_element_id(id)?;
        let size_vint = size.as_vint()?;

        let index = self.working_buffer.len() - size as usize;
        self.working_buffer.splice(index..index, id_bytes.into_iter().chain(size_vint));

        self.flush_completed()
    }

    fn flush_completed(&mut self) -> Result<(), EncodeError> {
        if self.open_tags.is_empty() && !self.working_buffer.is_empty() {
            self.dest.write_all(&self.working_buffer)?;
            self.working_buffer.clear();
        }
        Ok(())
    }

    ///
    /// Encodes and writes a whole element.  A [`Value::Multiple`] writes one element per item.
    ///
    pub fn write(&mut self, key: &ElementKey, value: &Value) -> Result<(), EncodeError> {
        self.write_with(key, value, EncodeOptions::default())
    }

    pub fn write_with(&mut self, key: &ElementKey, value: &Value, options: EncodeOptions) -> Result<(), EncodeError> {
        let mut encoded = Vec::new();
        encode_into(&self.schema, key, value, options, &mut encoded)?;
        self.working_buffer.extend_from_slice(&encoded);
        self.flush_completed()
    }

    ///
    /// Writes an element with the given id and raw payload, whether or not the id is in the schema.
    ///
    pub fn write_raw(&mut self, id: u32, data: &[u8]) -> Result<(), EncodeError> {
        let id_bytes = encode_element_id(id)?;
        let size_vint = write_size(data.len() as u64, None)?;
        self.working_buffer.extend_from_slice(&id_bytes);
        self.working_buffer.extend_from_slice(&size_vint);
        self.working_buffer.extend_from_slice(data);
        self.flush_completed()
    }

    ///
    /// Flushes the destination.  Elements inside masters that are still open are not written yet.
    ///
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        self.dest.flush()?;
        Ok(())
    }

    ///
    /// Flushes the destination and consumes the writer.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::UnclosedMaster`] with the innermost open master if any master is still open.  Its buffered
    /// children are discarded.
    ///
    pub fn finish(mut self) -> Result<(), EncodeError> {
        let open_tags = std::mem::take(&mut self.open_tags);
        if let Some((id, _)) = open_tags.last() {
            return Err(EncodeError::UnclosedMaster { id: *id });
        }
        self.flush()
    }
}

impl<W: Write> Drop for ElementWriter<W> {
    fn drop(&mut self) {
        if let Some((id, _)) = self.open_tags.last() {
            warn!(id, open = self.open_tags.len(), buffered = self.working_buffer.len(), "element writer dropped with open master elements");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ebml_tree_specification::ebml_header::{self, EBML, EBML_VERSION};

    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::from_definitions(None, ebml_header::header_definitions()).unwrap())
    }

    #[test]
    fn write_ebml_tag() {
        let mut dest = Cursor::new(Vec::new());
        let mut writer = ElementWriter::new(&mut dest, schema());
        writer.write_raw(EBML, &[]).expect("Error writing tag");
        drop(writer);

        let zero_size = 0u64.as_vint().expect("Error converting [0] to vint")[0];
        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3, zero_size], dest.get_ref().to_vec());
    }

    #[test]
    fn nothing_is_written_until_outermost_master_ends() {
        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest, schema());
        writer.start_master(&ElementKey::Id(EBML)).unwrap();
        writer.write(&ElementKey::Id(EBML_VERSION), &Value::UnsignedInt(1)).unwrap();
        assert_eq!(1, writer.depth());
        writer.end_master(&ElementKey::Id(EBML)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3, 0x84, 0x42, 0x86, 0x81, 0x01], dest);
    }

    #[test]
    fn mismatched_closing_tag() {
        let mut writer = ElementWriter::new(Vec::new(), schema());
        assert!(matches!(
            writer.end_master(&ElementKey::Id(EBML)),
            Err(EncodeError::UnexpectedClosingTag { id: EBML, expected_id: None })
        ));

        writer.start_master(&ElementKey::Id(EBML)).unwrap();
        assert!(matches!(
            writer.end_master(&ElementKey::Id(EBML_VERSION)),
            Err(EncodeError::UnexpectedClosingTag { id: EBML_VERSION, expected_id: Some(EBML) })
        ));
        assert_eq!(1, writer.depth());
    }

    #[test]
    fn only_masters_can_be_started() {
        let mut writer = ElementWriter::new(Vec::new(), schema());
        assert!(matches!(writer.start_master(&ElementKey::Id(EBML_VERSION)), Err(EncodeError::ValueMismatch { .. })));
        assert!(matches!(writer.start_master(&ElementKey::from("Nope")), Err(EncodeError::UnknownElement(_))));
    }

    #[test]
    fn finish_reports_open_master() {
        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest, schema());
        writer.start_master(&ElementKey::Id(EBML)).unwrap();
        writer.write(&ElementKey::Id(EBML_VERSION), &Value::UnsignedInt(1)).unwrap();
        assert!(matches!(writer.finish(), Err(EncodeError::UnclosedMaster { id: EBML })));
        assert!(dest.is_empty());

        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest, schema());
        writer.write(&ElementKey::Id(EBML_VERSION), &Value::UnsignedInt(1)).unwrap();
        assert!(writer.finish().is_ok());
        assert_eq!(vec![0x42, 0x86, 0x81, 0x01], dest);
    }

    #[test]
    fn open_ended_master_header() {
        let mut dest = Vec::new();
        let mut writer = ElementWriter::new(&mut dest, schema());
        writer.start_open_ended_master(&ElementKey::Id(EBML)).unwrap();
        writer.write(&ElementKey::Id(EBML_VERSION), &Value::UnsignedInt(1)).unwrap();
        drop(writer);

        assert_eq!(vec![0x1a, 0x45, 0xdf, 0xa3, 0xff, 0x42, 0x86, 0x81, 0x01], dest);
    }
}
