use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek};
use std::rc::Rc;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tracing::{debug, trace};

use ebml_tree_specification::{DataType, DescriptorIndex, ElementDescriptor, ElementKey, Schema};

use super::element_iterator::Children;
use super::element_util::{read_header, read_payload, EbmlSize, ElementHeader, Extent};
use super::errors::element::ElementError;
use super::scalars;
use super::value::Value;

///
/// The name reported by elements whose id is not in the schema.
///
pub const UNKNOWN_ELEMENT_NAME: &str = "UnknownElement";

pub(crate) enum Payload<R: Read + Seek> {
    Scalar(Value),
    Children(Vec<Element<R>>),
}

impl<R: Read + Seek> Clone for Payload<R> {
    fn clone(&self) -> Self {
        match self {
            Payload::Scalar(value) => Payload::Scalar(value.clone()),
            Payload::Children(children) => Payload::Children(children.clone()),
        }
    }
}

///
/// The decoded value of an [`Element`], borrowed from its cache.
///
pub enum ElementValue<'a, R: Read + Seek> {
    Scalar(&'a Value),
    Children(&'a [Element<R>]),
}

impl<'a, R: Read + Seek> ElementValue<'a, R> {
    pub fn as_scalar(&self) -> Option<&'a Value> {
        match self {
            ElementValue::Scalar(value) => Some(value),
            ElementValue::Children(_) => None,
        }
    }

    pub fn as_children(&self) -> Option<&'a [Element<R>]> {
        match self {
            ElementValue::Scalar(_) => None,
            ElementValue::Children(children) => Some(children),
        }
    }
}

///
/// One element occurrence in an EBML stream.
///
/// An `Element` only holds the parsed header; its payload is read from the shared source the first time [`value`](Element::value)
/// is called and cached until [`clear_cache`](Element::clear_cache).  The value of a master element is the list of its
/// immediate children, which are themselves lazy.
///
/// Elements whose id is not in the schema are still produced, with [`DataType::Unknown`] and a raw binary value.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use ebml_tree::{Document, Value};
/// use ebml_tree::specs::{ebml_header, Schema};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Arc::new(Schema::from_definitions(None, ebml_header::header_definitions())?);
/// let document = Document::from_bytes(schema, vec![0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x10])?;
///
/// let header = &document.children()?[0];
/// assert_eq!("EBML", header.name());
/// let version = &header.children()?[0];
/// assert_eq!(Some(16), version.value()?.as_scalar().and_then(Value::as_u64));
/// # Ok(())
/// # }
/// ```
///
pub struct Element<R: Read + Seek> {
    source: Rc<RefCell<R>>,
    schema: Arc<Schema>,
    descriptor: Option<DescriptorIndex>,
    id: u32,
    offset: u64,
    payload_offset: u64,
    size: EbmlSize,
    extent: OnceCell<Extent>,
    cache: OnceCell<Payload<R>>,
}

impl<R: Read + Seek> Element<R> {
    ///
    /// Parses the element header at `position`.  Returns `None` if the source ends before a complete header.
    ///
    pub(crate) fn read_at(source: &Rc<RefCell<R>>, schema: &Arc<Schema>, position: u64) -> Result<Option<Element<R>>, ElementError> {
        let header = {
            let mut source = source.borrow_mut();
            read_header(&mut *source, position)?
        };
        match header {
            Some(header) => Element::from_header(source, schema, position, header).map(Some),
            None => Ok(None),
        }
    }

    ///
    /// Builds the element for a header already parsed at `position`.
    ///
    pub(crate) fn from_header(source: &Rc<RefCell<R>>, schema: &Arc<Schema>, position: u64, header: ElementHeader) -> Result<Element<R>, ElementError> {
        let descriptor = schema.index_of(header.id);
        if descriptor.is_none() {
            debug!(id = header.id, position, "element id not in schema");
        }

        let element = Element {
            source: Rc::clone(source),
            schema: Arc::clone(schema),
            descriptor,
            id: header.id,
            offset: position,
            payload_offset: position + header.header_len,
            size: header.size,
            extent: OnceCell::new(),
            cache: OnceCell::new(),
        };

        if element.size == EbmlSize::Unknown && !element.is_master() {
            return Err(ElementError::UnknownSizeNotMaster { id: element.id, position });
        }

        Ok(element)
    }

    ///
    /// Creates the root container of a document: a master element without a header whose payload is `size` bytes at
    /// `payload_offset`.
    ///
    pub(crate) fn root(source: Rc<RefCell<R>>, schema: Arc<Schema>, payload_offset: u64, size: u64) -> Element<R> {
        let descriptor = Some(schema.document_index());
        Element {
            source,
            schema,
            descriptor,
            id: 0,
            offset: payload_offset,
            payload_offset,
            size: EbmlSize::Known(size),
            extent: OnceCell::new(),
            cache: OnceCell::new(),
        }
    }

    pub(crate) fn source(&self) -> &Rc<RefCell<R>> {
        &self.source
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    ///
    /// The schema descriptor of this element, or `None` if its id is not in the schema.
    ///
    pub fn descriptor(&self) -> Option<&ElementDescriptor> {
        self.descriptor.map(|index| self.schema.descriptor(index))
    }

    pub fn name(&self) -> &str {
        self.descriptor().map_or(UNKNOWN_ELEMENT_NAME, ElementDescriptor::name)
    }

    ///
    /// The key used for this element in dumped value trees: its name, or its id when unknown.
    ///
    pub fn key(&self) -> ElementKey {
        match self.descriptor() {
            Some(descriptor) => ElementKey::Name(descriptor.name().to_string()),
            None => ElementKey::Id(self.id),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.descriptor().map_or(DataType::Unknown, ElementDescriptor::data_type)
    }

    pub fn is_master(&self) -> bool {
        self.data_type() == DataType::Master
    }

    pub fn is_unknown(&self) -> bool {
        self.descriptor.is_none()
    }

    /// Offset of the element header in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset of the element payload in the source.
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    pub fn header_len(&self) -> u64 {
        self.payload_offset - self.offset
    }

    ///
    /// The size as written in the header, which may be [`EbmlSize::Unknown`] for master elements.
    ///
    pub fn declared_size(&self) -> EbmlSize {
        self.size
    }

    ///
    /// The payload size in bytes.
    ///
    /// For a master element with an unknown size, this scans forward from the payload until the source ends or an
    /// element that is neither a valid child nor a global element is found.  The result is memoized.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] if the scan hits corrupted data or the source cannot be read.
    ///
    pub fn size(&self) -> Result<u64, ElementError> {
        match self.size {
            EbmlSize::Known(size) => Ok(size),
            EbmlSize::Unknown => Ok(self.extent()?.size),
        }
    }

    /// Offset of the first byte after this element.
    pub fn end(&self) -> Result<u64, ElementError> {
        Ok(self.payload_offset + self.size()?)
    }

    pub(crate) fn resolved_extent(&self) -> Option<&Extent> {
        self.extent.get()
    }

    pub(crate) fn record_extent(&self, extent: Extent) {
        if self.extent.set(extent).is_ok() {
            trace!(id = self.id, offset = self.offset, size = extent.size, children = extent.children, "resolved element extent");
        }
    }

    fn extent(&self) -> Result<&Extent, ElementError> {
        self.extent.get_or_try_init(|| {
            let mut scan = Children::scanning(self);
            for child in &mut scan {
                child?;
            }
            let extent = scan.extent().ok_or(ElementError::NotMaster { id: self.id })?;
            if self.size == EbmlSize::Unknown {
                debug!(id = self.id, offset = self.offset, size = extent.size, children = extent.children, "resolved unknown-size element");
            }
            Ok(extent)
        })
    }

    ///
    /// Whether `id` may appear directly inside this element: one of its declared children or a global element.
    ///
    pub fn is_valid_child(&self, id: u32) -> bool {
        match self.descriptor() {
            Some(descriptor) if descriptor.data_type() == DataType::Master => {
                descriptor.children().contains(&id) || self.schema.is_global(id)
            },
            _ => false,
        }
    }

    ///
    /// Returns a forward cursor over the children of this master element.
    ///
    /// Each step reads only the next child's header (and its value, if the child is marked `precache`).  A cursor over a
    /// non-master element yields nothing.
    ///
    pub fn iter(&self) -> Children<'_, R> {
        Children::new(self)
    }

    ///
    /// Number of children of a master element.  Memoized along with the resolved size.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::NotMaster`] for other elements, or any error found while scanning the children.
    ///
    pub fn len(&self) -> Result<usize, ElementError> {
        if !self.is_master() {
            return Err(ElementError::NotMaster { id: self.id });
        }
        if let Some(Payload::Children(children)) = self.cache.get() {
            return Ok(children.len());
        }
        Ok(self.extent()?.children)
    }

    pub fn is_empty(&self) -> Result<bool, ElementError> {
        Ok(self.len()? == 0)
    }

    ///
    /// Reads, decodes and caches the element value.  Later calls return the cached value without touching the source.
    ///
    /// # Errors
    ///
    /// Returns an [`ElementError`] if the payload cannot be read or does not match the element's data type.
    ///
    pub fn value(&self) -> Result<ElementValue<'_, R>, ElementError> {
        let payload = self.cache.get_or_try_init(|| self.load())?;
        Ok(match payload {
            Payload::Scalar(value) => ElementValue::Scalar(value),
            Payload::Children(children) => ElementValue::Children(children),
        })
    }

    ///
    /// The children of a master element, read and cached on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::NotMaster`] for other elements.
    ///
    pub fn children(&self) -> Result<&[Element<R>], ElementError> {
        if !self.is_master() {
            return Err(ElementError::NotMaster { id: self.id });
        }
        match self.value()? {
            ElementValue::Children(children) => Ok(children),
            ElementValue::Scalar(_) => Err(ElementError::NotMaster { id: self.id }),
        }
    }

    fn load(&self) -> Result<Payload<R>, ElementError> {
        match self.data_type() {
            DataType::Master => {
                let children = self.iter().collect::<Result<Vec<_>, _>>()?;
                Ok(Payload::Children(children))
            },
            DataType::Void => Ok(Payload::Scalar(Value::Binary(Vec::new()))),
            data_type => {
                let payload = self.raw_payload()?;
                let value = scalars::decode(data_type, &payload).map_err(|problem| ElementError::DataMismatch {
                    id: self.id,
                    position: self.offset,
                    problem,
                })?;
                Ok(Payload::Scalar(value))
            },
        }
    }

    pub(crate) fn precache(&self) -> Result<(), ElementError> {
        if self.descriptor().map_or(false, ElementDescriptor::precache) {
            self.value()?;
        }
        Ok(())
    }

    fn read_range(&self, position: u64, size: u64) -> Result<Vec<u8>, ElementError> {
        let mut source = self.source.borrow_mut();
        read_payload(&mut *source, position, size)?.ok_or(ElementError::Truncated { position: self.offset })
    }

    ///
    /// The raw bytes of the element payload.
    ///
    pub fn raw_payload(&self) -> Result<Vec<u8>, ElementError> {
        let size = self.size()?;
        self.read_range(self.payload_offset, size)
    }

    ///
    /// The raw bytes of the whole element, header included.
    ///
    pub fn raw(&self) -> Result<Vec<u8>, ElementError> {
        let size = self.size()?;
        self.read_range(self.offset, self.header_len() + size)
    }

    ///
    /// Drops the cached value, returning the number of cached values cleared.
    ///
    /// With `recursive`, the caches of the cached children are cleared (and counted) first.  The resolved size of
    /// unknown-size elements is structural and is kept.
    ///
    pub fn clear_cache(&mut self, recursive: bool) -> usize {
        match self.cache.take() {
            None => 0,
            Some(Payload::Children(mut children)) if recursive => {
                1 + children.iter_mut().map(|child| child.clear_cache(true)).sum::<usize>()
            },
            Some(_) => 1,
        }
    }

    ///
    /// Produces an owned value tree of this element.
    ///
    /// Scalars produce their value.  Master elements produce a [`Value::Master`] keyed by child name (or id, for
    /// unknown children).  Children that the schema allows more than once are gathered into one [`Value::Multiple`]
    /// entry at the position of their first occurrence; for other repeated children the last value wins.
    ///
    pub fn dump(&self) -> Result<Value, ElementError> {
        match self.value()? {
            ElementValue::Scalar(value) => Ok(value.clone()),
            ElementValue::Children(children) => dump_children(children),
        }
    }
}

pub(crate) fn dump_children<R: Read + Seek>(children: &[Element<R>]) -> Result<Value, ElementError> {
    let mut entries: Vec<(ElementKey, Value)> = Vec::new();
    let mut positions: HashMap<ElementKey, usize> = HashMap::new();

    for child in children {
        let key = child.key();
        let value = child.dump()?;
        let multiple = child.descriptor().map_or(false, ElementDescriptor::multiple);

        match positions.get(&key) {
            Some(&index) => match &mut entries[index].1 {
                Value::Multiple(values) if multiple => values.push(value),
                existing => *existing = value,
            },
            None => {
                positions.insert(key.clone(), entries.len());
                entries.push((key, if multiple { Value::Multiple(vec![value]) } else { value }));
            },
        }
    }

    Ok(Value::Master(entries))
}

impl<R: Read + Seek> Clone for Element<R> {
    fn clone(&self) -> Self {
        Element {
            source: Rc::clone(&self.source),
            schema: Arc::clone(&self.schema),
            descriptor: self.descriptor,
            id: self.id,
            offset: self.offset,
            payload_offset: self.payload_offset,
            size: self.size,
            extent: self.extent.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<R: Read + Seek> PartialEq for Element<R> {
    ///
    /// Known elements are equal when they are the same occurrence of the same element: same data type, id, size and
    /// offset, read with the same schema.  Values are not compared.  Unknown elements are equal when their ids and raw
    /// values are.
    ///
    fn eq(&self, other: &Self) -> bool {
        match (self.descriptor, other.descriptor) {
            (Some(_), Some(_)) => {
                self.data_type() == other.data_type()
                    && self.id == other.id
                    && self.offset == other.offset
                    && self.size().ok() == other.size().ok()
                    && (Arc::ptr_eq(&self.schema, &other.schema) || *self.schema == *other.schema)
            },
            (None, None) => {
                if self.id != other.id {
                    return false;
                }
                match (self.value(), other.value()) {
                    (Ok(ElementValue::Scalar(a)), Ok(ElementValue::Scalar(b))) => a == b,
                    _ => false,
                }
            },
            _ => false,
        }
    }
}

impl<R: Read + Seek> fmt::Debug for Element<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.name())
            .field("id", &format_args!("0x{:X}", self.id))
            .field("data_type", &self.data_type())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}
