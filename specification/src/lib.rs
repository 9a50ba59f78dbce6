//! This crate provides the schema registry that is used by the ebml-tree crate.
//!
//! A schema describes every element a document may contain: its id, name, data type, and which
//! containers it may appear in. Schemas are built once (from [`ElementDefinition`]s, or from a
//! [`SchemaSource`] when the `serde` feature is enabled) and are immutable afterwards.
//!

use std::collections::HashSet;
use std::fmt;

///
/// Contains the definitions of the standard EBML header elements.
///
pub mod ebml_header;

mod errors;
mod schema;

pub use errors::SchemaError;
pub use schema::{Schema, SchemaBuilder};
#[cfg(feature = "serde")]
pub use schema::SchemaSource;

///
/// Different data types defined in the EBML specification.
///
/// `Void` and `Unknown` are never declared by a schema source directly: an element named "Void" is
/// promoted to `Void`, and `Unknown` is only used at runtime for ids that the schema does not contain.
///
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    #[cfg_attr(feature = "serde", serde(rename = "master"))]
    Master,
    #[cfg_attr(feature = "serde", serde(rename = "uinteger"))]
    UnsignedInt,
    #[cfg_attr(feature = "serde", serde(rename = "integer"))]
    Integer,
    #[cfg_attr(feature = "serde", serde(rename = "float"))]
    Float,
    #[cfg_attr(feature = "serde", serde(rename = "string"))]
    String,
    #[cfg_attr(feature = "serde", serde(rename = "utf-8"))]
    Utf8,
    #[cfg_attr(feature = "serde", serde(rename = "date"))]
    Date,
    #[cfg_attr(feature = "serde", serde(rename = "binary"))]
    Binary,
    #[cfg_attr(feature = "serde", serde(rename = "void"))]
    Void,
    #[cfg_attr(feature = "serde", serde(skip))]
    Unknown,
}

impl DataType {
    ///
    /// Returns whether `self` is the same type as `other` or a specialization of it.
    ///
    /// Unsigned integers and dates are specializations of integers, utf-8 strings of strings, and void of binary.
    ///
    pub fn specializes(self, other: DataType) -> bool {
        self == other || matches!(
            (self, other),
            (DataType::UnsignedInt, DataType::Integer)
                | (DataType::Date, DataType::Integer)
                | (DataType::Utf8, DataType::String)
                | (DataType::Void, DataType::Binary)
        )
    }

    ///
    /// Whether values of this type are decoded eagerly by default.
    ///
    pub fn precache_by_default(self) -> bool {
        matches!(self, DataType::UnsignedInt | DataType::Integer | DataType::Float | DataType::Date)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Master => "master",
            DataType::UnsignedInt => "uinteger",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Utf8 => "utf-8",
            DataType::Date => "date",
            DataType::Binary => "binary",
            DataType::Void => "void",
            DataType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

///
/// A reference to an element by name or by id.
///
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ElementKey {
    Id(u32),
    Name(String),
}

impl From<u32> for ElementKey {
    fn from(id: u32) -> Self {
        ElementKey::Id(id)
    }
}

impl From<&str> for ElementKey {
    fn from(name: &str) -> Self {
        ElementKey::Name(name.to_string())
    }
}

impl From<String> for ElementKey {
    fn from(name: String) -> Self {
        ElementKey::Name(name)
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKey::Id(id) => write!(f, "0x{:X}", id),
            ElementKey::Name(name) => f.write_str(name),
        }
    }
}

///
/// Optional attributes of an element definition, exactly as they were stated in the schema source.
///
/// Repeated definitions of the same element are compared on these raw values, so an attribute that was never stated is
/// different from one explicitly set to its default.
///
#[derive(Clone, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElementAttributes {
    pub mandatory: Option<bool>,
    pub multiple: Option<bool>,
    pub precache: Option<bool>,
    pub length: Option<u64>,
    pub global: Option<bool>,
    pub default: Option<String>,
}

impl ElementAttributes {
    /// Returns a copy of `self` with every attribute stated in `other` written over it.
    pub fn merged_with(&self, other: &ElementAttributes) -> ElementAttributes {
        ElementAttributes {
            mandatory: other.mandatory.or(self.mandatory),
            multiple: other.multiple.or(self.multiple),
            precache: other.precache.or(self.precache),
            length: other.length.or(self.length),
            global: other.global.or(self.global),
            default: other.default.clone().or_else(|| self.default.clone()),
        }
    }
}

///
/// One element entry of a decoded schema source.
///
/// The first definition of an element must provide its id, name and data type. Later definitions of the same element
/// (used when an element may appear in more than one container) only need the id and/or name.
///
/// ## Example
///
/// ```
/// use ebml_tree_specification::{DataType, ElementDefinition};
///
/// let segment = ElementDefinition::new(0x18538067, "Segment", DataType::Master)
///     .with_children(vec![
///         ElementDefinition::new(0x4489, "Duration", DataType::Float),
///         ElementDefinition::new(0x73A4, "SegmentUID", DataType::Binary).length(16),
///     ]);
/// assert_eq!(segment.children.len(), 2);
/// ```
///
#[derive(Clone, Default, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ElementDefinition {
    pub id: Option<u32>,
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub data_type: Option<DataType>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub attributes: ElementAttributes,
    pub children: Vec<ElementDefinition>,
}

impl ElementDefinition {
    pub fn new(id: u32, name: &str, data_type: DataType) -> Self {
        ElementDefinition {
            id: Some(id),
            name: Some(name.to_string()),
            data_type: Some(data_type),
            ..Default::default()
        }
    }

    ///
    /// A repeated definition of an element that was (or will be) fully defined elsewhere in the schema.
    ///
    pub fn reference(key: impl Into<ElementKey>) -> Self {
        match key.into() {
            ElementKey::Id(id) => ElementDefinition { id: Some(id), ..Default::default() },
            ElementKey::Name(name) => ElementDefinition { name: Some(name), ..Default::default() },
        }
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.attributes.mandatory = Some(mandatory);
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.attributes.multiple = Some(multiple);
        self
    }

    pub fn precache(mut self, precache: bool) -> Self {
        self.attributes.precache = Some(precache);
        self
    }

    pub fn length(mut self, length: u64) -> Self {
        self.attributes.length = Some(length);
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.attributes.global = Some(global);
        self
    }

    pub fn default_value(mut self, default: &str) -> Self {
        self.attributes.default = Some(default.to_string());
        self
    }

    pub fn with_children(mut self, children: Vec<ElementDefinition>) -> Self {
        self.children = children;
        self
    }
}

///
/// Index of a descriptor within its [`Schema`].
///
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DescriptorIndex(pub(crate) usize);

///
/// Schema-time metadata for one element id.  Immutable once the owning [`Schema`] is built, and shared by every
/// occurrence of the element.
///
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ElementDescriptor {
    id: u32,
    name: String,
    data_type: DataType,
    mandatory: bool,
    multiple: bool,
    precache: bool,
    global: bool,
    length: Option<u64>,
    default: Option<String>,
    children: HashSet<u32>,
    attributes: ElementAttributes,
}

impl ElementDescriptor {
    pub(crate) fn new(id: u32, name: String, data_type: DataType, attributes: ElementAttributes) -> Self {
        ElementDescriptor {
            id,
            name,
            data_type,
            mandatory: attributes.mandatory.unwrap_or(false),
            multiple: attributes.multiple.unwrap_or(false),
            precache: attributes.precache.unwrap_or_else(|| data_type.precache_by_default()),
            global: attributes.global.unwrap_or(false),
            length: attributes.length,
            default: attributes.default.clone(),
            children: HashSet::new(),
            attributes,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn multiple(&self) -> bool {
        self.multiple
    }

    /// Whether the value is decoded while the parent container enumerates its children.
    pub fn precache(&self) -> bool {
        self.precache
    }

    pub fn global(&self) -> bool {
        self.global
    }

    /// Explicit payload length used when encoding, if any.
    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Ids declared as direct children of this element.  Always empty for non-master elements.
    pub fn children(&self) -> &HashSet<u32> {
        &self.children
    }

    /// The attributes exactly as they were stated in the schema source.
    pub fn attributes(&self) -> &ElementAttributes {
        &self.attributes
    }

    pub(crate) fn add_child(&mut self, id: u32) {
        self.children.insert(id);
    }
}

///
/// Returns the encoded byte length of a valid EBML element id, or `None` if the id is not one.
///
/// Ids keep their length marker, so a valid id of length `n` has its highest set bit at position `8n - n` counted from
/// the top of its first byte, e.g. `0x1A45DFA3` (4 bytes) or `0xEC` (1 byte).
///
pub fn element_id_length(id: u32) -> Option<usize> {
    if id == 0 {
        return None;
    }
    let byte_length = 4 - (id.leading_zeros() / 8) as usize;
    let first_byte = (id >> (8 * (byte_length - 1))) as u8;
    let marked_length = first_byte.leading_zeros() as usize + 1;
    if marked_length == byte_length && byte_length <= 4 {
        Some(byte_length)
    } else {
        None
    }
}
