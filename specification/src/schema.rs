use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use super::ebml_header::{DOC_TYPE, DOC_TYPE_VERSION};
use super::errors::SchemaError;
use super::{element_id_length, DataType, DescriptorIndex, ElementDefinition, ElementDescriptor, ElementKey};

const DOCUMENT: usize = 0;

///
/// A decoded schema source: an optional schema name and the (nested) element definitions.
///
/// Only available with the `serde` feature.  Any serde data format can be used to store schemas this way.
///
#[cfg(feature = "serde")]
#[derive(Clone, Default, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SchemaSource {
    pub name: Option<String>,
    pub elements: Vec<ElementDefinition>,
}

///
/// An EBML schema, mapping element ids and names to [`ElementDescriptor`]s.
///
/// Descriptors are stored in a flat table; nesting is expressed with sets of child ids so that containers never own
/// their children.  The first slot of the table is the document descriptor, whose children are the valid root
/// elements.  A `Schema` is immutable once built and is usually shared behind an `Arc`.
///
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    descriptors: Vec<ElementDescriptor>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    globals: HashSet<u32>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    ///
    /// Builds a schema from a list of (possibly nested) element definitions.  Top level definitions are root elements.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] encountered.  No schema is produced in that case.
    ///
    pub fn from_definitions<I>(name: Option<&str>, definitions: I) -> Result<Schema, SchemaError>
        where I: IntoIterator<Item = ElementDefinition>
    {
        let mut builder = SchemaBuilder::new();
        if let Some(name) = name {
            builder = builder.with_name(name);
        }
        for definition in definitions {
            builder.add_tree(definition, None)?;
        }
        builder.build()
    }

    #[cfg(feature = "serde")]
    pub fn from_source(source: SchemaSource) -> Result<Schema, SchemaError> {
        Schema::from_definitions(source.name.as_deref(), source.elements)
    }

    ///
    /// The schema name.  Defaults to the default value of the `DocType` element when no name was given.
    ///
    pub fn name(&self) -> &str {
        &self.name
    }

    ///
    /// The descriptor of the document (root container) of this schema.
    ///
    pub fn document(&self) -> &ElementDescriptor {
        &self.descriptors[DOCUMENT]
    }

    pub fn document_index(&self) -> DescriptorIndex {
        DescriptorIndex(DOCUMENT)
    }

    ///
    /// Gets a descriptor by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this schema.
    ///
    pub fn descriptor(&self, index: DescriptorIndex) -> &ElementDescriptor {
        &self.descriptors[index.0]
    }

    pub fn index_of(&self, id: u32) -> Option<DescriptorIndex> {
        self.by_id.get(&id).map(|&index| DescriptorIndex(index))
    }

    pub fn by_id(&self, id: u32) -> Option<&ElementDescriptor> {
        self.by_id.get(&id).map(|&index| &self.descriptors[index])
    }

    pub fn by_name(&self, name: &str) -> Option<&ElementDescriptor> {
        self.by_name.get(name).map(|&index| &self.descriptors[index])
    }

    pub fn get(&self, key: &ElementKey) -> Option<&ElementDescriptor> {
        match key {
            ElementKey::Id(id) => self.by_id(*id),
            ElementKey::Name(name) => self.by_name(name),
        }
    }

    ///
    /// Gets a descriptor by key, falling back to the caller supplied `default` when the key is not in the schema.
    ///
    pub fn get_or<'a>(&'a self, key: &ElementKey, default: &'a ElementDescriptor) -> &'a ElementDescriptor {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.get(key).is_some()
    }

    ///
    /// Whether `id` is a global element, i.e. valid as a child of any container.
    ///
    pub fn is_global(&self, id: u32) -> bool {
        self.globals.contains(&id)
    }

    pub fn globals(&self) -> &HashSet<u32> {
        &self.globals
    }

    ///
    /// Iterates over every element descriptor in registration order.  The document descriptor is not included.
    ///
    pub fn descriptors(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.descriptors.iter().skip(1)
    }

    pub fn default_value(&self, id: u32) -> Option<&str> {
        self.by_id(id).and_then(|descriptor| descriptor.default_value())
    }

    ///
    /// The document type this schema describes, taken from the default value of the EBML `DocType` element.
    ///
    pub fn doc_type(&self) -> Option<&str> {
        self.default_value(DOC_TYPE)
    }

    ///
    /// The schema version, taken from the default value of the EBML `DocTypeVersion` element.
    ///
    pub fn version(&self) -> Option<u64> {
        self.default_value(DOC_TYPE_VERSION).and_then(|v| v.trim().parse().ok())
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.descriptors[1..] == other.descriptors[1..]
            && self.document().children() == other.document().children()
    }
}

///
/// Builds a [`Schema`] one element definition at a time.
///
/// The same element may be added several times (e.g. once per container it may appear in) as long as the repeated
/// definitions agree with the first one.  Once any addition fails the builder is poisoned and [`SchemaBuilder::build`]
/// returns that error.
///
/// ## Example
///
/// ```
/// use ebml_tree_specification::{DataType, ElementDefinition, ElementKey, SchemaBuilder};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut builder = SchemaBuilder::new().with_name("example");
/// builder.add(ElementDefinition::new(0x1A45DFA3, "EBML", DataType::Master), None)?;
/// builder.add(ElementDefinition::new(0x4286, "EBMLVersion", DataType::UnsignedInt), Some(&ElementKey::from("EBML")))?;
/// let schema = builder.build()?;
/// assert!(schema.by_name("EBML").unwrap().children().contains(&0x4286));
/// # Ok(())
/// # }
/// ```
///
#[derive(Debug)]
pub struct SchemaBuilder {
    name: Option<String>,
    descriptors: Vec<ElementDescriptor>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    globals: HashSet<u32>,
    error: Option<SchemaError>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        SchemaBuilder::new()
    }
}

impl SchemaBuilder {
    pub fn new() -> Self {
        SchemaBuilder {
            name: None,
            descriptors: vec![ElementDescriptor::new(0, String::new(), DataType::Master, Default::default())],
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            globals: HashSet::new(),
            error: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    ///
    /// Registers one element definition as a child of `parent` (or as a root element when `parent` is `None`).
    /// Nested children of `definition` are ignored; see [`SchemaBuilder::add_tree`].
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] if the definition is incomplete, invalid, or conflicts with an earlier definition of
    /// the same element.  The builder is poisoned afterwards.
    ///
    pub fn add(&mut self, definition: ElementDefinition, parent: Option<&ElementKey>) -> Result<DescriptorIndex, SchemaError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let result = self.register(definition, parent);
        if let Err(err) = &result {
            self.error = Some(err.clone());
        }
        result
    }

    ///
    /// Registers `definition` and, recursively, all of its nested children.
    ///
    pub fn add_tree(&mut self, mut definition: ElementDefinition, parent: Option<&ElementKey>) -> Result<DescriptorIndex, SchemaError> {
        let children = std::mem::take(&mut definition.children);
        let index = self.add(definition, parent)?;
        let key = ElementKey::Id(self.descriptors[index.0].id());
        for child in children {
            self.add_tree(child, Some(&key))?;
        }
        Ok(index)
    }

    ///
    /// Finishes the schema.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by [`SchemaBuilder::add`], if any.
    ///
    pub fn build(mut self) -> Result<Schema, SchemaError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let doc_type = self.by_id.get(&DOC_TYPE)
            .and_then(|&index| self.descriptors[index].default_value())
            .map(str::to_string);
        let name = self.name.or(doc_type).unwrap_or_else(|| String::from("ebml"));
        self.descriptors[DOCUMENT].name = format!("{}Document", name);

        debug!(schema = %name, elements = self.descriptors.len() - 1, "built schema");

        Ok(Schema {
            name,
            descriptors: self.descriptors,
            by_id: self.by_id,
            by_name: self.by_name,
            globals: self.globals,
        })
    }

    fn lookup(&self, key: &ElementKey) -> Option<usize> {
        match key {
            ElementKey::Id(id) => self.by_id.get(id).copied(),
            ElementKey::Name(name) => self.by_name.get(name).copied(),
        }
    }

    fn register(&mut self, definition: ElementDefinition, parent: Option<&ElementKey>) -> Result<DescriptorIndex, SchemaError> {
        let parent_index = match parent {
            None => DOCUMENT,
            Some(key) => {
                let index = self.lookup(key).ok_or_else(|| SchemaError::UnknownParent(key.to_string()))?;
                if self.descriptors[index].data_type() != DataType::Master {
                    return Err(SchemaError::ParentNotMaster(key.to_string()));
                }
                index
            }
        };

        let existing = definition.id.and_then(|id| self.by_id.get(&id).copied())
            .or_else(|| definition.name.as_ref().and_then(|name| self.by_name.get(name).copied()));

        let index = match existing {
            Some(index) => self.check_duplicate(index, &definition)?,
            None => self.insert(definition)?,
        };

        let id = self.descriptors[index].id();
        self.descriptors[parent_index].add_child(id);
        Ok(DescriptorIndex(index))
    }

    fn check_duplicate(&self, index: usize, definition: &ElementDefinition) -> Result<usize, SchemaError> {
        let existing = &self.descriptors[index];
        let conflict = || SchemaError::ConflictingAttributes { id: existing.id(), name: existing.name().to_string() };

        if definition.id.map_or(false, |id| id != existing.id()) {
            return Err(conflict());
        }
        if definition.name.as_deref().map_or(false, |name| name != existing.name()) {
            return Err(conflict());
        }

        if let Some(requested) = definition.data_type {
            if !existing.data_type().specializes(requested) {
                return Err(SchemaError::Redefined {
                    id: existing.id(),
                    name: existing.name().to_string(),
                    existing: existing.data_type(),
                    requested,
                });
            }
        }

        if &existing.attributes().merged_with(&definition.attributes) != existing.attributes() {
            return Err(conflict());
        }

        trace!(id = existing.id(), name = existing.name(), "reusing element descriptor");
        Ok(index)
    }

    fn insert(&mut self, definition: ElementDefinition) -> Result<usize, SchemaError> {
        let id = definition.id.ok_or_else(|| SchemaError::MissingId {
            name: definition.name.clone().unwrap_or_default(),
        })?;
        let name = definition.name.ok_or(SchemaError::MissingName { id })?;
        let name = name.trim().to_string();

        if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return Err(SchemaError::InvalidName(name));
        }

        let data_type = match definition.data_type {
            Some(DataType::Unknown) => return Err(SchemaError::UnresolvableType { id, name }),
            Some(DataType::Binary) if name == "Void" => DataType::Void,
            Some(data_type) => data_type,
            None => return Err(SchemaError::MissingType { id, name }),
        };

        if element_id_length(id).is_none() {
            return Err(SchemaError::InvalidId { id, name });
        }

        let descriptor = ElementDescriptor::new(id, name.clone(), data_type, definition.attributes);
        if descriptor.global() {
            self.globals.insert(id);
        }

        trace!(id, name = %name, %data_type, "registered element");

        let index = self.descriptors.len();
        self.descriptors.push(descriptor);
        self.by_id.insert(id, index);
        self.by_name.insert(name, index);
        Ok(index)
    }
}
