//!
//! Provides the EBML schema types.
//!
//! These are re-exported from the `ebml-tree-specification` crate.  Enable the `"serde"` feature to load schemas with
//! any serde data format through [`SchemaSource`].
//!

pub use ebml_tree_specification::ebml_header;
pub use ebml_tree_specification::element_id_length;
pub use ebml_tree_specification::DataType;
pub use ebml_tree_specification::DescriptorIndex;
pub use ebml_tree_specification::ElementAttributes;
pub use ebml_tree_specification::ElementDefinition;
pub use ebml_tree_specification::ElementDescriptor;
pub use ebml_tree_specification::ElementKey;
pub use ebml_tree_specification::Schema;
pub use ebml_tree_specification::SchemaBuilder;
pub use ebml_tree_specification::SchemaError;
#[cfg(feature = "serde")]
pub use ebml_tree_specification::SchemaSource;
