use thiserror::Error;

use super::DataType;

///
/// Errors raised while building a [`Schema`](crate::Schema).
///
/// These are only ever produced at schema construction time.  A builder that produced one of these refuses to build.
///
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum SchemaError {
    #[error("Element definition '{name}' is missing the required id.")]
    MissingId { name: String },

    #[error("Element definition 0x{id:X} is missing the required name.")]
    MissingName { id: u32 },

    #[error("Element '{name}' (id 0x{id:X}) is missing the required data type.")]
    MissingType { id: u32, name: String },

    #[error("Element '{name}' (id 0x{id:X}) cannot be declared with the unknown data type.")]
    UnresolvableType { id: u32, name: String },

    #[error("Invalid element id 0x{id:X} for '{name}'.  Ids must be 1 to 4 bytes with a matching length marker.")]
    InvalidId { id: u32, name: String },

    #[error("Invalid element name: '{0}'")]
    InvalidName(String),

    #[error("Element '{name}' (id 0x{id:X}) of type {existing} redefined as {requested}.")]
    Redefined {
        id: u32,
        name: String,
        existing: DataType,
        requested: DataType,
    },

    #[error("Element '{name}' (id 0x{id:X}) redefined with different attributes.")]
    ConflictingAttributes { id: u32, name: String },

    #[error("Unknown parent element '{0}'.")]
    UnknownParent(String),

    #[error("Parent element '{0}' is not a master element.")]
    ParentNotMaster(String),
}
