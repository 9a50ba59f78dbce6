//! This crate provides a lazy, schema-driven element tree and an encoder for [EBML][EBML] files.
//!
//! [EBML][EBML] stands for Extensible Binary Meta-Language and is somewhat of a
//! binary version of XML. It's used for container formats like [WebM][webm] or
//! [MKV][mkv].
//!
//! # Schemas
//! Elements are interpreted with a [`specs::Schema`], which maps element ids to names, data types and nesting rules.
//! Schemas are built from element definitions (see [`specs::SchemaBuilder`]); the standard EBML header elements are
//! available from [`specs::ebml_header`].  With the `serde` feature, schemas can also be loaded from any serde format.
//!
//! # Reading
//! A [`Document`] wraps any `Read + Seek` source.  Its root elements, and the children of every master element, are
//! produced on demand: only headers are parsed while navigating, and values are read and cached the first time they
//! are requested.  Master elements with an "Unknown Data Size" as defined in [RFC8794][rfc8794] are supported; their
//! end is found by scanning for the first element that is not a valid child.
//!
//! # Writing
//! [`encode_element`] and [`encode_document`] turn [`Value`] trees into bytes, and [`ElementWriter`] writes elements one
//! at a time, including master elements given as start and end markers.
//!
//! [EBML]: http://ebml.sourceforge.net/
//! [webm]: https://www.webmproject.org/
//! [mkv]: http://www.matroska.org/technical/specs/index.html
//! [rfc8794]: https://datatracker.ietf.org/doc/rfc8794/
//!

mod document;
mod element;
mod element_iterator;
mod element_util;
mod element_writer;
mod encoding;
pub mod errors;
pub mod scalars;
pub mod specs;
pub mod tools;
mod value;

pub use self::document::{create_headers, encode_document, encode_document_to_vec, verify, Document, DocumentOptions};
pub use self::element::{Element, ElementValue, UNKNOWN_ELEMENT_NAME};
pub use self::element_iterator::Children;
pub use self::element_util::EbmlSize;
pub use self::element_writer::ElementWriter;
pub use self::encoding::{encode_element, encode_payload, EncodeOptions};
pub use self::value::Value;
