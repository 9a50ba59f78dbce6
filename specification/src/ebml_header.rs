use super::{DataType, ElementDefinition};

pub const EBML: u32 = 0x1A45DFA3;
pub const EBML_VERSION: u32 = 0x4286;
pub const EBML_READ_VERSION: u32 = 0x42F7;
pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
pub const DOC_TYPE: u32 = 0x4282;
pub const DOC_TYPE_VERSION: u32 = 0x4287;
pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;
pub const VOID: u32 = 0xEC;
pub const CRC_32: u32 = 0xBF;

///
/// The standard EBML header element, its children, and the global `Void` and `CRC-32` elements.
///
/// These are meant to be the first definitions of a schema.  The version elements default to `1`, and the maximum
/// id/size lengths to `4` and `8`.  `DocType` and `DocTypeVersion` carry no default; see [`header_definitions_for`].
///
pub fn header_definitions() -> Vec<ElementDefinition> {
    build(None, None)
}

///
/// Same as [`header_definitions`], with defaults for `DocType`, `DocTypeVersion` and `DocTypeReadVersion`.
///
/// The defaults become the schema's [`doc_type`](crate::Schema::doc_type) and [`version`](crate::Schema::version), and
/// are written into synthesized headers when encoding documents.
///
/// ## Example
///
/// ```
/// use ebml_tree_specification::{ebml_header, Schema};
///
/// let schema = Schema::from_definitions(None, ebml_header::header_definitions_for("webm", 4)).unwrap();
/// assert_eq!(Some("webm"), schema.doc_type());
/// assert_eq!(Some(4), schema.version());
/// assert_eq!("webm", schema.name());
/// ```
///
pub fn header_definitions_for(doc_type: &str, version: u64) -> Vec<ElementDefinition> {
    build(Some(doc_type), Some(version))
}

fn build(doc_type: Option<&str>, version: Option<u64>) -> Vec<ElementDefinition> {
    let mut doc_type_def = ElementDefinition::new(DOC_TYPE, "DocType", DataType::String).mandatory(true);
    let mut doc_type_version = ElementDefinition::new(DOC_TYPE_VERSION, "DocTypeVersion", DataType::UnsignedInt).mandatory(true);
    let mut doc_type_read_version = ElementDefinition::new(DOC_TYPE_READ_VERSION, "DocTypeReadVersion", DataType::UnsignedInt).mandatory(true);
    if let Some(doc_type) = doc_type {
        doc_type_def = doc_type_def.default_value(doc_type);
    }
    if let Some(version) = version {
        doc_type_version = doc_type_version.default_value(&version.to_string());
        doc_type_read_version = doc_type_read_version.default_value(&version.to_string());
    }

    vec![
        ElementDefinition::new(EBML, "EBML", DataType::Master).mandatory(true).with_children(vec![
            ElementDefinition::new(EBML_VERSION, "EBMLVersion", DataType::UnsignedInt).mandatory(true).default_value("1"),
            ElementDefinition::new(EBML_READ_VERSION, "EBMLReadVersion", DataType::UnsignedInt).mandatory(true).default_value("1"),
            ElementDefinition::new(EBML_MAX_ID_LENGTH, "EBMLMaxIDLength", DataType::UnsignedInt).mandatory(true).default_value("4"),
            ElementDefinition::new(EBML_MAX_SIZE_LENGTH, "EBMLMaxSizeLength", DataType::UnsignedInt).mandatory(true).default_value("8"),
            doc_type_def,
            doc_type_version,
            doc_type_read_version,
        ]),
        ElementDefinition::new(VOID, "Void", DataType::Binary).global(true),
        ElementDefinition::new(CRC_32, "CRC-32", DataType::Binary).global(true).length(4),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Schema;

    #[test]
    fn plain_header_has_no_doc_type() {
        let schema = Schema::from_definitions(None, header_definitions()).unwrap();
        assert_eq!(None, schema.doc_type());
        assert_eq!(None, schema.version());
        assert_eq!("ebml", schema.name());
        assert_eq!(Some("1"), schema.default_value(EBML_VERSION));
        assert_eq!(7, schema.by_id(EBML).unwrap().children().len());
    }
}
