pub mod tool {
    use thiserror::Error;

    ///
    /// Problems encoding or decoding vints and scalar payloads.
    ///
    #[derive(Error, Clone, PartialEq, Debug)]
    pub enum ToolError {
        #[error("Unrepresentable Vint size encountered.")]
        ReadVintOverflow,

        #[error("Element id is {0} bytes long.  Ids are at most 4 bytes.")]
        InvalidIdLength(usize),

        #[error("Value too large to be written as a vint: {0}")]
        WriteVintOverflow(u64),

        #[error("Invalid vint length: {0}.  Vints are 1 to 8 bytes.")]
        InvalidVintLength(usize),

        #[error("Invalid element id: 0x{0:X}")]
        InvalidElementId(u32),

        #[error("Could not read unsigned int from array: {0:?}")]
        ReadU64Overflow(Vec<u8>),

        #[error("Could not read int from array: {0:?}")]
        ReadI64Overflow(Vec<u8>),

        #[error("Could not read float from array: {0:?}")]
        ReadF64Mismatch(Vec<u8>),

        #[error("Could not read date from array: {0:?}.  Dates are exactly 8 bytes.")]
        ReadDateMismatch(Vec<u8>),

        #[error("Invalid length {0} for a float.  Floats are 0, 4 or 8 bytes.")]
        InvalidFloatLength(u64),

        #[error("Invalid length {0} for a date.  Dates are exactly 8 bytes.")]
        InvalidDateLength(u64),

        #[error("Invalid length {0} for an integer.  Integers are at most 8 bytes.")]
        InvalidIntLength(u64),

        #[error("Value needs {needed} bytes but the length is limited to {length}.")]
        ValueTooLong { needed: u64, length: u64 },

        #[error("Date is out of the representable range: {0}")]
        DateOutOfRange(String),

        #[error("Float {0} does not fit in 4 bytes.")]
        FloatOutOfRange(f64),
    }
}

pub mod element {
    use std::io;
    use thiserror::Error;

    use super::tool::ToolError;

    ///
    /// Problems with the source data found while navigating an element tree.
    ///
    #[derive(Error, Debug)]
    pub enum ElementError {
        #[error("Encountered corrupted data at offset {position}.  Message: {problem}")]
        CorruptedData {
            position: u64,
            problem: String,
        },

        #[error("Source ended inside the element at offset {position}.")]
        Truncated {
            position: u64,
        },

        #[error("Source data does not match the data type of element 0x{id:X} at offset {position}.")]
        DataMismatch {
            id: u32,
            position: u64,
            #[source]
            problem: ToolError,
        },

        #[error("Element 0x{id:X} at offset {position} has an unknown size but is not a master element.")]
        UnknownSizeNotMaster {
            id: u32,
            position: u64,
        },

        #[error("Element 0x{id:X} is not a master element and has no children.")]
        NotMaster {
            id: u32,
        },

        #[error("Unknown element id 0x{id:X} at offset {position}.")]
        UnknownElement {
            id: u32,
            position: u64,
        },

        #[error("Error reading from source.")]
        ReadError {
            #[from]
            source: io::Error,
        },
    }
}

pub mod writer {
    use std::io;
    use thiserror::Error;

    use ebml_tree_specification::{DataType, ElementKey};

    use super::tool::ToolError;

    ///
    /// Problems turning values into EBML.
    ///
    #[derive(Error, Debug)]
    pub enum EncodeError {
        #[error("Element '{0}' is not defined in the schema.")]
        UnknownElement(ElementKey),

        #[error("Cannot encode {found} as element '{name}' of type {data_type}.")]
        ValueMismatch {
            name: String,
            data_type: DataType,
            found: &'static str,
        },

        #[error("Element '{0}' does not allow multiple values.")]
        MultipleNotPermitted(String),

        #[error("Element '{0}' is not a master element and cannot have an unknown size.")]
        OpenEndedNotMaster(String),

        #[error("Element '{0}' is a master element and cannot be given an explicit length.")]
        UnsupportedLength(String),

        #[error("Value of element '{name}' needs {needed} bytes but its length is {length}.")]
        LengthExceeded {
            name: String,
            needed: u64,
            length: u64,
        },

        #[error(transparent)]
        Tool(#[from] ToolError),

        #[error("Unexpected closing tag 0x{id:X}.{}", expected_suffix(.expected_id))]
        UnexpectedClosingTag {
            id: u32,
            expected_id: Option<u32>,
        },

        #[error("Master element 0x{id:X} was never closed.")]
        UnclosedMaster {
            id: u32,
        },

        #[error("Error writing to destination.")]
        WriteError {
            #[from]
            source: io::Error,
        },
    }

    fn expected_suffix(expected_id: &Option<u32>) -> String {
        match expected_id {
            Some(expected) => format!(" Expected 0x{:X}.", expected),
            None => String::new(),
        }
    }
}
