//! Object header message type identifiers.

/// Header message types found in song files.
///
/// PyTables also attaches attributes, fill values and modification times to
/// every node; those are recognised so they can be skipped without tripping the
/// must-understand check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Nil,
    Dataspace,
    Datatype,
    FillValueOld,
    FillValue,
    DataLayout,
    FilterPipeline,
    Attribute,
    ObjectHeaderContinuation,
    SymbolTable,
    ObjectModificationTime,
    /// Any other message, with its raw type ID.
    Unknown(u16),
}

impl MessageType {
    /// Convert a raw type ID.
    pub fn from_u16(val: u16) -> MessageType {
        match val {
            0x0000 => MessageType::Nil,
            0x0001 => MessageType::Dataspace,
            0x0003 => MessageType::Datatype,
            0x0004 => MessageType::FillValueOld,
            0x0005 => MessageType::FillValue,
            0x0008 => MessageType::DataLayout,
            0x000B => MessageType::FilterPipeline,
            0x000C => MessageType::Attribute,
            0x0010 => MessageType::ObjectHeaderContinuation,
            0x0011 => MessageType::SymbolTable,
            0x0012 => MessageType::ObjectModificationTime,
            other => MessageType::Unknown(other),
        }
    }
}
