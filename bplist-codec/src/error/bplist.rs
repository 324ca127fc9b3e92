/*!
 Errors that can happen when decoding or encoding binary property list data.
*/

use std::fmt::{Display, Formatter, Result};

/// Errors that can happen when decoding or encoding `bplist00` data
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryPlistError {
    /// The first six bytes are not `bplist`
    InvalidSignature,
    /// The two version bytes following the signature are not `00`
    UnsupportedVersion(u8, u8),
    /// The high nibble of a marker byte does not name a known type
    UnknownMarker(u8),
    /// An integer, real, or reference width outside of `{1, 2, 4, 8}` bytes
    UnsupportedWidth(usize),
    /// A value that does not fit in the width it must be written with
    IntegerOverflow(i128, usize),
    /// `NaN` was found while encoding
    InvalidNumber,
    /// A value that cannot be represented, with a description of why
    UnsupportedValue(String),
    /// A flattened dictionary with an odd number of references, at the given object index
    InvalidDictionary(usize),
    /// Index is outside of range
    OutOfBounds(usize, usize),
    /// Object reference is outside of the object table
    InvalidReference(u64, u64),
    /// An escaped length that is not stored as a marked integer
    InvalidLength(u8),
    /// An absolute time that cannot be expressed as a calendar date
    InvalidDate(f64),
    /// The trailer describes a table that does not fit in the buffer
    InvalidTrailer(String),
    /// A flattened object does not agree with its marker
    MarkerMismatch(usize, u8),
    /// Table geometry beyond what this codec writes
    Unsupported(&'static str, u64),
    /// Containers nested deeper than the given limit
    MaxDepth(usize),
}

impl Display for BinaryPlistError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        match self {
            BinaryPlistError::InvalidSignature => write!(fmt, "Not a binary plist!"),
            BinaryPlistError::UnsupportedVersion(major, minor) => write!(
                fmt,
                "Unsupported binary plist version: {}{}",
                *major as char, *minor as char
            ),
            BinaryPlistError::UnknownMarker(marker) => {
                write!(fmt, "Unknown object marker: {marker:#04x}")
            }
            BinaryPlistError::UnsupportedWidth(width) => {
                write!(fmt, "Unsupported {}-bit integer width", width * 8)
            }
            BinaryPlistError::IntegerOverflow(value, width) => {
                write!(fmt, "Integer {value} does not fit in {width} bytes")
            }
            BinaryPlistError::InvalidNumber => {
                write!(fmt, "Encountered NaN (Not-A-Number) while serializing")
            }
            BinaryPlistError::UnsupportedValue(why) => write!(fmt, "Unsupported value: {why}"),
            BinaryPlistError::InvalidDictionary(idx) => {
                write!(fmt, "Dictionary at object {idx} has an uneven key-value count")
            }
            BinaryPlistError::OutOfBounds(idx, len) => {
                write!(fmt, "Index {idx:x} is outside of range {len:x}!")
            }
            BinaryPlistError::InvalidReference(idx, count) => {
                write!(fmt, "Object reference {idx} is outside of table of {count} objects")
            }
            BinaryPlistError::InvalidLength(marker) => {
                write!(fmt, "Expected an integer length, found marker {marker:#04x}")
            }
            BinaryPlistError::InvalidDate(time) => {
                write!(fmt, "Absolute time {time} is not a valid date")
            }
            BinaryPlistError::InvalidTrailer(why) => write!(fmt, "Invalid trailer: {why}"),
            BinaryPlistError::MarkerMismatch(idx, marker) => {
                write!(fmt, "Object {idx} cannot be written with marker {marker:#04x}")
            }
            BinaryPlistError::Unsupported(what, value) => {
                write!(fmt, "{what} of {value} exceeds the 32-bit range")
            }
            BinaryPlistError::MaxDepth(limit) => {
                write!(fmt, "Containers are nested more than {limit} levels deep")
            }
        }
    }
}

impl std::error::Error for BinaryPlistError {}

#[cfg(test)]
mod tests {
    use crate::error::bplist::BinaryPlistError;

    #[test]
    fn can_display_version() {
        let error = BinaryPlistError::UnsupportedVersion(b'1', b'5');
        assert_eq!(error.to_string(), "Unsupported binary plist version: 15");
    }

    #[test]
    fn can_display_width() {
        let error = BinaryPlistError::UnsupportedWidth(16);
        assert_eq!(error.to_string(), "Unsupported 128-bit integer width");
    }

    #[test]
    fn can_display_depth() {
        let error = BinaryPlistError::MaxDepth(256);
        assert_eq!(error.to_string(), "Containers are nested more than 256 levels deep");
    }
}
