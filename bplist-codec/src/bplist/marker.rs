/*!
 The marker byte that prefixes every object in the object table.

 The high nibble names the type and the low nibble holds a length, a width, or a literal value.
 For data, strings, and containers a low nibble of `0xF` means the count does not fit in
 the nibble and follows as a separately marked integer.
*/

use crate::{
    bplist::{flatten::FlatObject, models::Value, varint::IntWidth},
    error::bplist::BinaryPlistError,
};

/// `null`
pub const MARKER_NULL: u8 = 0x00;
/// `false`
pub const MARKER_FALSE: u8 = 0x08;
/// `true`
pub const MARKER_TRUE: u8 = 0x09;
/// Padding; never a valid object
pub const MARKER_FILL: u8 = 0x0F;
/// Integer, low nibble is `log2` of the byte width
pub const MARKER_INT: u8 = 0x10;
/// Real, low nibble is `log2` of the byte width
pub const MARKER_REAL: u8 = 0x20;
/// Date, always an 8-byte float
pub const MARKER_DATE: u8 = 0x33;
/// Raw bytes
pub const MARKER_DATA: u8 = 0x40;
/// One byte per character
pub const MARKER_ASCII_STRING: u8 = 0x50;
/// Two bytes per UTF-16 code unit
pub const MARKER_UTF16_STRING: u8 = 0x60;
/// Keyed archiver UID, low nibble is the byte width minus one
pub const MARKER_UID: u8 = 0x80;
/// Array of object references
pub const MARKER_ARRAY: u8 = 0xA0;
/// Set of object references
pub const MARKER_SET: u8 = 0xC0;
/// Dictionary: key references followed by value references
pub const MARKER_DICT: u8 = 0xD0;

/// Low nibble value meaning the count follows as a marked integer
pub const AUX_ESCAPE: u8 = 0x0F;
/// Low nibble of a provisional integer marker whose width is chosen when measuring
pub const AUX_AUTO: u8 = 0x0F;

/// The type named by the high nibble of a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerType {
    /// `null`, `false`, `true`, or fill, depending on the low nibble
    Singleton,
    Integer,
    Real,
    Date,
    Data,
    AsciiString,
    Utf16String,
    Uid,
    Array,
    Set,
    Dictionary,
}

impl MarkerType {
    /// The high nibble, already shifted into place
    pub fn bits(self) -> u8 {
        match self {
            MarkerType::Singleton => 0x00,
            MarkerType::Integer => MARKER_INT,
            MarkerType::Real => MARKER_REAL,
            MarkerType::Date => MARKER_DATE & 0xF0,
            MarkerType::Data => MARKER_DATA,
            MarkerType::AsciiString => MARKER_ASCII_STRING,
            MarkerType::Utf16String => MARKER_UTF16_STRING,
            MarkerType::Uid => MARKER_UID,
            MarkerType::Array => MARKER_ARRAY,
            MarkerType::Set => MARKER_SET,
            MarkerType::Dictionary => MARKER_DICT,
        }
    }

    /// Whether the low nibble holds a count that may be escaped
    pub fn has_length(self) -> bool {
        matches!(
            self,
            MarkerType::Data
                | MarkerType::AsciiString
                | MarkerType::Utf16String
                | MarkerType::Array
                | MarkerType::Set
                | MarkerType::Dictionary
        )
    }

    /// Whether the object refers to other objects
    pub fn is_container(self) -> bool {
        matches!(
            self,
            MarkerType::Array | MarkerType::Set | MarkerType::Dictionary
        )
    }
}

/// A single marker byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker(u8);

impl Marker {
    pub fn new(kind: MarkerType, aux: u8) -> Self {
        Self(kind.bits() | (aux & 0x0F))
    }

    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    pub fn byte(self) -> u8 {
        self.0
    }

    /// The low nibble
    pub fn aux(self) -> u8 {
        self.0 & 0x0F
    }

    /// Whether the count follows the marker as a marked integer
    pub fn is_escaped(self) -> bool {
        self.aux() == AUX_ESCAPE
    }

    /// Determine the type named by the high nibble
    pub fn kind(self) -> Result<MarkerType, BinaryPlistError> {
        match self.0 & 0xF0 {
            0x00 => Ok(MarkerType::Singleton),
            MARKER_INT => Ok(MarkerType::Integer),
            MARKER_REAL => Ok(MarkerType::Real),
            0x30 => Ok(MarkerType::Date),
            MARKER_DATA => Ok(MarkerType::Data),
            MARKER_ASCII_STRING => Ok(MarkerType::AsciiString),
            MARKER_UTF16_STRING => Ok(MarkerType::Utf16String),
            MARKER_UID => Ok(MarkerType::Uid),
            MARKER_ARRAY => Ok(MarkerType::Array),
            MARKER_SET => Ok(MarkerType::Set),
            MARKER_DICT => Ok(MarkerType::Dictionary),
            _ => Err(BinaryPlistError::UnknownMarker(self.0)),
        }
    }
}

/// The number of bytes needed after the marker to store a count that does not fit in the low nibble
pub fn escaped_length_size(count: usize) -> usize {
    if count < AUX_ESCAPE as usize {
        0
    } else {
        1 + IntWidth::for_unsigned(count as u64).bytes()
    }
}

/// Pick the marker for a value before any lengths are known
///
/// Plain non-negative integers get [`AUX_AUTO`] and lengths are left at zero; both are resolved by [`finalize`].
pub fn classify(value: &Value) -> Result<Marker, BinaryPlistError> {
    Ok(match value {
        Value::Null => Marker(MARKER_NULL),
        Value::Boolean(true) => Marker(MARKER_TRUE),
        Value::Boolean(false) => Marker(MARKER_FALSE),
        Value::Integer(value) if *value < 0 => Marker::new(MarkerType::Integer, IntWidth::Eight.log2()),
        Value::Integer(_) => Marker::new(MarkerType::Integer, AUX_AUTO),
        Value::SizedInteger(sized) => Marker::new(MarkerType::Integer, sized.width.log2()),
        Value::Float(value) if value.is_nan() => return Err(BinaryPlistError::InvalidNumber),
        Value::Float(_) => Marker::new(MarkerType::Real, IntWidth::Four.log2()),
        Value::Double(value) if value.is_nan() => return Err(BinaryPlistError::InvalidNumber),
        Value::Double(_) => Marker::new(MarkerType::Real, IntWidth::Eight.log2()),
        Value::Date(_) => Marker(MARKER_DATE),
        Value::Data(_) => Marker(MARKER_DATA),
        Value::String(text) if text.is_ascii() => Marker(MARKER_ASCII_STRING),
        Value::String(_) | Value::Utf16String(_) => Marker(MARKER_UTF16_STRING),
        Value::Uid(_) => Marker(MARKER_UID),
        Value::Array(_) => Marker(MARKER_ARRAY),
        Value::Set(_) => Marker(MARKER_SET),
        Value::Dictionary(_) | Value::Object(_) => Marker(MARKER_DICT),
    })
}

/// Resolve a provisional marker into the marker that will be written, now that lengths are known
pub fn finalize(
    index: usize,
    object: &FlatObject,
    provisional: Marker,
) -> Result<Marker, BinaryPlistError> {
    let mismatch = || BinaryPlistError::MarkerMismatch(index, provisional.byte());
    let kind = provisional.kind()?;

    let with_count = |count: usize| {
        let aux = if count < AUX_ESCAPE as usize {
            count as u8
        } else {
            AUX_ESCAPE
        };
        Marker::new(kind, aux)
    };

    match (kind, object) {
        (MarkerType::Singleton, FlatObject::Null | FlatObject::Boolean(_)) => Ok(provisional),
        (MarkerType::Integer, FlatObject::Integer(value)) => {
            if provisional.aux() == AUX_AUTO {
                Ok(Marker::new(kind, IntWidth::for_signed(*value).log2()))
            } else {
                IntWidth::from_log2(provisional.aux())?;
                Ok(provisional)
            }
        }
        (MarkerType::Real, FlatObject::Real(_)) => {
            let width = IntWidth::from_log2(provisional.aux())?;
            match width {
                IntWidth::Four | IntWidth::Eight => Ok(provisional),
                other => Err(BinaryPlistError::UnsupportedWidth(other.bytes())),
            }
        }
        (MarkerType::Date, FlatObject::Date(_)) => Ok(Marker(MARKER_DATE)),
        (MarkerType::Data, FlatObject::Data(bytes)) => Ok(with_count(bytes.len())),
        (MarkerType::AsciiString, FlatObject::AsciiString(text)) => Ok(with_count(text.len())),
        (MarkerType::Utf16String, FlatObject::Utf16String(units)) => Ok(with_count(units.len())),
        (MarkerType::Uid, FlatObject::Uid(uid)) => {
            let width = IntWidth::for_unsigned(*uid);
            Ok(Marker::new(kind, (width.bytes() - 1) as u8))
        }
        (MarkerType::Array | MarkerType::Set, FlatObject::References(refs)) => {
            Ok(with_count(refs.len()))
        }
        (MarkerType::Dictionary, FlatObject::References(refs)) => {
            if refs.len() % 2 != 0 {
                return Err(BinaryPlistError::InvalidDictionary(index));
            }
            Ok(with_count(refs.len() / 2))
        }
        _ => Err(mismatch()),
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::{
        bplist::{
            flatten::FlatObject,
            marker::{classify, finalize, Marker, MarkerType, AUX_AUTO, MARKER_DICT},
            models::Value,
        },
        error::bplist::BinaryPlistError,
    };

    #[test]
    fn can_split_marker() {
        let marker = Marker::from_byte(0xD3);
        assert_eq!(marker.kind(), Ok(MarkerType::Dictionary));
        assert_eq!(marker.aux(), 3);
        assert!(!marker.is_escaped());
        assert!(Marker::from_byte(0x5F).is_escaped());
    }

    #[test]
    fn can_identify_containers() {
        assert!(MarkerType::Array.is_container());
        assert!(MarkerType::Set.is_container());
        assert!(MarkerType::Dictionary.is_container());
        assert!(!MarkerType::Data.is_container());
        assert!(!MarkerType::Uid.is_container());
    }

    #[test]
    fn cant_classify_unknown_type() {
        assert_eq!(
            Marker::from_byte(0x70).kind(),
            Err(BinaryPlistError::UnknownMarker(0x70))
        );
        assert_eq!(
            Marker::from_byte(0xF0).kind(),
            Err(BinaryPlistError::UnknownMarker(0xF0))
        );
    }

    #[test]
    fn can_classify_scalars() {
        assert_eq!(classify(&Value::Null).unwrap().byte(), 0x00);
        assert_eq!(classify(&Value::Boolean(false)).unwrap().byte(), 0x08);
        assert_eq!(classify(&Value::Boolean(true)).unwrap().byte(), 0x09);
        assert_eq!(classify(&Value::Integer(-1)).unwrap().byte(), 0x13);
        assert_eq!(classify(&Value::Integer(5)).unwrap().aux(), AUX_AUTO);
        assert_eq!(classify(&Value::Double(1.5)).unwrap().byte(), 0x23);
        assert_eq!(classify(&Value::Float(1.5)).unwrap().byte(), 0x22);
        assert_eq!(classify(&Value::from("abc")).unwrap().byte(), 0x50);
        assert_eq!(classify(&Value::from("ábc")).unwrap().byte(), 0x60);
    }

    #[test]
    fn cant_classify_nan() {
        assert_eq!(
            classify(&Value::Double(f64::NAN)),
            Err(BinaryPlistError::InvalidNumber)
        );
        assert_eq!(
            classify(&Value::Float(f32::NAN)),
            Err(BinaryPlistError::InvalidNumber)
        );
    }

    #[test]
    fn can_finalize_auto_integer() {
        let provisional = classify(&Value::Integer(5)).unwrap();
        let marker = finalize(0, &FlatObject::Integer(5), provisional).unwrap();
        assert_eq!(marker.byte(), 0x10);

        let provisional = classify(&Value::Integer(70_000)).unwrap();
        let marker = finalize(0, &FlatObject::Integer(70_000), provisional).unwrap();
        assert_eq!(marker.byte(), 0x12);
    }

    #[test]
    fn can_finalize_lengths() {
        let short = FlatObject::AsciiString("abc".to_string());
        assert_eq!(finalize(0, &short, Marker::from_byte(0x50)).unwrap().byte(), 0x53);

        let long = FlatObject::Data(Rc::new(vec![0; 15]));
        assert_eq!(finalize(0, &long, Marker::from_byte(0x40)).unwrap().byte(), 0x4F);

        let dict = FlatObject::References(vec![1, 2, 3, 4]);
        assert_eq!(finalize(0, &dict, Marker::from_byte(MARKER_DICT)).unwrap().byte(), 0xD2);
    }

    #[test]
    fn can_finalize_uid_width() {
        let marker = finalize(0, &FlatObject::Uid(0x1234), Marker::from_byte(0x80)).unwrap();
        assert_eq!(marker.byte(), 0x81);
        let marker = finalize(0, &FlatObject::Uid(0x1_0000_0000), Marker::from_byte(0x80)).unwrap();
        assert_eq!(marker.byte(), 0x87);
    }

    #[test]
    fn cant_finalize_odd_dictionary() {
        let dict = FlatObject::References(vec![1, 2, 3]);
        assert_eq!(
            finalize(4, &dict, Marker::from_byte(MARKER_DICT)),
            Err(BinaryPlistError::InvalidDictionary(4))
        );
    }

    #[test]
    fn cant_finalize_mismatch() {
        assert_eq!(
            finalize(2, &FlatObject::Null, Marker::from_byte(0x50)),
            Err(BinaryPlistError::MarkerMismatch(2, 0x50))
        );
    }
}
