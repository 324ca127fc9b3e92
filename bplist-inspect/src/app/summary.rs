/*!
 Describes the layout of a decoded property list.
*/

use std::fmt::{Display, Formatter, Result};

use bplist_codec::{bplist::trailer::Trailer, IntWidth, Value};

/// The geometry read from a property list's trailer, plus the type of its root object
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Size of the property list in bytes
    pub byte_length: usize,
    /// Table geometry
    pub trailer: Trailer,
    /// Name of the root object's type
    pub root_type: &'static str,
}

impl Summary {
    pub fn new(byte_length: usize, trailer: Trailer, root: &Value) -> Self {
        Self {
            byte_length,
            trailer,
            root_type: Summary::type_name(root),
        }
    }

    fn type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::SizedInteger(_) => "integer",
            Value::Float(_) | Value::Double(_) => "real",
            Value::Date(_) => "date",
            Value::Data(_) => "data",
            Value::String(_) | Value::Utf16String(_) => "string",
            Value::Uid(_) => "UID",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Dictionary(_) => "dictionary",
            Value::Object(_) => "object",
        }
    }

    fn width(width: IntWidth) -> String {
        match width.bytes() {
            1 => "1 byte".to_string(),
            bytes => format!("{bytes} bytes"),
        }
    }
}

impl Display for Summary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        writeln!(fmt, "Size:            {} bytes", self.byte_length)?;
        writeln!(fmt, "Objects:         {}", self.trailer.object_count)?;
        writeln!(
            fmt,
            "Root object:     {} ({})",
            self.trailer.root_object, self.root_type
        )?;
        writeln!(
            fmt,
            "Offset width:    {}",
            Summary::width(self.trailer.offset_int_size)
        )?;
        writeln!(
            fmt,
            "Reference width: {}",
            Summary::width(self.trailer.object_ref_size)
        )?;
        write!(
            fmt,
            "Offset table:    byte {}",
            self.trailer.offset_table_offset
        )
    }
}
