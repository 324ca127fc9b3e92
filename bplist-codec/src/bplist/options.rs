/*!
 Optional arguments for decoding and encoding.
*/

use std::fmt::{Debug, Formatter, Result};

use crate::bplist::models::Value;

/// Called for every [`Value::Object`] while encoding; a returned class name is written
/// as a leading [`CLASS_KEY`](crate::bplist::models::CLASS_KEY) pair
pub type ArchiveHook<'h> = dyn FnMut(&Value) -> Option<String> + 'h;

/// Called with the value paired with a leading [`CLASS_KEY`](crate::bplist::models::CLASS_KEY)
/// while decoding; a returned dictionary or object replaces the dictionary being decoded
pub type UnarchiveHook<'h> = dyn FnMut(&Value) -> Option<Value> + 'h;

/// Options for [`decode_with`](crate::bplist::reader::decode_with)
#[derive(Default)]
pub struct DecodeOptions<'h> {
    /// Where the property list starts in the buffer
    pub byte_offset: usize,
    /// How many bytes the property list spans; defaults to the rest of the buffer
    pub byte_length: Option<usize>,
    /// Substitutes application objects for class-tagged dictionaries
    pub unarchiver: Option<&'h mut UnarchiveHook<'h>>,
}

impl Debug for DecodeOptions<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        fmt.debug_struct("DecodeOptions")
            .field("byte_offset", &self.byte_offset)
            .field("byte_length", &self.byte_length)
            .field("unarchiver", &self.unarchiver.is_some())
            .finish()
    }
}

/// Options for [`encode_with`](crate::bplist::writer::encode_with)
#[derive(Default)]
pub struct EncodeOptions<'h> {
    /// Names the class of application objects
    pub archiver: Option<&'h mut ArchiveHook<'h>>,
}

impl Debug for EncodeOptions<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        fmt.debug_struct("EncodeOptions")
            .field("archiver", &self.archiver.is_some())
            .finish()
    }
}
