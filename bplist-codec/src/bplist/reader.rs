/*!
 Contains logic to decode a `bplist00` buffer into a [`Value`] graph.

 Logic referenced from the Core Foundation binary property list source located at:
   - [`CFBinaryPList.c`](https://opensource.apple.com/source/CF/CF-1153.18/CFBinaryPList.c.auto.html)
   - [`ForFoundationOnly.h`](https://opensource.apple.com/source/CF/CF-1153.18/ForFoundationOnly.h.auto.html)
*/

use std::{cell::RefCell, rc::Rc};

use tracing::{trace, warn};

use crate::{
    bplist::{
        marker::{Marker, MarkerType, MARKER_FALSE, MARKER_NULL, MARKER_TRUE},
        models::{Value, CLASS_KEY, MAX_DEPTH},
        options::{DecodeOptions, UnarchiveHook},
        trailer::{Trailer, HEADER_MAGIC, HEADER_SIZE, HEADER_VERSION, TRAILER_SIZE},
        varint::{read_real, read_signed, read_unsigned, IntWidth},
    },
    error::bplist::BinaryPlistError,
    util::dates::from_absolute_time,
};

/// Contains logic and data used to decode a binary property list
pub struct BinaryPlistReader<'a, 'h> {
    /// The property list we want to decode
    stream: &'a [u8],
    /// Table geometry, read from the end of the stream
    trailer: Option<Trailer>,
    /// Object index to the position of the object in the stream
    offsets: Vec<usize>,
    /// As we resolve objects, cache them by index so shared references resolve to the same instance
    object_table: Vec<Option<Value>>,
    /// Substitutes application objects for class-tagged dictionaries
    unarchiver: Option<&'h mut UnarchiveHook<'h>>,
}

impl<'a, 'h> BinaryPlistReader<'a, 'h> {
    pub fn new(stream: &'a [u8]) -> Self {
        Self {
            stream,
            trailer: None,
            offsets: vec![],
            object_table: vec![],
            unarchiver: None,
        }
    }

    /// Read the property list found in `length` bytes starting at `offset`
    pub fn with_range(
        stream: &'a [u8],
        offset: usize,
        length: Option<usize>,
    ) -> Result<Self, BinaryPlistError> {
        let end = match length {
            Some(length) => offset.checked_add(length),
            None => Some(stream.len()),
        }
        .ok_or(BinaryPlistError::OutOfBounds(offset, stream.len()))?;

        let window = stream
            .get(offset..end)
            .ok_or(BinaryPlistError::OutOfBounds(end, stream.len()))?;
        Ok(Self::new(window))
    }

    /// Consult `hook` for dictionaries whose first key is [`CLASS_KEY`]
    pub fn with_unarchiver(mut self, hook: &'h mut UnarchiveHook<'h>) -> Self {
        self.unarchiver = Some(hook);
        self
    }

    /// Get the table geometry, available after [`BinaryPlistReader::parse`]
    pub fn trailer(&self) -> Option<&Trailer> {
        self.trailer.as_ref()
    }

    /// Decode the stream and return the root object
    pub fn parse(&mut self) -> Result<Value, BinaryPlistError> {
        self.validate_header()?;

        let trailer = Trailer::read(self.stream)?;
        trailer.validate(self.stream.len())?;
        if trailer.root_object != 0 {
            warn!(root = trailer.root_object, "unconventional top level object index");
        }
        self.trailer = Some(trailer);

        self.read_offset_table(&trailer)?;
        self.object_table = vec![None; self.offsets.len()];

        self.resolve(trailer.root_object, 0)
    }

    /// Check the magic number and version
    fn validate_header(&self) -> Result<(), BinaryPlistError> {
        if !is_signature_valid(self.stream, 0) {
            return Err(BinaryPlistError::InvalidSignature);
        }
        match self.stream.get(HEADER_MAGIC.len()..HEADER_SIZE) {
            Some(version) if version == HEADER_VERSION => Ok(()),
            Some(version) => Err(BinaryPlistError::UnsupportedVersion(version[0], version[1])),
            None => Err(BinaryPlistError::OutOfBounds(HEADER_SIZE, self.stream.len())),
        }
    }

    /// Build the index to offset mapping
    fn read_offset_table(&mut self, trailer: &Trailer) -> Result<(), BinaryPlistError> {
        let width = trailer.offset_int_size;
        let table = trailer.offset_table_offset as usize;
        let limit = self.stream.len() - TRAILER_SIZE;

        self.offsets = (0..trailer.object_count as usize)
            .map(|idx| {
                let offset = read_unsigned(self.stream, table + idx * width.bytes(), width)?;
                if offset < HEADER_SIZE as u64 || offset >= limit as u64 {
                    return Err(BinaryPlistError::OutOfBounds(offset as usize, limit));
                }
                Ok(offset as usize)
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Get the byte at a given index, if the index is within the bounds of the stream
    fn get_byte(&self, byte_idx: usize) -> Result<u8, BinaryPlistError> {
        self.stream
            .get(byte_idx)
            .copied()
            .ok_or(BinaryPlistError::OutOfBounds(byte_idx, self.stream.len()))
    }

    /// Read exactly `n` bytes from the stream
    fn read_exact_bytes(&self, offset: usize, n: usize) -> Result<&'a [u8], BinaryPlistError> {
        let end = offset
            .checked_add(n)
            .ok_or(BinaryPlistError::OutOfBounds(offset, self.stream.len()))?;
        self.stream
            .get(offset..end)
            .ok_or(BinaryPlistError::OutOfBounds(end, self.stream.len()))
    }

    /// Read an object reference stored inside a container
    fn read_reference(&self, offset: usize) -> Result<u64, BinaryPlistError> {
        let width = self
            .trailer
            .map(|trailer| trailer.object_ref_size)
            .unwrap_or(IntWidth::One);
        read_unsigned(self.stream, offset, width)
    }

    /// Read the count stored in a marker, returning the count and the offset of the data that follows it
    ///
    /// A low nibble of `0xF` means the count is stored as a marked integer right after the marker.
    fn read_length(&self, marker: Marker, offset: usize) -> Result<(usize, usize), BinaryPlistError> {
        let data_start = offset + 1;
        if !marker.is_escaped() {
            return Ok((marker.aux() as usize, data_start));
        }

        let length_marker = Marker::from_byte(self.get_byte(data_start)?);
        if length_marker.kind()? != MarkerType::Integer {
            return Err(BinaryPlistError::InvalidLength(length_marker.byte()));
        }
        let width = IntWidth::from_log2(length_marker.aux())?;
        let length = read_signed(self.stream, data_start + 1, width)?;
        let length =
            usize::try_from(length).map_err(|_| BinaryPlistError::InvalidLength(length_marker.byte()))?;

        Ok((length, data_start + 1 + width.bytes()))
    }

    /// Read the references of a container, ensuring they lie inside the stream before resolving any of them
    fn read_references(&self, offset: usize, count: usize) -> Result<Vec<u64>, BinaryPlistError> {
        let width = self
            .trailer
            .map(|trailer| trailer.object_ref_size.bytes())
            .unwrap_or(1);
        let size = count
            .checked_mul(width)
            .ok_or(BinaryPlistError::OutOfBounds(offset, self.stream.len()))?;
        self.read_exact_bytes(offset, size)?;

        (0..count)
            .map(|idx| self.read_reference(offset + idx * width))
            .collect()
    }

    /// Get an object by index, either from the cache or by decoding it
    ///
    /// `depth` is the number of containers that enclose the object.
    fn resolve(&mut self, index: u64, depth: usize) -> Result<Value, BinaryPlistError> {
        let count = self.offsets.len() as u64;
        if index >= count {
            return Err(BinaryPlistError::InvalidReference(index, count));
        }
        let index = index as usize;

        if let Some(value) = &self.object_table[index] {
            return Ok(value.clone());
        }
        let value = self.read_object(index, depth)?;
        self.object_table[index] = Some(value.clone());
        Ok(value)
    }

    /// Decode the object at `index`; containers register themselves before reading their children
    fn read_object(&mut self, index: usize, depth: usize) -> Result<Value, BinaryPlistError> {
        let offset = self.offsets[index];
        let marker = Marker::from_byte(self.get_byte(offset)?);

        let kind = marker.kind()?;
        if kind.is_container() && depth >= MAX_DEPTH {
            return Err(BinaryPlistError::MaxDepth(MAX_DEPTH));
        }

        match kind {
            MarkerType::Singleton => match marker.byte() {
                MARKER_NULL => Ok(Value::Null),
                MARKER_FALSE => Ok(Value::Boolean(false)),
                MARKER_TRUE => Ok(Value::Boolean(true)),
                other => Err(BinaryPlistError::UnknownMarker(other)),
            },
            MarkerType::Integer => {
                let width = IntWidth::from_log2(marker.aux())?;
                Ok(Value::Integer(read_signed(self.stream, offset + 1, width)?))
            }
            MarkerType::Real => match IntWidth::from_log2(marker.aux())? {
                IntWidth::Four => Ok(Value::Float(
                    read_real(self.stream, offset + 1, IntWidth::Four)? as f32,
                )),
                IntWidth::Eight => Ok(Value::Double(read_real(
                    self.stream,
                    offset + 1,
                    IntWidth::Eight,
                )?)),
                other => Err(BinaryPlistError::UnsupportedWidth(other.bytes())),
            },
            MarkerType::Date => {
                let seconds = read_real(self.stream, offset + 1, IntWidth::Eight)?;
                Ok(Value::date(from_absolute_time(seconds)?))
            }
            MarkerType::Data => {
                let (length, start) = self.read_length(marker, offset)?;
                // Copy so the decoded value does not borrow the source buffer
                Ok(Value::data(self.read_exact_bytes(start, length)?.to_vec()))
            }
            MarkerType::AsciiString => {
                let (length, start) = self.read_length(marker, offset)?;
                let text = self
                    .read_exact_bytes(start, length)?
                    .iter()
                    .map(|byte| *byte as char)
                    .collect();
                Ok(Value::String(text))
            }
            MarkerType::Utf16String => {
                let (length, start) = self.read_length(marker, offset)?;
                let size = length
                    .checked_mul(2)
                    .ok_or(BinaryPlistError::OutOfBounds(start, self.stream.len()))?;
                let units: Vec<u16> = self
                    .read_exact_bytes(start, size)?
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                match String::from_utf16(&units) {
                    Ok(text) => Ok(Value::String(text)),
                    Err(_) => Ok(Value::Utf16String(units)),
                }
            }
            MarkerType::Uid => {
                let width = IntWidth::from_bytes(marker.aux() as usize + 1)?;
                Ok(Value::uid(read_unsigned(self.stream, offset + 1, width)?))
            }
            MarkerType::Array | MarkerType::Set => {
                let (length, start) = self.read_length(marker, offset)?;
                let refs = self.read_references(start, length)?;

                let items = Rc::new(RefCell::new(Vec::with_capacity(length)));
                let value = if kind == MarkerType::Set {
                    Value::Set(Rc::clone(&items))
                } else {
                    Value::Array(Rc::clone(&items))
                };
                self.object_table[index] = Some(value.clone());

                for child in refs {
                    let child = self.resolve(child, depth + 1)?;
                    items.borrow_mut().push(child);
                }
                Ok(value)
            }
            MarkerType::Dictionary => self.read_dictionary(index, marker, offset, depth),
        }
    }

    /// Decode a dictionary, letting the unarchiver replace it if its first key is [`CLASS_KEY`]
    fn read_dictionary(
        &mut self,
        index: usize,
        marker: Marker,
        offset: usize,
        depth: usize,
    ) -> Result<Value, BinaryPlistError> {
        let (length, start) = self.read_length(marker, offset)?;
        let width = self
            .trailer
            .map(|trailer| trailer.object_ref_size.bytes())
            .unwrap_or(1);
        let block = length
            .checked_mul(width)
            .ok_or(BinaryPlistError::OutOfBounds(start, self.stream.len()))?;

        // Keys precede values
        let keys = self.read_references(start, length)?;
        let values = self.read_references(start + block, length)?;

        let mut value = Value::dictionary(Vec::with_capacity(length));
        self.object_table[index] = Some(value.clone());

        for (idx, (key_ref, value_ref)) in keys.into_iter().zip(values).enumerate() {
            let key = self.resolve(key_ref, depth + 1)?;
            let item = self.resolve(value_ref, depth + 1)?;

            // Only the literal first pair may carry the class name
            if idx == 0 && key.as_str() == Some(CLASS_KEY) {
                if let Some(unarchiver) = self.unarchiver.as_mut() {
                    match unarchiver(&item) {
                        Some(replacement @ (Value::Dictionary(_) | Value::Object(_))) => {
                            trace!(index, "replaced class-tagged dictionary");
                            self.object_table[index] = Some(replacement.clone());
                            value = replacement;
                            continue;
                        }
                        Some(other) => {
                            return Err(BinaryPlistError::UnsupportedValue(format!(
                                "unarchiver returned {other:?} instead of an object"
                            )))
                        }
                        None => {}
                    }
                }
            }

            match &value {
                Value::Dictionary(pairs) => pairs.borrow_mut().push((key, item)),
                Value::Object(object) => object.insert_pair(key, item),
                _ => {}
            }
        }

        Ok(value)
    }
}

/// Check whether the six bytes at `offset` are the binary property list magic number
pub fn is_signature_valid(buffer: &[u8], offset: usize) -> bool {
    offset
        .checked_add(HEADER_MAGIC.len())
        .and_then(|end| buffer.get(offset..end))
        .is_some_and(|magic| magic == HEADER_MAGIC)
}

/// Decode the property list that spans all of `buffer`
pub fn decode(buffer: &[u8]) -> Result<Value, BinaryPlistError> {
    BinaryPlistReader::new(buffer).parse()
}

/// Decode a property list using [`DecodeOptions`]
pub fn decode_with(buffer: &[u8], options: DecodeOptions<'_>) -> Result<Value, BinaryPlistError> {
    let mut reader = BinaryPlistReader::with_range(buffer, options.byte_offset, options.byte_length)?;
    if let Some(unarchiver) = options.unarchiver {
        reader = reader.with_unarchiver(unarchiver);
    }
    reader.parse()
}
