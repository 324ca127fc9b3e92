/*!
 Contains logic to encode a [`Value`] graph into a `bplist00` buffer.

 Encoding happens in three passes:
   1. [`flatten`](crate::bplist::flatten::flatten) assigns every distinct object an index
   2. [`measure`](crate::bplist::measure::measure) resolves every marker and computes the exact output size
   3. [`BinaryPlistWriter`] fills a buffer of that size
*/

use tracing::debug;

use crate::{
    bplist::{
        flatten::{flatten, FlatObject},
        marker::{Marker, MarkerType, MARKER_INT},
        measure::{measure, Measurement},
        models::Value,
        options::EncodeOptions,
        trailer::{Trailer, HEADER_MAGIC, HEADER_VERSION},
        varint::{write_real, write_signed, write_unsigned, IntWidth},
    },
    error::bplist::BinaryPlistError,
};

/// Contains logic and data used to serialize a flattened object table
pub struct BinaryPlistWriter<'a> {
    /// The object table, in index order
    objects: &'a [FlatObject],
    /// Final markers and table geometry
    measurement: &'a Measurement,
    /// The output, preallocated to its final size
    buffer: Vec<u8>,
    /// Where the next byte is written
    position: usize,
    /// Object index to the position of the object in the buffer
    offsets: Vec<usize>,
}

impl<'a> BinaryPlistWriter<'a> {
    pub fn new(objects: &'a [FlatObject], measurement: &'a Measurement) -> Self {
        Self {
            objects,
            measurement,
            buffer: vec![0; measurement.byte_length],
            position: 0,
            offsets: Vec::with_capacity(objects.len()),
        }
    }

    /// Write every section of the file and return the buffer
    pub fn write(mut self) -> Result<Vec<u8>, BinaryPlistError> {
        self.write_bytes(HEADER_MAGIC)?;
        self.write_bytes(HEADER_VERSION)?;

        let (objects, measurement) = (self.objects, self.measurement);
        for (object, marker) in objects.iter().zip(&measurement.markers) {
            self.offsets.push(self.position);
            self.write_object(object, *marker)?;
        }

        let offset_table_offset = self.position;
        let width = self.measurement.offset_int_size;
        for idx in 0..self.offsets.len() {
            let offset = self.offsets[idx] as u64;
            self.position += write_unsigned(&mut self.buffer, self.position, offset, width)?;
        }

        let trailer = Trailer {
            sort_version: 0,
            offset_int_size: self.measurement.offset_int_size,
            object_ref_size: self.measurement.object_ref_size,
            object_count: self.objects.len() as u64,
            root_object: 0,
            offset_table_offset: offset_table_offset as u64,
        };
        self.position += trailer.write(&mut self.buffer, self.position)?;

        if self.position != self.buffer.len() {
            return Err(BinaryPlistError::OutOfBounds(self.position, self.buffer.len()));
        }
        Ok(self.buffer)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BinaryPlistError> {
        let len = self.buffer.len();
        *self
            .buffer
            .get_mut(self.position)
            .ok_or(BinaryPlistError::OutOfBounds(self.position, len))? = byte;
        self.position += 1;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), BinaryPlistError> {
        let len = self.buffer.len();
        let end = self.position + bytes.len();
        self.buffer
            .get_mut(self.position..end)
            .ok_or(BinaryPlistError::OutOfBounds(end, len))?
            .copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Write a count that did not fit in the marker as a marked integer of minimal width
    fn write_length(&mut self, marker: Marker, count: usize) -> Result<(), BinaryPlistError> {
        if !marker.is_escaped() {
            return Ok(());
        }
        let width = IntWidth::for_unsigned(count as u64);
        self.write_byte(MARKER_INT | width.log2())?;
        self.position += write_unsigned(&mut self.buffer, self.position, count as u64, width)?;
        Ok(())
    }

    fn write_object(&mut self, object: &FlatObject, marker: Marker) -> Result<(), BinaryPlistError> {
        self.write_byte(marker.byte())?;

        match object {
            FlatObject::Null | FlatObject::Boolean(_) => {}
            FlatObject::Integer(value) => {
                let width = IntWidth::from_log2(marker.aux())?;
                self.position += write_signed(&mut self.buffer, self.position, *value, width)?;
            }
            FlatObject::Real(value) => {
                let width = IntWidth::from_log2(marker.aux())?;
                self.position += write_real(&mut self.buffer, self.position, *value, width)?;
            }
            FlatObject::Date(seconds) => {
                self.position +=
                    write_real(&mut self.buffer, self.position, *seconds, IntWidth::Eight)?;
            }
            FlatObject::Data(bytes) => {
                self.write_length(marker, bytes.len())?;
                self.write_bytes(bytes)?;
            }
            FlatObject::AsciiString(text) => {
                self.write_length(marker, text.len())?;
                self.write_bytes(text.as_bytes())?;
            }
            FlatObject::Utf16String(units) => {
                self.write_length(marker, units.len())?;
                for unit in units {
                    self.write_bytes(&unit.to_be_bytes())?;
                }
            }
            FlatObject::Uid(uid) => {
                let width = IntWidth::from_bytes(marker.aux() as usize + 1)?;
                self.position += write_unsigned(&mut self.buffer, self.position, *uid, width)?;
            }
            FlatObject::References(refs) => {
                let count = match marker.kind()? {
                    MarkerType::Dictionary => refs.len() / 2,
                    _ => refs.len(),
                };
                self.write_length(marker, count)?;
                let width = self.measurement.object_ref_size;
                for reference in refs {
                    self.position +=
                        write_unsigned(&mut self.buffer, self.position, *reference as u64, width)?;
                }
            }
        }
        Ok(())
    }
}

/// Encode the graph reachable from `root`
pub fn encode(root: &Value) -> Result<Vec<u8>, BinaryPlistError> {
    encode_with(root, EncodeOptions::default())
}

/// Encode the graph reachable from `root` using [`EncodeOptions`]
pub fn encode_with(root: &Value, options: EncodeOptions<'_>) -> Result<Vec<u8>, BinaryPlistError> {
    let graph = flatten(root, options.archiver)?;
    let measurement = measure(&graph.objects, &graph.markers)?;
    let buffer = BinaryPlistWriter::new(&graph.objects, &measurement).write()?;
    debug!(bytes = buffer.len(), objects = graph.objects.len(), "encoded binary plist");
    Ok(buffer)
}
