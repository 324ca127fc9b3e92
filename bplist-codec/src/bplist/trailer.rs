/*!
 The fixed 32-byte footer that describes the layout of the rest of the file.

 ```txt
 [0..5]   unused
 [5]      sort version
 [6]      offset table integer width
 [7]      object reference width
 [8..16]  object count
 [16..24] root object index
 [24..32] offset table offset
 ```
*/

use crate::{
    bplist::varint::{read_unsigned, IntWidth},
    error::bplist::BinaryPlistError,
};

/// The size of the trailer in bytes
pub const TRAILER_SIZE: usize = 32;

/// The magic number at the start of every binary property list
pub const HEADER_MAGIC: &[u8; 6] = b"bplist";

/// The only version this codec reads and writes
pub const HEADER_VERSION: &[u8; 2] = b"00";

/// The size of the magic number and version
pub const HEADER_SIZE: usize = 8;

/// Geometry of the object table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Unused by this codec; always written as `0`
    pub sort_version: u8,
    /// Width of each entry in the offset table
    pub offset_int_size: IntWidth,
    /// Width of each object reference inside arrays, sets, and dictionaries
    pub object_ref_size: IntWidth,
    /// Number of objects in the table
    pub object_count: u64,
    /// Index of the top level object
    pub root_object: u64,
    /// Where the offset table starts
    pub offset_table_offset: u64,
}

impl Trailer {
    /// Read the trailer from the last [`TRAILER_SIZE`] bytes of `stream`
    pub fn read(stream: &[u8]) -> Result<Self, BinaryPlistError> {
        let start = stream
            .len()
            .checked_sub(TRAILER_SIZE)
            .ok_or(BinaryPlistError::OutOfBounds(TRAILER_SIZE, stream.len()))?;
        let trailer = &stream[start..];

        Ok(Self {
            sort_version: trailer[5],
            offset_int_size: IntWidth::from_bytes(trailer[6] as usize)?,
            object_ref_size: IntWidth::from_bytes(trailer[7] as usize)?,
            object_count: read_unsigned(trailer, 8, IntWidth::Eight)?,
            root_object: read_unsigned(trailer, 16, IntWidth::Eight)?,
            offset_table_offset: read_unsigned(trailer, 24, IntWidth::Eight)?,
        })
    }

    /// Ensure the tables described by the trailer lie inside a stream of `stream_len` bytes
    pub fn validate(&self, stream_len: usize) -> Result<(), BinaryPlistError> {
        if self.object_count == 0 {
            return Err(BinaryPlistError::InvalidTrailer(
                "object table is empty".to_string(),
            ));
        }
        if self.root_object >= self.object_count {
            return Err(BinaryPlistError::InvalidReference(
                self.root_object,
                self.object_count,
            ));
        }

        let table_end = self
            .object_count
            .checked_mul(self.offset_int_size.bytes() as u64)
            .and_then(|size| size.checked_add(self.offset_table_offset));
        let limit = stream_len.saturating_sub(TRAILER_SIZE) as u64;
        match table_end {
            Some(end) if self.offset_table_offset >= HEADER_SIZE as u64 && end <= limit => Ok(()),
            _ => Err(BinaryPlistError::InvalidTrailer(format!(
                "offset table at {} with {} entries does not fit before byte {limit}",
                self.offset_table_offset, self.object_count
            ))),
        }
    }

    /// Write the trailer into the last [`TRAILER_SIZE`] bytes starting at `offset`
    ///
    /// Only the form whose 64-bit fields have a zero high word is written.
    pub fn write(&self, buffer: &mut [u8], offset: usize) -> Result<usize, BinaryPlistError> {
        let len = buffer.len();
        let out = offset
            .checked_add(TRAILER_SIZE)
            .and_then(|end| buffer.get_mut(offset..end))
            .ok_or(BinaryPlistError::OutOfBounds(offset.saturating_add(TRAILER_SIZE), len))?;

        let fields = [
            ("Object count", self.object_count),
            ("Root object index", self.root_object),
            ("Offset table offset", self.offset_table_offset),
        ];

        out[..5].fill(0);
        out[5] = self.sort_version;
        out[6] = self.offset_int_size.bytes() as u8;
        out[7] = self.object_ref_size.bytes() as u8;
        for (idx, (name, value)) in fields.into_iter().enumerate() {
            let value = u32::try_from(value)
                .map_err(|_| BinaryPlistError::Unsupported(name, value))?;
            let start = 8 + idx * 8;
            out[start..start + 4].fill(0);
            out[start + 4..start + 8].copy_from_slice(&value.to_be_bytes());
        }

        Ok(TRAILER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bplist::{
            trailer::{Trailer, TRAILER_SIZE},
            varint::IntWidth,
        },
        error::bplist::BinaryPlistError,
    };

    fn sample() -> Trailer {
        Trailer {
            sort_version: 0,
            offset_int_size: IntWidth::One,
            object_ref_size: IntWidth::Two,
            object_count: 3,
            root_object: 0,
            offset_table_offset: 20,
        }
    }

    #[test]
    fn can_write_layout() {
        let mut buffer = [0xAA; TRAILER_SIZE];
        sample().write(&mut buffer, 0).unwrap();
        let expected = [
            0, 0, 0, 0, 0, 0, 1, 2, // unused, sort version, widths
            0, 0, 0, 0, 0, 0, 0, 3, // object count
            0, 0, 0, 0, 0, 0, 0, 0, // root
            0, 0, 0, 0, 0, 0, 0, 20, // offset table
        ];
        assert_eq!(buffer, expected);
    }

    #[test]
    fn can_read_written() {
        let mut buffer = vec![0u8; 40];
        sample().write(&mut buffer, 8).unwrap();
        assert_eq!(Trailer::read(&buffer), Ok(sample()));
    }

    #[test]
    fn can_read_high_word() {
        let mut buffer = [0u8; TRAILER_SIZE];
        buffer[6] = 8;
        buffer[7] = 8;
        buffer[8] = 1;
        let trailer = Trailer::read(&buffer).unwrap();
        assert_eq!(trailer.object_count, 1 << 56);
    }

    #[test]
    fn cant_read_short_stream() {
        assert_eq!(
            Trailer::read(&[0u8; 10]),
            Err(BinaryPlistError::OutOfBounds(32, 10))
        );
    }

    #[test]
    fn cant_read_bad_width() {
        let mut buffer = [0u8; TRAILER_SIZE];
        buffer[6] = 3;
        buffer[7] = 1;
        assert_eq!(
            Trailer::read(&buffer),
            Err(BinaryPlistError::UnsupportedWidth(3))
        );
    }

    #[test]
    fn cant_write_large_count() {
        let mut trailer = sample();
        trailer.object_count = u32::MAX as u64 + 1;
        let mut buffer = [0u8; TRAILER_SIZE];
        assert!(matches!(
            trailer.write(&mut buffer, 0),
            Err(BinaryPlistError::Unsupported(_, _))
        ));
    }

    #[test]
    fn can_validate() {
        // Three 1-byte offsets starting at 20, then the trailer
        assert!(sample().validate(20 + 3 + TRAILER_SIZE).is_ok());
        assert!(sample().validate(20 + 2 + TRAILER_SIZE).is_err());

        let mut trailer = sample();
        trailer.root_object = 3;
        assert_eq!(
            trailer.validate(100),
            Err(BinaryPlistError::InvalidReference(3, 3))
        );
    }
}
