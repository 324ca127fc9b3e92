/*!
 Big-endian integers stored in 1, 2, 4, or 8 bytes.

 The same widths are used for integer payloads, inline lengths, object references, and
 entries in the offset table. Integers stored in 1, 2, or 4 bytes are unsigned; integers
 stored in 8 bytes are signed, which is why negative values are only ever written at that width.
*/

use crate::error::bplist::BinaryPlistError;

/// The number of bytes used to store an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntWidth {
    One,
    Two,
    Four,
    Eight,
}

impl IntWidth {
    /// Get the width that stores `n` bytes
    pub fn from_bytes(n: usize) -> Result<Self, BinaryPlistError> {
        match n {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            other => Err(BinaryPlistError::UnsupportedWidth(other)),
        }
    }

    /// Get the width from the low nibble of an integer or real marker, which stores `log2(bytes)`
    pub fn from_log2(exponent: u8) -> Result<Self, BinaryPlistError> {
        match exponent {
            0 => Ok(Self::One),
            1 => Ok(Self::Two),
            2 => Ok(Self::Four),
            3 => Ok(Self::Eight),
            // Anything wider is reported in bytes, saturating for nonsense nibbles
            other => Err(BinaryPlistError::UnsupportedWidth(
                1usize.checked_shl(other as u32).unwrap_or(usize::MAX),
            )),
        }
    }

    /// The smallest width whose unsigned range covers `n`
    pub fn for_unsigned(n: u64) -> Self {
        if n <= u8::MAX as u64 {
            Self::One
        } else if n <= u16::MAX as u64 {
            Self::Two
        } else if n <= u32::MAX as u64 {
            Self::Four
        } else {
            Self::Eight
        }
    }

    /// The smallest width that can store `n`; negative numbers always need the signed 8-byte form
    pub fn for_signed(n: i64) -> Self {
        if n < 0 {
            Self::Eight
        } else {
            Self::for_unsigned(n as u64)
        }
    }

    /// The number of bytes this width occupies
    pub fn bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    /// `log2` of [`IntWidth::bytes`], as stored in integer markers
    pub fn log2(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Four => 2,
            Self::Eight => 3,
        }
    }

    /// Whether a signed value can be written at this width
    pub fn fits_signed(self, n: i64) -> bool {
        match self {
            Self::Eight => true,
            _ => n >= 0 && Self::for_unsigned(n as u64) <= self,
        }
    }
}

/// Read exactly `N` bytes starting at `offset`
fn read_array<const N: usize>(stream: &[u8], offset: usize) -> Result<[u8; N], BinaryPlistError> {
    let end = offset
        .checked_add(N)
        .ok_or(BinaryPlistError::OutOfBounds(offset, stream.len()))?;
    stream
        .get(offset..end)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(BinaryPlistError::OutOfBounds(end, stream.len()))
}

/// Read an unsigned integer, as used by the offset table, object references, and UIDs
pub fn read_unsigned(stream: &[u8], offset: usize, width: IntWidth) -> Result<u64, BinaryPlistError> {
    Ok(match width {
        IntWidth::One => u8::from_be_bytes(read_array(stream, offset)?) as u64,
        IntWidth::Two => u16::from_be_bytes(read_array(stream, offset)?) as u64,
        IntWidth::Four => u32::from_be_bytes(read_array(stream, offset)?) as u64,
        IntWidth::Eight => u64::from_be_bytes(read_array(stream, offset)?),
    })
}

/// Read an integer payload; only the 8-byte form is signed
pub fn read_signed(stream: &[u8], offset: usize, width: IntWidth) -> Result<i64, BinaryPlistError> {
    match width {
        IntWidth::Eight => Ok(i64::from_be_bytes(read_array(stream, offset)?)),
        narrow => Ok(read_unsigned(stream, offset, narrow)? as i64),
    }
}

/// Read a 32-bit or 64-bit float
pub fn read_real(stream: &[u8], offset: usize, width: IntWidth) -> Result<f64, BinaryPlistError> {
    match width {
        IntWidth::Four => Ok(f32::from_be_bytes(read_array(stream, offset)?) as f64),
        IntWidth::Eight => Ok(f64::from_be_bytes(read_array(stream, offset)?)),
        other => Err(BinaryPlistError::UnsupportedWidth(other.bytes())),
    }
}

/// Get a mutable window of `n` bytes starting at `offset`
fn window(buffer: &mut [u8], offset: usize, n: usize) -> Result<&mut [u8], BinaryPlistError> {
    let len = buffer.len();
    let end = offset
        .checked_add(n)
        .ok_or(BinaryPlistError::OutOfBounds(offset, len))?;
    buffer
        .get_mut(offset..end)
        .ok_or(BinaryPlistError::OutOfBounds(end, len))
}

/// Write `value` at `offset` using exactly `width` bytes, returning the number of bytes written
pub fn write_unsigned(
    buffer: &mut [u8],
    offset: usize,
    value: u64,
    width: IntWidth,
) -> Result<usize, BinaryPlistError> {
    if IntWidth::for_unsigned(value) > width {
        return Err(BinaryPlistError::IntegerOverflow(value as i128, width.bytes()));
    }
    let bytes = value.to_be_bytes();
    window(buffer, offset, width.bytes())?.copy_from_slice(&bytes[8 - width.bytes()..]);
    Ok(width.bytes())
}

/// Write an integer payload at `offset`, returning the number of bytes written
pub fn write_signed(
    buffer: &mut [u8],
    offset: usize,
    value: i64,
    width: IntWidth,
) -> Result<usize, BinaryPlistError> {
    match width {
        IntWidth::Eight => {
            window(buffer, offset, 8)?.copy_from_slice(&value.to_be_bytes());
            Ok(8)
        }
        narrow if narrow.fits_signed(value) => write_unsigned(buffer, offset, value as u64, narrow),
        narrow => Err(BinaryPlistError::IntegerOverflow(value as i128, narrow.bytes())),
    }
}

/// Write a float at `offset` using 4 or 8 bytes, returning the number of bytes written
pub fn write_real(
    buffer: &mut [u8],
    offset: usize,
    value: f64,
    width: IntWidth,
) -> Result<usize, BinaryPlistError> {
    match width {
        IntWidth::Four => {
            window(buffer, offset, 4)?.copy_from_slice(&(value as f32).to_be_bytes());
            Ok(4)
        }
        IntWidth::Eight => {
            window(buffer, offset, 8)?.copy_from_slice(&value.to_be_bytes());
            Ok(8)
        }
        other => Err(BinaryPlistError::UnsupportedWidth(other.bytes())),
    }
}
