/*!
 Computes the final markers and the exact size of the encoded buffer before any byte is written.
*/

use tracing::debug;

use crate::{
    bplist::{
        flatten::FlatObject,
        marker::{escaped_length_size, finalize, Marker, MarkerType},
        trailer::{HEADER_SIZE, TRAILER_SIZE},
        varint::IntWidth,
    },
    error::bplist::BinaryPlistError,
};

/// The output of the second encoding pass
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// The marker that will be written for each object
    pub markers: Vec<Marker>,
    /// The size of the whole encoded buffer, including header, offset table, and trailer
    pub byte_length: usize,
    /// Width of each entry in the offset table
    pub offset_int_size: IntWidth,
    /// Width of each object reference
    pub object_ref_size: IntWidth,
    /// The total number of object references written by all containers
    pub reference_count: usize,
}

/// The number of bytes an object occupies in the object table, excluding its references
fn object_size(object: &FlatObject, marker: Marker) -> Result<usize, BinaryPlistError> {
    Ok(match object {
        FlatObject::Null | FlatObject::Boolean(_) => 1,
        FlatObject::Integer(_) | FlatObject::Real(_) => {
            1 + IntWidth::from_log2(marker.aux())?.bytes()
        }
        FlatObject::Date(_) => 1 + 8,
        FlatObject::Data(bytes) => 1 + escaped_length_size(bytes.len()) + bytes.len(),
        FlatObject::AsciiString(text) => 1 + escaped_length_size(text.len()) + text.len(),
        FlatObject::Utf16String(units) => 1 + escaped_length_size(units.len()) + units.len() * 2,
        FlatObject::Uid(_) => 1 + marker.aux() as usize + 1,
        FlatObject::References(refs) => {
            let count = if marker.kind()? == MarkerType::Dictionary {
                refs.len() / 2
            } else {
                refs.len()
            };
            1 + escaped_length_size(count)
        }
    })
}

/// Resolve every provisional marker and compute the size of the encoded buffer
pub fn measure(objects: &[FlatObject], markers: &[Marker]) -> Result<Measurement, BinaryPlistError> {
    if objects.len() != markers.len() {
        return Err(BinaryPlistError::InvalidTrailer(format!(
            "{} objects but {} markers",
            objects.len(),
            markers.len()
        )));
    }

    let mut byte_length = HEADER_SIZE;
    let mut reference_count = 0;
    let mut final_markers = Vec::with_capacity(markers.len());

    for (idx, (object, provisional)) in objects.iter().zip(markers).enumerate() {
        let marker = finalize(idx, object, *provisional)?;
        byte_length += object_size(object, marker)?;
        if let FlatObject::References(refs) = object {
            reference_count += refs.len();
        }
        final_markers.push(marker);
    }

    // References are stored inline, so they count towards the offset table's position
    let object_ref_size = IntWidth::for_unsigned(reference_count as u64);
    byte_length += object_ref_size.bytes() * reference_count;

    let offset_int_size = IntWidth::for_unsigned(byte_length as u64);
    byte_length += offset_int_size.bytes() * objects.len();
    byte_length += TRAILER_SIZE;

    debug!(
        objects = objects.len(),
        references = reference_count,
        offset_int_size = offset_int_size.bytes(),
        object_ref_size = object_ref_size.bytes(),
        byte_length,
        "measured binary plist"
    );

    Ok(Measurement {
        markers: final_markers,
        byte_length,
        offset_int_size,
        object_ref_size,
        reference_count,
    })
}
