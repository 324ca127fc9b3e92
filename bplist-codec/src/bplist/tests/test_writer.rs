#[cfg(test)]
mod writer_tests {
    use crate::{
        bplist::{
            models::Value,
            options::EncodeOptions,
            tests::fixtures::{assemble, Point},
            trailer::{Trailer, TRAILER_SIZE},
            varint::IntWidth,
            writer::{encode, encode_with},
        },
        error::bplist::BinaryPlistError,
        util::dates::reference_date,
    };

    /// The bytes of the first object, which always starts right after the header
    fn first_object(buffer: &[u8], len: usize) -> &[u8] {
        &buffer[8..8 + len]
    }

    #[test]
    fn can_encode_small_integer() {
        let buffer = encode(&Value::Integer(5)).unwrap();
        assert_eq!(buffer, assemble(&[&[0x10, 0x05]], 0));
    }

    #[test]
    fn can_encode_negative_integer() {
        let buffer = encode(&Value::Integer(-1)).unwrap();
        assert_eq!(
            first_object(&buffer, 9),
            [0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn can_encode_minimal_integer_widths() {
        let buffer = encode(&Value::Integer(256)).unwrap();
        assert_eq!(first_object(&buffer, 3), [0x11, 0x01, 0x00]);

        let buffer = encode(&Value::Integer(u32::MAX as i64)).unwrap();
        assert_eq!(first_object(&buffer, 5), [0x12, 0xFF, 0xFF, 0xFF, 0xFF]);

        let buffer = encode(&Value::Integer(u32::MAX as i64 + 1)).unwrap();
        assert_eq!(
            first_object(&buffer, 9),
            [0x13, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn can_encode_sized_integer() {
        let buffer = encode(&Value::sized_integer(5, IntWidth::Four)).unwrap();
        assert_eq!(first_object(&buffer, 5), [0x12, 0x00, 0x00, 0x00, 0x05]);
    }

    #[test]
    fn cant_encode_oversized_integer() {
        assert_eq!(
            encode(&Value::sized_integer(300, IntWidth::One)),
            Err(BinaryPlistError::IntegerOverflow(300, 1))
        );
        assert_eq!(
            encode(&Value::sized_integer(-1, IntWidth::Two)),
            Err(BinaryPlistError::IntegerOverflow(-1, 2))
        );
    }

    #[test]
    fn can_encode_reals() {
        let buffer = encode(&Value::Float(1.5)).unwrap();
        let mut expected = vec![0x22];
        expected.extend(1.5f32.to_be_bytes());
        assert_eq!(first_object(&buffer, 5), expected);

        let buffer = encode(&Value::Double(1.5)).unwrap();
        let mut expected = vec![0x23];
        expected.extend(1.5f64.to_be_bytes());
        assert_eq!(first_object(&buffer, 9), expected);
    }

    #[test]
    fn cant_encode_nan() {
        assert_eq!(
            encode(&Value::Float(f32::NAN)),
            Err(BinaryPlistError::InvalidNumber)
        );
        assert_eq!(
            encode(&Value::Double(f64::NAN)),
            Err(BinaryPlistError::InvalidNumber)
        );
    }

    #[test]
    fn can_encode_reference_date() {
        let buffer = encode(&Value::date(reference_date())).unwrap();
        assert_eq!(first_object(&buffer, 9), [0x33, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn can_encode_uid() {
        let buffer = encode(&Value::uid(256)).unwrap();
        assert_eq!(first_object(&buffer, 3), [0x81, 0x01, 0x00]);

        let buffer = encode(&Value::uid(0)).unwrap();
        assert_eq!(first_object(&buffer, 2), [0x80, 0x00]);
    }

    #[test]
    fn can_encode_strings() {
        let buffer = encode(&Value::from("hi")).unwrap();
        assert_eq!(first_object(&buffer, 3), [0x52, b'h', b'i']);

        let buffer = encode(&Value::from("é")).unwrap();
        assert_eq!(first_object(&buffer, 3), [0x61, 0x00, 0xE9]);

        let buffer = encode(&Value::Utf16String(vec![0xD800])).unwrap();
        assert_eq!(first_object(&buffer, 3), [0x61, 0xD8, 0x00]);
    }

    #[test]
    fn can_encode_escaped_length() {
        let buffer = encode(&Value::data(vec![9; 300])).unwrap();
        assert_eq!(first_object(&buffer, 4), [0x4F, 0x11, 0x01, 0x2C]);
        assert_eq!(buffer[12..312], [9; 300]);

        let items = (0..15).map(Value::Integer).collect();
        let buffer = encode(&Value::array(items)).unwrap();
        assert_eq!(first_object(&buffer, 3), [0xAF, 0x10, 0x0F]);

        let buffer = encode(&Value::array(vec![])).unwrap();
        assert_eq!(first_object(&buffer, 1), [0xA0]);
    }

    #[test]
    fn can_encode_dictionary() {
        let root = Value::dictionary(vec![(Value::from("a"), Value::Integer(1))]);
        let buffer = encode(&root).unwrap();
        assert_eq!(
            buffer,
            assemble(&[&[0xD1, 1, 2], &[0x51, b'a'], &[0x10, 0x01]], 0)
        );
    }

    #[test]
    fn can_encode_set() {
        let buffer = encode(&Value::set(vec![Value::Boolean(true)])).unwrap();
        assert_eq!(buffer, assemble(&[&[0xC1, 1], &[0x09]], 0));
    }

    #[test]
    fn can_write_trailer() {
        let root = Value::array(vec![Value::from("a"), Value::from("a"), Value::Null]);
        let buffer = encode(&root).unwrap();
        let trailer = Trailer::read(&buffer).unwrap();

        assert_eq!(trailer.sort_version, 0);
        assert_eq!(trailer.root_object, 0);
        // The repeated string is stored once
        assert_eq!(trailer.object_count, 3);
        assert_eq!(
            trailer.offset_table_offset as usize,
            buffer.len() - TRAILER_SIZE - 3
        );
        assert!(trailer.validate(buffer.len()).is_ok());
    }

    #[test]
    fn can_encode_wide_references() {
        let items = (0..300).map(|idx| Value::from(idx.to_string())).collect();
        let buffer = encode(&Value::array(items)).unwrap();
        let trailer = Trailer::read(&buffer).unwrap();
        assert_eq!(trailer.object_ref_size, IntWidth::Two);
        assert_eq!(trailer.offset_int_size, IntWidth::Two);
    }

    #[test]
    fn can_archive_class() {
        let point = Value::object(Point::new(
            "Point",
            vec![(Value::from("x"), Value::Integer(3))],
        ));

        let mut hook =
            |value: &Value| value.downcast_object::<Point>().map(|point| point.class.clone());
        let options = EncodeOptions {
            archiver: Some(&mut hook),
        };
        let buffer = encode_with(&point, options).unwrap();

        let expected = assemble(
            &[
                &[0xD2, 1, 2, 3, 4],
                &[0x54, b'$', b'c', b'l', b's'],
                &[0x51, b'x'],
                &[0x55, b'P', b'o', b'i', b'n', b't'],
                &[0x10, 0x03],
            ],
            0,
        );
        assert_eq!(buffer, expected);
    }

    #[test]
    fn can_encode_object_without_class() {
        let point = Value::object(Point::new(
            "Point",
            vec![(Value::from("x"), Value::Integer(3))],
        ));
        let buffer = encode(&point).unwrap();
        assert_eq!(
            buffer,
            assemble(&[&[0xD1, 1, 2], &[0x51, b'x'], &[0x10, 0x03]], 0)
        );
    }

    #[test]
    fn can_encode_deterministically() {
        let root = Value::dictionary(vec![
            (Value::from("name"), Value::from("value")),
            (Value::from("list"), Value::array(vec![Value::Double(0.5)])),
        ]);
        assert_eq!(encode(&root), encode(&root));
    }
}
