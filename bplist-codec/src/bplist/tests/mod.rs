mod test_writer;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{any::Any, cell::RefCell};

    use crate::bplist::models::{PlistObject, Value};

    /// Build a `bplist00` buffer with 1-byte offsets and 1-byte references from raw objects
    pub(crate) fn assemble(objects: &[&[u8]], root: u64) -> Vec<u8> {
        let mut buffer = b"bplist00".to_vec();
        let mut offsets = vec![];
        for object in objects {
            offsets.push(u8::try_from(buffer.len()).unwrap());
            buffer.extend_from_slice(object);
        }
        let table = buffer.len() as u64;
        buffer.extend(offsets);
        buffer.extend([0, 0, 0, 0, 0, 0, 1, 1]);
        buffer.extend((objects.len() as u64).to_be_bytes());
        buffer.extend(root.to_be_bytes());
        buffer.extend(table.to_be_bytes());
        buffer
    }

    /// Build a buffer of `levels` one-element arrays, each holding the next, with 4-byte
    /// offsets and references
    pub(crate) fn nested_arrays(levels: u32) -> Vec<u8> {
        let mut buffer = b"bplist00".to_vec();
        let mut offsets = vec![];
        for idx in 0..levels {
            offsets.push(buffer.len() as u32);
            if idx + 1 < levels {
                buffer.push(0xA1);
                buffer.extend((idx + 1).to_be_bytes());
            } else {
                buffer.push(0xA0);
            }
        }
        let table = buffer.len() as u64;
        for offset in offsets {
            buffer.extend(offset.to_be_bytes());
        }
        buffer.extend([0, 0, 0, 0, 0, 0, 4, 4]);
        buffer.extend(u64::from(levels).to_be_bytes());
        buffer.extend(0u64.to_be_bytes());
        buffer.extend(table.to_be_bytes());
        buffer
    }

    /// An application object used to exercise the archive hooks
    #[derive(Debug, Default)]
    pub(crate) struct Point {
        pub(crate) class: String,
        pub(crate) fields: RefCell<Vec<(Value, Value)>>,
    }

    impl Point {
        pub(crate) fn new(class: &str, fields: Vec<(Value, Value)>) -> Self {
            Self {
                class: class.to_string(),
                fields: RefCell::new(fields),
            }
        }
    }

    impl PlistObject for Point {
        fn to_pairs(&self) -> Vec<(Value, Option<Value>)> {
            let mut pairs: Vec<(Value, Option<Value>)> = self
                .fields
                .borrow()
                .iter()
                .map(|(key, value)| (key.clone(), Some(value.clone())))
                .collect();
            // Unset properties are not written
            pairs.push((Value::from("unset"), None));
            pairs
        }

        fn insert_pair(&self, key: Value, value: Value) {
            self.fields.borrow_mut().push((key, value));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }
}
