/*!
 Flattens a [`Value`] graph into the dense object table that is written to the file.

 Every distinct object gets an index in order of discovery, so the root is always index `0`.
 Containers are replaced by the list of their children's indexes. Containers and other shared
 handles are deduplicated by identity, strings by value, and UIDs by their numeric value.
 Plain numbers, booleans, and `null` get a fresh entry every time they appear.
*/

use std::{collections::HashMap, rc::Rc};

use crate::{
    bplist::{
        marker::{classify, Marker},
        models::{Value, CLASS_KEY, MAX_DEPTH},
        options::ArchiveHook,
    },
    error::bplist::BinaryPlistError,
    util::dates::to_absolute_time,
};

/// An entry in the flattened object table
#[derive(Debug, Clone, PartialEq)]
pub enum FlatObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// Seconds since the Core Foundation reference date
    Date(f64),
    Data(Rc<Vec<u8>>),
    AsciiString(String),
    Utf16String(Vec<u16>),
    Uid(u64),
    /// Indexes of the children of an array or set, or the keys followed by the values of a dictionary
    References(Vec<usize>),
}

/// The output of the first encoding pass
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGraph {
    /// Objects in index order
    pub objects: Vec<FlatObject>,
    /// Provisional markers, one per object
    pub markers: Vec<Marker>,
    /// The index of the root object
    pub root: usize,
}

/// Walks a [`Value`] graph and builds the object table
pub struct Flattener<'a, 'h> {
    objects: Vec<FlatObject>,
    markers: Vec<Marker>,
    /// Shared handle address to object index
    identities: HashMap<usize, usize>,
    /// Text to object index
    strings: HashMap<String, usize>,
    /// UTF-16 code units to object index, for text that is not ASCII
    wide_strings: HashMap<Vec<u16>, usize>,
    /// Numeric UID to object index
    uids: HashMap<u64, usize>,
    /// Values produced by [`PlistObject::to_pairs`](crate::bplist::models::PlistObject::to_pairs);
    /// they must outlive the walk so their addresses are not reused by later allocations
    retained: Vec<Value>,
    archiver: Option<&'a mut ArchiveHook<'h>>,
}

impl<'a, 'h> Flattener<'a, 'h> {
    pub fn new(archiver: Option<&'a mut ArchiveHook<'h>>) -> Self {
        Self {
            objects: vec![],
            markers: vec![],
            identities: HashMap::new(),
            strings: HashMap::new(),
            wide_strings: HashMap::new(),
            uids: HashMap::new(),
            retained: vec![],
            archiver,
        }
    }

    /// Flatten the graph reachable from `root`
    pub fn flatten(mut self, root: &Value) -> Result<FlatGraph, BinaryPlistError> {
        let root = self.flatten_value(root, 0)?;
        Ok(FlatGraph {
            objects: self.objects,
            markers: self.markers,
            root,
        })
    }

    /// Append an object to the table, returning its index
    fn push(&mut self, object: FlatObject, marker: Marker) -> usize {
        let idx = self.objects.len();
        self.objects.push(object);
        self.markers.push(marker);
        idx
    }

    /// Append a shared handle, or return the index it was already given
    fn push_shared(
        &mut self,
        value: &Value,
        marker: Marker,
        build: impl FnOnce() -> FlatObject,
    ) -> usize {
        let address = value.address();
        if let Some(idx) = address.and_then(|address| self.identities.get(&address)) {
            return *idx;
        }
        let idx = self.push(build(), marker);
        if let Some(address) = address {
            self.identities.insert(address, idx);
        }
        idx
    }

    /// Reserve a slot for a container before visiting its children, so that cycles find it
    fn reserve_container(&mut self, value: &Value, marker: Marker) -> Result<usize, usize> {
        let address = value.address();
        if let Some(idx) = address.and_then(|address| self.identities.get(&address)) {
            return Err(*idx);
        }
        let idx = self.push(FlatObject::References(vec![]), marker);
        if let Some(address) = address {
            self.identities.insert(address, idx);
        }
        Ok(idx)
    }

    fn flatten_string(&mut self, text: &str, marker: Marker) -> usize {
        if text.is_ascii() {
            if let Some(idx) = self.strings.get(text) {
                return *idx;
            }
            let idx = self.push(FlatObject::AsciiString(text.to_string()), marker);
            self.strings.insert(text.to_string(), idx);
            idx
        } else {
            self.flatten_units(text.encode_utf16().collect(), marker)
        }
    }

    fn flatten_units(&mut self, units: Vec<u16>, marker: Marker) -> usize {
        if let Some(idx) = self.wide_strings.get(&units) {
            return *idx;
        }
        let idx = self.push(FlatObject::Utf16String(units.clone()), marker);
        self.wide_strings.insert(units, idx);
        idx
    }

    /// Fail if a container that has not been seen yet sits below `depth` enclosing containers
    fn check_depth(depth: usize) -> Result<(), BinaryPlistError> {
        if depth >= MAX_DEPTH {
            return Err(BinaryPlistError::MaxDepth(MAX_DEPTH));
        }
        Ok(())
    }

    fn flatten_value(&mut self, value: &Value, depth: usize) -> Result<usize, BinaryPlistError> {
        let marker = classify(value)?;

        match value {
            Value::Null => Ok(self.push(FlatObject::Null, marker)),
            Value::Boolean(flag) => Ok(self.push(FlatObject::Boolean(*flag), marker)),
            Value::Integer(number) => Ok(self.push(FlatObject::Integer(*number), marker)),
            Value::Float(number) => Ok(self.push(FlatObject::Real(*number as f64), marker)),
            Value::Double(number) => Ok(self.push(FlatObject::Real(*number), marker)),
            Value::SizedInteger(sized) => {
                Ok(self.push_shared(value, marker, || FlatObject::Integer(sized.value)))
            }
            Value::Date(date) => Ok(self.push_shared(value, marker, || {
                FlatObject::Date(to_absolute_time(date))
            })),
            Value::Data(bytes) => {
                Ok(self.push_shared(value, marker, || FlatObject::Data(Rc::clone(bytes))))
            }
            Value::String(text) => Ok(self.flatten_string(text, marker)),
            Value::Utf16String(units) => Ok(self.flatten_units(units.clone(), marker)),
            Value::Uid(uid) => {
                // The first wrapper seen for a given id stands in for every later one
                if let Some(idx) = self.uids.get(&uid.get()) {
                    return Ok(*idx);
                }
                let idx = self.push_shared(value, marker, || FlatObject::Uid(uid.get()));
                self.uids.insert(uid.get(), idx);
                Ok(idx)
            }
            Value::Array(items) | Value::Set(items) => {
                let idx = match self.reserve_container(value, marker) {
                    Ok(idx) => idx,
                    Err(existing) => return Ok(existing),
                };
                Self::check_depth(depth)?;
                let items = items.borrow();
                let mut refs = Vec::with_capacity(items.len());
                for item in items.iter() {
                    refs.push(self.flatten_value(item, depth + 1)?);
                }
                self.objects[idx] = FlatObject::References(refs);
                Ok(idx)
            }
            Value::Dictionary(pairs) => {
                let idx = match self.reserve_container(value, marker) {
                    Ok(idx) => idx,
                    Err(existing) => return Ok(existing),
                };
                Self::check_depth(depth)?;
                let pairs = pairs.borrow();
                let refs = self.flatten_pairs(pairs.iter().map(|(k, v)| (k, v)), depth + 1)?;
                self.objects[idx] = FlatObject::References(refs);
                Ok(idx)
            }
            Value::Object(object) => {
                let idx = match self.reserve_container(value, marker) {
                    Ok(idx) => idx,
                    Err(existing) => return Ok(existing),
                };
                Self::check_depth(depth)?;

                let mut pairs = vec![];
                if let Some(archiver) = self.archiver.as_mut() {
                    if let Some(class_name) = archiver(value) {
                        pairs.push((Value::from(CLASS_KEY), Value::String(class_name)));
                    }
                }
                pairs.extend(
                    object
                        .to_pairs()
                        .into_iter()
                        .filter_map(|(key, value)| Some((key, value?))),
                );

                let refs = self.flatten_pairs(pairs.iter().map(|(k, v)| (k, v)), depth + 1)?;
                self.objects[idx] = FlatObject::References(refs);
                self.retained
                    .extend(pairs.into_iter().flat_map(|(k, v)| [k, v]));
                Ok(idx)
            }
        }
    }

    /// Flatten every key, then every value, returning the dictionary's reference list
    fn flatten_pairs<'v>(
        &mut self,
        pairs: impl Iterator<Item = (&'v Value, &'v Value)>,
        depth: usize,
    ) -> Result<Vec<usize>, BinaryPlistError> {
        let (keys, values): (Vec<&Value>, Vec<&Value>) = pairs.unzip();
        let mut refs = Vec::with_capacity(keys.len() * 2);
        for key in keys {
            refs.push(self.flatten_value(key, depth)?);
        }
        for value in values {
            refs.push(self.flatten_value(value, depth)?);
        }
        Ok(refs)
    }
}

/// Flatten `root`, consulting `archiver` for the class name of every [`Value::Object`]
pub fn flatten(
    root: &Value,
    archiver: Option<&mut ArchiveHook<'_>>,
) -> Result<FlatGraph, BinaryPlistError> {
    Flattener::new(archiver).flatten(root)
}
