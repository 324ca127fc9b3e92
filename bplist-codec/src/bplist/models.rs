/*!
 The in-memory object graph read from and written to a binary property list.

 Containers are shared, interior-mutable handles so that one container can be referenced from
 several places in the graph, including from inside itself. Explicit-width integers, dates, data,
 and UIDs are also shared handles: the encoder deduplicates them by identity, so two references to the
 same handle are written once, while two equal but separate handles are written twice.

 Reference counting never frees a cycle. A graph that contains itself, whether built by hand or
 decoded from a self-referential buffer, stays allocated until one of the edges that closes the
 cycle is removed, for example by clearing the container with `borrow_mut().clear()`.

 Container nesting is limited to [`MAX_DEPTH`] levels when decoding, encoding, and converting.
*/

use std::{
    any::Any,
    cell::RefCell,
    collections::HashSet,
    fmt::{Debug, Formatter, Result},
    rc::Rc,
};

use chrono::{DateTime, Utc};

use crate::bplist::varint::IntWidth;

/// The dictionary key that carries a class name for the archive hooks
pub const CLASS_KEY: &str = "$cls";

/// The deepest container nesting that is decoded, encoded, or converted
pub const MAX_DEPTH: usize = 256;

/// A shared, ordered collection of values, used for both arrays and sets
pub type Array = Rc<RefCell<Vec<Value>>>;

/// A shared, ordered collection of key-value pairs; keys are not restricted to strings
pub type Dictionary = Rc<RefCell<Vec<(Value, Value)>>>;

/// An integer that is always written with a specific width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizedInteger {
    /// The value to write
    pub value: i64,
    /// The number of bytes to write the value with
    pub width: IntWidth,
}

impl SizedInteger {
    pub fn new(value: i64, width: IntWidth) -> Self {
        Self { value, width }
    }
}

/// An opaque unique identifier, used by keyed archives to point at entries in a separate object array
///
/// This codec never dereferences the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u64);

impl Uid {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The numeric identifier
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// An application object that is written as a dictionary
///
/// When encoding, the archive hook may name a class for the object; that name is written as
/// a leading [`CLASS_KEY`] pair before the pairs returned by [`PlistObject::to_pairs`].
/// When decoding, the unarchive hook may return one of these to stand in for a dictionary
/// whose first pair is the [`CLASS_KEY`].
pub trait PlistObject: Any {
    /// The properties of this object in order; a `None` value is an unset property and is skipped
    fn to_pairs(&self) -> Vec<(Value, Option<Value>)>;

    /// Receive a pair that followed the class key in a decoded dictionary
    fn insert_pair(&self, _key: Value, _value: Value) {}

    /// Used to downcast to the concrete type
    fn as_any(&self) -> &dyn Any;
}

/// A node in a property list object graph
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    /// A plain number, written with the smallest width that fits it
    Integer(i64),
    /// An integer written with an explicit width
    SizedInteger(Rc<SizedInteger>),
    /// A single precision real
    Float(f32),
    /// A double precision real
    Double(f64),
    Date(Rc<DateTime<Utc>>),
    Data(Rc<Vec<u8>>),
    /// Text; written as ASCII when possible and as UTF-16 otherwise
    String(String),
    /// UTF-16 code units that do not form valid text, i.e. containing unpaired surrogates
    Utf16String(Vec<u16>),
    Uid(Rc<Uid>),
    Array(Array),
    /// Unordered, but stored in the same layout as [`Value::Array`]
    Set(Array),
    Dictionary(Dictionary),
    /// An application object, see [`PlistObject`]
    Object(Rc<dyn PlistObject>),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn set(items: Vec<Value>) -> Self {
        Self::Set(Rc::new(RefCell::new(items)))
    }

    pub fn dictionary(pairs: Vec<(Value, Value)>) -> Self {
        Self::Dictionary(Rc::new(RefCell::new(pairs)))
    }

    pub fn date(date: DateTime<Utc>) -> Self {
        Self::Date(Rc::new(date))
    }

    pub fn data(bytes: Vec<u8>) -> Self {
        Self::Data(Rc::new(bytes))
    }

    pub fn uid(value: u64) -> Self {
        Self::Uid(Rc::new(Uid::new(value)))
    }

    pub fn sized_integer(value: i64, width: IntWidth) -> Self {
        Self::SizedInteger(Rc::new(SizedInteger::new(value, width)))
    }

    pub fn object<T: PlistObject>(object: T) -> Self {
        Self::Object(Rc::new(object))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Get the numeric value of either integer variant
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(value) => Some(*value),
            Value::SizedInteger(sized) => Some(sized.value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Value::Dictionary(pairs) => Some(pairs),
            _ => None,
        }
    }

    /// Downcast an [`Value::Object`] to its concrete type
    pub fn downcast_object<T: PlistObject>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Look up the value of the first pair whose key is the string `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_dictionary()?
            .borrow()
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v.clone())
    }

    /// Whether two values are the same shared instance
    ///
    /// Scalars that are not shared handles are never the same instance.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self.address(), other.address()) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// The address of the shared handle behind this value, if there is one
    pub(crate) fn address(&self) -> Option<usize> {
        Some(match self {
            Value::SizedInteger(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Date(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Data(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Uid(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Array(handle) | Value::Set(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Dictionary(handle) => Rc::as_ptr(handle) as *const () as usize,
            Value::Object(handle) => Rc::as_ptr(handle) as *const () as usize,
            _ => return None,
        })
    }

    /// Compare everything but the children of containers, queueing child pairs onto `pending`
    ///
    /// Container pairs that were already queued are assumed equal.
    fn eq_shallow(
        &self,
        other: &Value,
        seen: &mut HashSet<(usize, usize)>,
        pending: &mut Vec<(Value, Value)>,
    ) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::SizedInteger(a), Value::SizedInteger(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Utf16String(a), Value::Utf16String(b)) => a == b,
            (Value::Uid(a), Value::Uid(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                if Rc::ptr_eq(a, b) || !self.enter(other, seen) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                pending.extend(a.iter().cloned().zip(b.iter().cloned()));
                true
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                if Rc::ptr_eq(a, b) || !self.enter(other, seen) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return false;
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    pending.push((ka.clone(), kb.clone()));
                    pending.push((va.clone(), vb.clone()));
                }
                true
            }
            _ => false,
        }
    }

    /// Record that a pair of containers is being compared, returning `false` if it already was
    fn enter(&self, other: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
        match (self.address(), other.address()) {
            (Some(left), Some(right)) => seen.insert((left, right)),
            _ => true,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = pending.pop() {
            if !left.eq_shallow(&right, &mut seen, &mut pending) {
                return false;
            }
        }
        true
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// Formats a value, printing `<cycle>` for containers that are already being printed
struct Guarded<'a> {
    value: &'a Value,
    stack: &'a RefCell<Vec<usize>>,
}

impl Guarded<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Guarded<'b> {
        Guarded {
            value,
            stack: self.stack,
        }
    }
}

impl Debug for Guarded<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        let address = match self.value {
            Value::Array(_) | Value::Set(_) | Value::Dictionary(_) => self.value.address(),
            _ => None,
        };
        if let Some(address) = address {
            if self.stack.borrow().contains(&address) {
                return write!(fmt, "<cycle>");
            }
            self.stack.borrow_mut().push(address);
        }

        let result = match self.value {
            Value::Null => write!(fmt, "Null"),
            Value::Boolean(value) => write!(fmt, "Boolean({value})"),
            Value::Integer(value) => write!(fmt, "Integer({value})"),
            Value::SizedInteger(sized) => write!(fmt, "SizedInteger({sized:?})"),
            Value::Float(value) => write!(fmt, "Float({value:?})"),
            Value::Double(value) => write!(fmt, "Double({value:?})"),
            Value::Date(date) => write!(fmt, "Date({})", date.to_rfc3339()),
            Value::Data(bytes) => write!(fmt, "Data({bytes:?})"),
            Value::String(text) => write!(fmt, "String({text:?})"),
            Value::Utf16String(units) => write!(fmt, "Utf16String({units:?})"),
            Value::Uid(uid) => write!(fmt, "Uid({})", uid.get()),
            Value::Object(_) => write!(fmt, "Object(..)"),
            Value::Array(items) | Value::Set(items) => {
                let name = if matches!(self.value, Value::Set(_)) {
                    "Set"
                } else {
                    "Array"
                };
                let items = items.borrow();
                write!(fmt, "{name}")
                    .and_then(|_| {
                        fmt.debug_list()
                            .entries(items.iter().map(|item| self.child(item)))
                            .finish()
                    })
            }
            Value::Dictionary(pairs) => {
                let pairs = pairs.borrow();
                write!(fmt, "Dictionary").and_then(|_| {
                    fmt.debug_map()
                        .entries(pairs.iter().map(|(k, v)| (self.child(k), self.child(v))))
                        .finish()
                })
            }
        };

        if address.is_some() {
            self.stack.borrow_mut().pop();
        }
        result
    }
}

impl Debug for Value {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result {
        let stack = RefCell::new(vec![]);
        Guarded {
            value: self,
            stack: &stack,
        }
        .fmt(fmt)
    }
}

#[cfg(test)]
mod tests {
    use crate::bplist::models::Value;

    #[test]
    fn can_compare_structurally() {
        let left = Value::array(vec![Value::from("a"), Value::Integer(1)]);
        let right = Value::array(vec![Value::from("a"), Value::Integer(1)]);
        assert_eq!(left, right);
        assert!(!left.ptr_eq(&right));
    }

    fn nested_arrays(levels: usize) -> Value {
        let mut value = Value::array(vec![]);
        for _ in 1..levels {
            value = Value::array(vec![value]);
        }
        value
    }

    /// Take a chain apart one level at a time; dropping it whole recurses once per level
    fn dismantle(mut value: Value) {
        loop {
            let next = value.as_array().and_then(|items| items.borrow_mut().pop());
            match next {
                Some(next) => value = next,
                None => break,
            }
        }
    }

    #[test]
    fn can_compare_deep_nesting() {
        let left = nested_arrays(50_000);
        let right = nested_arrays(50_000);
        assert_eq!(left, right);

        let shorter = nested_arrays(49_999);
        assert_ne!(left, shorter);

        dismantle(left);
        dismantle(right);
        dismantle(shorter);
    }

    #[test]
    fn can_compare_cycles() {
        let left = Value::array(vec![Value::Integer(1)]);
        left.as_array().unwrap().borrow_mut().push(left.clone());
        let right = Value::array(vec![Value::Integer(1)]);
        right.as_array().unwrap().borrow_mut().push(right.clone());
        assert_eq!(left, right);
    }

    #[test]
    fn can_debug_cycles() {
        let dict = Value::dictionary(vec![]);
        dict.as_dictionary()
            .unwrap()
            .borrow_mut()
            .push((Value::from("self"), dict.clone()));
        assert_eq!(format!("{dict:?}"), "Dictionary{String(\"self\"): <cycle>}");
    }

    #[test]
    fn can_get_key() {
        let dict = Value::dictionary(vec![(Value::from("a"), Value::Integer(1))]);
        assert_eq!(dict.get("a"), Some(Value::Integer(1)));
        assert_eq!(dict.get("b"), None);
    }

    #[test]
    fn set_is_not_array() {
        assert_ne!(Value::set(vec![]), Value::array(vec![]));
    }
}
