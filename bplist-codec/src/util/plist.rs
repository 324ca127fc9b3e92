/*!
 Conversions between this codec's [`Value`] graph and the tree used by the [`plist`] crate.

 The [`plist`] crate models a property list as an owned tree, so shared references are copied,
 sets become arrays, and anything the tree cannot express is rejected.
*/

use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::{
    bplist::models::{Value, MAX_DEPTH},
    error::bplist::BinaryPlistError,
};

impl TryFrom<&plist::Value> for Value {
    type Error = BinaryPlistError;

    fn try_from(value: &plist::Value) -> Result<Self, Self::Error> {
        from_plist(value, 0)
    }
}

/// Convert a [`plist::Value`] that is enclosed by `depth` containers
fn from_plist(value: &plist::Value, depth: usize) -> Result<Value, BinaryPlistError> {
    let is_container = matches!(value, plist::Value::Array(_) | plist::Value::Dictionary(_));
    if is_container && depth >= MAX_DEPTH {
        return Err(BinaryPlistError::MaxDepth(MAX_DEPTH));
    }

    Ok(match value {
        plist::Value::Array(items) => Value::array(
            items
                .iter()
                .map(|item| from_plist(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        plist::Value::Dictionary(dict) => Value::dictionary(
            dict.iter()
                .map(|(key, item)| {
                    Ok((Value::from(key.as_str()), from_plist(item, depth + 1)?))
                })
                .collect::<Result<_, BinaryPlistError>>()?,
        ),
        plist::Value::Boolean(flag) => Value::Boolean(*flag),
        plist::Value::Data(bytes) => Value::data(bytes.clone()),
        plist::Value::Date(date) => {
            Value::date(DateTime::<Utc>::from(SystemTime::from(date.clone())))
        }
        plist::Value::Real(number) => Value::Double(*number),
        plist::Value::Integer(number) => match number.as_signed() {
            Some(number) => Value::Integer(number),
            None => {
                return Err(BinaryPlistError::UnsupportedValue(format!(
                    "integer {number} does not fit in 64 signed bits"
                )))
            }
        },
        plist::Value::String(text) => Value::from(text.as_str()),
        plist::Value::Uid(uid) => Value::uid(uid.get()),
        other => {
            return Err(BinaryPlistError::UnsupportedValue(format!(
                "{other:?} has no binary plist counterpart"
            )))
        }
    })
}

/// Convert a [`Value`] graph into a [`plist::Value`] tree
pub fn to_plist(value: &Value) -> Result<plist::Value, BinaryPlistError> {
    convert(value, &mut vec![])
}

/// Convert `value`, tracking the containers on the current path to reject cycles
fn convert(value: &Value, path: &mut Vec<usize>) -> Result<plist::Value, BinaryPlistError> {
    let address = match value {
        Value::Array(_) | Value::Set(_) | Value::Dictionary(_) | Value::Object(_) => {
            value.address()
        }
        _ => None,
    };
    if let Some(address) = address {
        if path.contains(&address) {
            return Err(BinaryPlistError::UnsupportedValue(
                "cyclic graphs cannot be represented as a tree".to_string(),
            ));
        }
        if path.len() >= MAX_DEPTH {
            return Err(BinaryPlistError::MaxDepth(MAX_DEPTH));
        }
        path.push(address);
    }

    let converted = match value {
        Value::Null => Err(BinaryPlistError::UnsupportedValue("null".to_string())),
        Value::Boolean(flag) => Ok(plist::Value::Boolean(*flag)),
        Value::Integer(number) => Ok(plist::Value::Integer((*number).into())),
        Value::SizedInteger(sized) => Ok(plist::Value::Integer(sized.value.into())),
        Value::Float(number) => Ok(plist::Value::Real(*number as f64)),
        Value::Double(number) => Ok(plist::Value::Real(*number)),
        Value::Date(date) => Ok(plist::Value::Date(SystemTime::from(**date).into())),
        Value::Data(bytes) => Ok(plist::Value::Data(bytes.to_vec())),
        Value::String(text) => Ok(plist::Value::String(text.clone())),
        Value::Utf16String(_) => Err(BinaryPlistError::UnsupportedValue(
            "UTF-16 text with unpaired surrogates".to_string(),
        )),
        Value::Uid(uid) => Ok(plist::Value::Uid(plist::Uid::new(uid.get()))),
        Value::Array(items) | Value::Set(items) => items
            .borrow()
            .iter()
            .map(|item| convert(item, path))
            .collect::<Result<Vec<_>, _>>()
            .map(plist::Value::Array),
        Value::Dictionary(pairs) => convert_pairs(pairs.borrow().iter().cloned(), path),
        Value::Object(object) => convert_pairs(
            object
                .to_pairs()
                .into_iter()
                .filter_map(|(key, item)| Some((key, item?))),
            path,
        ),
    };

    if address.is_some() {
        path.pop();
    }
    converted
}

fn convert_pairs(
    pairs: impl Iterator<Item = (Value, Value)>,
    path: &mut Vec<usize>,
) -> Result<plist::Value, BinaryPlistError> {
    let mut dict = plist::Dictionary::new();
    for (key, item) in pairs {
        let key = match key {
            Value::String(text) => text,
            other => {
                return Err(BinaryPlistError::UnsupportedValue(format!(
                    "dictionary key {other:?} is not a string"
                )))
            }
        };
        dict.insert(key, convert(&item, path)?);
    }
    Ok(plist::Value::Dictionary(dict))
}
