use std::collections::BTreeMap;

use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};
use seq_core::{SeqValue, SequenceError};

pub(crate) fn value_to_dynamic(value: &SeqValue) -> Dynamic {
    match value {
        SeqValue::Bool(value) => Dynamic::from_bool(*value),
        SeqValue::Number(value) => Dynamic::from_float(*value as FLOAT),
        SeqValue::String(value) => Dynamic::from(value.clone()),
        SeqValue::Array(values) => {
            let mut array = Array::new();
            for value in values {
                array.push(value_to_dynamic(value));
            }
            Dynamic::from_array(array)
        }
        SeqValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.clone().into(), value_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub(crate) fn dynamic_to_value(value: Dynamic) -> Result<SeqValue, SequenceError> {
    if value.is::<bool>() {
        return Ok(SeqValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(SeqValue::Number(value.cast::<INT>() as f64));
    }
    if value.is::<FLOAT>() {
        return Ok(SeqValue::Number(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(SeqValue::String(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_value(item)?);
        }
        return Ok(SeqValue::Array(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key.to_string(), dynamic_to_value(value)?);
        }
        return Ok(SeqValue::Map(out));
    }

    Err(SequenceError::new(
        "LOADER_VALUE_UNSUPPORTED",
        "Unsupported script value type.",
    ))
}
