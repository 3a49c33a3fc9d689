//! Key handling for API payloads
//!
//! Request bodies are written with camelCase keys whatever the payload shape.
//! Reads leave the received keys alone: struct fields match object keys
//! ignoring case and `_`/`-` separators, so a field named `userId` accepts
//! `UserId`, `USERID` and `user_id`. Map-valued data keeps its keys verbatim.

use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use serde::Deserializer;
use serde_json::{Map, Value};

/// camelCase form of a single key.
///
/// A leading run of capitals is lowered up to the start of the next word
/// (`URLValue` -> `urlValue`, `ID` -> `id`), and `_`/`-` separated words are
/// joined (`first_name` -> `firstName`).
pub fn to_camel_case(key: &str) -> String {
    if !key.contains(['_', '-']) {
        return lower_leading_capitals(key);
    }

    let mut words = key.split(['_', '-']).filter(|w| !w.is_empty());
    let mut out = match words.next() {
        Some(first) => lower_leading_capitals(first),
        None => return key.to_string(),
    };
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn lower_leading_capitals(word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    match chars.first() {
        Some(c) if c.is_uppercase() => {}
        _ => return word.to_string(),
    }

    let mut out: Vec<char> = chars.clone();
    for i in 0..chars.len() {
        if i == 1 && !chars[i].is_uppercase() {
            break;
        }
        let next_is_lower = chars
            .get(i + 1)
            .map(|next| !next.is_uppercase())
            .unwrap_or(false);
        // start of the next word keeps its capital
        if i > 0 && next_is_lower {
            if chars[i + 1] == ' ' {
                out[i] = lower(chars[i]);
            }
            break;
        }
        out[i] = lower(chars[i]);
    }
    out.into_iter().collect()
}

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Rewrite every object key in `value`, recursively
pub fn camelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                out.insert(to_camel_case(&key), camelize_keys(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(camelize_keys).collect()),
        other => other,
    }
}

/// Whether two keys name the same property, ignoring case and `_`/`-`
pub fn keys_match(a: &str, b: &str) -> bool {
    fold(a).eq(fold(b))
}

fn fold(key: &str) -> impl Iterator<Item = char> + '_ {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-'))
        .flat_map(char::to_lowercase)
}

/// Decode `value` into `T`, matching struct fields case-insensitively
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    T::deserialize(CaseInsensitive(value))
}

/// Rename object keys to the struct field they match. An exact match claims
/// its field first; keys matching no unclaimed field pass through unchanged.
fn match_fields(map: Map<String, Value>, fields: &'static [&'static str]) -> Vec<(String, Value)> {
    let mut claimed: Vec<&str> = map
        .keys()
        .filter_map(|key| fields.iter().copied().find(|field| *field == key.as_str()))
        .collect();

    map.into_iter()
        .map(|(key, value)| {
            if fields.contains(&key.as_str()) {
                return (key, value);
            }
            match fields
                .iter()
                .copied()
                .find(|field| !claimed.contains(field) && keys_match(field, &key))
            {
                Some(field) => {
                    claimed.push(field);
                    (field.to_string(), value)
                }
                None => (key, value),
            }
        })
        .collect()
}

struct CaseInsensitive(Value);

impl<'de> Deserializer<'de> for CaseInsensitive {
    type Error = serde_json::Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(Entries::new(map.into_iter().collect())),
            Value::Array(items) => visitor.visit_seq(Items(items.into_iter())),
            other => other.deserialize_any(visitor),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.0.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.0 {
            Value::Object(map) => visitor.visit_map(Entries::new(match_fields(map, fields))),
            Value::Array(items) => visitor.visit_seq(Items(items.into_iter())),
            other => other.deserialize_struct(name, fields, visitor),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.0.deserialize_enum(name, variants, visitor)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier
        ignored_any
    }
}

struct Entries {
    iter: std::vec::IntoIter<(String, Value)>,
    value: Option<Value>,
}

impl Entries {
    fn new(entries: Vec<(String, Value)>) -> Self {
        Self {
            iter: entries.into_iter(),
            value: None,
        }
    }
}

impl<'de> MapAccess<'de> for Entries {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(Value::String(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, Self::Error> {
        match self.value.take() {
            Some(value) => seed.deserialize(CaseInsensitive(value)),
            None => Err(de::Error::custom("map value requested before its key")),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct Items(std::vec::IntoIter<Value>);

impl<'de> SeqAccess<'de> for Items {
    type Error = serde_json::Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        self.0
            .next()
            .map(|value| seed.deserialize(CaseInsensitive(value)))
            .transpose()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.0.len())
    }
}
