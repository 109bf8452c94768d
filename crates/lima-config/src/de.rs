//! A serde `Deserializer` over `lima_yaml` document trees.
//!
//! Plain scalars are typed with the YAML 1.2 core schema when a visitor asks
//! for "any" value, while string-typed fields accept the text of every scalar,
//! so `param: {rootful: true}` decodes into a `String` value of `"true"`.
//!
//! In strict mode a mapping decoded into a struct must not carry keys the
//! struct does not declare.

use crate::error::DecodeError;
use lima_yaml::{MappingEntry, Node, NodeKind, ResolvedScalar};
use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, DeserializeSeed, Visitor};
use serde::forward_to_deserialize_any;

pub struct NodeDeserializer<'de> {
    node: &'de Node,
    strict: bool,
}

impl<'de> NodeDeserializer<'de> {
    pub fn new(node: &'de Node, strict: bool) -> Self {
        NodeDeserializer { node, strict }
    }

    fn entries(&self) -> Result<&'de [MappingEntry], DecodeError> {
        match &self.node.kind {
            NodeKind::Mapping(mapping) => Ok(&mapping.entries),
            _ if self.node.is_null() => Ok(Default::default()),
            _ => Err(self.invalid_type("a mapping")),
        }
    }

    fn items(&self) -> Result<&'de [Node], DecodeError> {
        match &self.node.kind {
            NodeKind::Sequence(sequence) => Ok(&sequence.items),
            _ if self.node.is_null() => Ok(Default::default()),
            _ => Err(self.invalid_type("a sequence")),
        }
    }

    fn invalid_type(&self, expected: &str) -> DecodeError {
        let found = match &self.node.kind {
            NodeKind::Scalar(scalar) => match scalar.resolve() {
                ResolvedScalar::Null => "null".to_string(),
                ResolvedScalar::Bool(b) => format!("boolean `{b}`"),
                ResolvedScalar::Int(i) => format!("integer `{i}`"),
                ResolvedScalar::Float(x) => format!("float `{x}`"),
                ResolvedScalar::Str(s) => format!("string {s:?}"),
            },
            NodeKind::Sequence(_) => "a sequence".to_string(),
            NodeKind::Mapping(_) => "a mapping".to_string(),
        };
        DecodeError::new(format!("invalid type: {found}, expected {expected}"))
    }
}

impl<'de> de::Deserializer<'de> for NodeDeserializer<'de> {
    type Error = DecodeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match &self.node.kind {
            NodeKind::Scalar(scalar) => match scalar.resolve() {
                ResolvedScalar::Null => visitor.visit_unit(),
                ResolvedScalar::Bool(b) => visitor.visit_bool(b),
                ResolvedScalar::Int(i) => visitor.visit_i64(i),
                ResolvedScalar::Float(x) => visitor.visit_f64(x),
                ResolvedScalar::Str(s) => visitor.visit_borrowed_str(s),
            },
            NodeKind::Sequence(sequence) => visitor.visit_seq(SequenceAccess {
                items: sequence.items.iter().enumerate(),
                strict: self.strict,
            }),
            NodeKind::Mapping(mapping) => visitor.visit_map(MappingAccess {
                entries: mapping.entries.iter(),
                pending: None,
                strict: self.strict,
            }),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match self.node.as_scalar().map(|scalar| scalar.resolve()) {
            Some(ResolvedScalar::Bool(b)) => visitor.visit_bool(b),
            _ => Err(self.invalid_type("a boolean")),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        match &self.node.kind {
            NodeKind::Scalar(scalar) => visitor.visit_borrowed_str(&scalar.value),
            _ => Err(self.invalid_type("a string")),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        if self.node.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let items = self.items()?;
        visitor.visit_seq(SequenceAccess {
            items: items.iter().enumerate(),
            strict: self.strict,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, DecodeError> {
        let entries = self.entries()?;
        visitor.visit_map(MappingAccess {
            entries: entries.iter(),
            pending: None,
            strict: self.strict,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        let entries = self.entries()?;
        if self.strict {
            if let Some(unknown) = entries
                .iter()
                .find(|entry| !fields.contains(&entry.key.as_str()))
            {
                let err: DecodeError = de::Error::unknown_field(&unknown.key, fields);
                return Err(err.within_key(&unknown.key));
            }
        }
        visitor.visit_map(MappingAccess {
            entries: entries.iter(),
            pending: None,
            strict: self.strict,
        })
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        match &self.node.kind {
            NodeKind::Scalar(scalar) => {
                visitor.visit_enum(BorrowedStrDeserializer::<DecodeError>::new(&scalar.value))
            }
            _ => Err(self.invalid_type("an enum variant name")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, DecodeError> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char bytes byte_buf unit_struct
    }
}

struct SequenceAccess<'de> {
    items: std::iter::Enumerate<std::slice::Iter<'de, Node>>,
    strict: bool,
}

impl<'de> de::SeqAccess<'de> for SequenceAccess<'de> {
    type Error = DecodeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, DecodeError> {
        let Some((index, item)) = self.items.next() else {
            return Ok(None);
        };
        seed.deserialize(NodeDeserializer::new(item, self.strict))
            .map(Some)
            .map_err(|err| err.within_index(index))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MappingAccess<'de> {
    entries: std::slice::Iter<'de, MappingEntry>,
    pending: Option<&'de MappingEntry>,
    strict: bool,
}

impl<'de> de::MapAccess<'de> for MappingAccess<'de> {
    type Error = DecodeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, DecodeError> {
        let Some(entry) = self.entries.next() else {
            return Ok(None);
        };
        self.pending = Some(entry);
        seed.deserialize(BorrowedStrDeserializer::new(entry.key.as_str()))
            .map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, DecodeError> {
        let entry = self
            .pending
            .take()
            .ok_or_else(|| DecodeError::new("mapping value requested before its key"))?;
        seed.deserialize(NodeDeserializer::new(&entry.value, self.strict))
            .map_err(|err| err.within_key(&entry.key))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}
