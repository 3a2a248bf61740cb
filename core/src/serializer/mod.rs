//! JSON ⇄ entity conversion.
//!
//! # Design
//! Outbound: model → generic JSON tree → wire names (`ReservedNameCodec::encode`)
//! → text.
//!
//! Inbound: text → JSON tree → in-memory names (`decode`) → concrete type
//! from the discriminator (`TypeResolver`, falling back to the requested
//! type) → typed value → parent links (`GraphWalker`).
//!
//! Collection payloads are OData feeds: the entities live in the `value`
//! array. Each element is resolved on its own, and the elements are returned
//! without parent links since they have no owning entity.

pub mod adapters;
pub mod binder;
pub mod names;
pub mod resolver;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::entity::{Entity, EntityType};
use crate::error::{fragment, SerializerError};
use binder::GraphWalker;
use names::ReservedNameCodec;
use resolver::{EntityDescriptor, TypeRegistry, TypeResolver};

/// Property holding the entities of a collection payload.
pub const COLLECTION_PROPERTY: &str = "value";

#[derive(Debug)]
pub struct EntitySerializer {
    codec: ReservedNameCodec,
    resolver: TypeResolver,
    walker: GraphWalker,
}

impl EntitySerializer {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            codec: ReservedNameCodec::new(),
            resolver: TypeResolver::new(registry),
            walker: GraphWalker::new(),
        }
    }

    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Render `value` as wire JSON.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SerializerError> {
        let mut json = serde_json::to_value(value).map_err(SerializerError::Encode)?;
        self.codec.encode(&mut json);
        serde_json::to_string(&json).map_err(SerializerError::Encode)
    }

    /// Decode a single entity requested as `E`. The result is the subtype
    /// named by the payload's discriminator when one is registered in `E`'s
    /// scope, and `E` otherwise.
    pub fn deserialize<E: EntityType>(&self, payload: &str) -> Result<Box<dyn Entity>, SerializerError> {
        let json = self.parse(payload)?;
        if !json.is_object() {
            return Err(SerializerError::NotAnObject {
                fragment: fragment(payload),
            });
        }

        let mut entity = self.decode_element::<E>(&json)?;
        self.walker.bind_root(entity.as_mut())?;
        Ok(entity)
    }

    /// Decode a single entity strictly as `E`, ignoring any subtype named by
    /// the discriminator.
    pub fn deserialize_as<E: EntityType>(&self, payload: &str) -> Result<E, SerializerError> {
        let json = self.parse(payload)?;
        if !json.is_object() {
            return Err(SerializerError::NotAnObject {
                fragment: fragment(payload),
            });
        }

        let mut entity = E::deserialize(&json).map_err(|source| SerializerError::Json {
            source,
            fragment: fragment(payload),
        })?;
        if entity.base().odata_type().is_empty() {
            entity.base_mut().set_odata_type(E::declared_odata_type());
        }
        self.walker.bind_root(&mut entity)?;
        Ok(entity)
    }

    /// Decode the `value` array of a collection payload.
    pub fn deserialize_collection<E: EntityType>(
        &self,
        payload: &str,
    ) -> Result<Vec<Box<dyn Entity>>, SerializerError> {
        let mut json: Value = serde_json::from_str(payload).map_err(|source| SerializerError::Json {
            source,
            fragment: fragment(payload),
        })?;

        let Some(items) = json.get_mut(COLLECTION_PROPERTY) else {
            return Err(SerializerError::MissingCollection {
                fragment: fragment(payload),
            });
        };
        self.codec.decode(items);
        let Value::Array(items) = items else {
            return Err(SerializerError::MissingCollection {
                fragment: fragment(payload),
            });
        };

        let entities = items
            .iter()
            .map(|item| self.decode_element::<E>(item))
            .collect::<Result<Vec<_>, _>>()?;
        trace!(count = entities.len(), requested = E::NAME, "decoded collection");
        Ok(entities)
    }

    /// Build one JSON object from `(name, JSON text)` pairs, embedding each
    /// value as parsed JSON rather than as a string.
    pub fn json_object_from_json_map<K, V>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, SerializerError>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut object = Map::new();
        for (name, raw) in entries {
            let raw = raw.as_ref();
            let value: Value = serde_json::from_str(raw).map_err(|source| SerializerError::Json {
                source,
                fragment: fragment(raw),
            })?;
            object.insert(name.into(), value);
        }
        serde_json::to_string(&Value::Object(object)).map_err(SerializerError::Encode)
    }

    /// Body of an action or function invocation.
    pub fn generate_parameters_payload(&self, parameters: &BTreeMap<String, Value>) -> Result<String, SerializerError> {
        self.serialize(parameters)
    }

    fn parse(&self, payload: &str) -> Result<Value, SerializerError> {
        let mut json: Value = serde_json::from_str(payload).map_err(|source| SerializerError::Json {
            source,
            fragment: fragment(payload),
        })?;
        self.codec.decode(&mut json);
        Ok(json)
    }

    fn decode_element<E: EntityType>(&self, json: &Value) -> Result<Box<dyn Entity>, SerializerError> {
        let descriptor = match self.resolver.resolve(json, E::SCOPE) {
            Some(descriptor) => descriptor,
            None => {
                debug!(requested = E::NAME, "decoding as requested type");
                EntityDescriptor::of::<E>()
            }
        };
        descriptor.decode(json).map_err(|source| SerializerError::Json {
            source,
            fragment: fragment(&json.to_string()),
        })
    }
}
