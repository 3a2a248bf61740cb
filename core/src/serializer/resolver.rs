//! Discriminator → concrete entity type resolution.
//!
//! # Design
//! Types are registered explicitly, keyed by `(scope, simple name)`. A
//! payload whose discriminator is `#Microsoft.OutlookServices.Event`,
//! requested in scope `Microsoft.OutlookServices`, looks up
//! `(Microsoft.OutlookServices, Event)`. The candidate is accepted only when
//! its own declared discriminator equals the payload's exactly.
//!
//! Accepted discriminators are cached in an `ArcSwap` map: readers never
//! block, inserts swap in a copied map, and if two threads race the first
//! one to land wins. Misses are not cached.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;
use tracing::debug;

use super::names::ODATA_TYPE_PROPERTY_NAME;
use crate::entity::{Entity, EntityType};

/// How to build one registered entity type.
#[derive(Clone, Copy)]
pub struct EntityDescriptor {
    scope: &'static str,
    name: &'static str,
    type_id: TypeId,
    declared_odata_type: fn() -> String,
    instantiate: fn() -> Box<dyn Entity>,
    decode: fn(&Value) -> Result<Box<dyn Entity>, serde_json::Error>,
}

impl EntityDescriptor {
    pub fn of<E: EntityType>() -> Self {
        Self {
            scope: E::SCOPE,
            name: E::NAME,
            type_id: TypeId::of::<E>(),
            declared_odata_type: E::declared_odata_type,
            instantiate: instantiate::<E>,
            decode: decode::<E>,
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn is<E: EntityType>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }

    /// Discriminator a default instance of this type carries.
    pub fn default_odata_type(&self) -> String {
        (self.instantiate)().base().odata_type().to_string()
    }

    /// Discriminator the type declares for itself.
    pub fn declared_odata_type(&self) -> String {
        (self.declared_odata_type)()
    }

    /// Decode an in-memory-named JSON tree into this type.
    pub fn decode(&self, json: &Value) -> Result<Box<dyn Entity>, serde_json::Error> {
        (self.decode)(json)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityDescriptor({}.{})", self.scope, self.name)
    }
}

fn instantiate<E: EntityType>() -> Box<dyn Entity> {
    Box::new(E::default())
}

fn decode<E: EntityType>(json: &Value) -> Result<Box<dyn Entity>, serde_json::Error> {
    let mut entity = E::deserialize(json)?;
    if entity.base().odata_type().is_empty() {
        entity.base_mut().set_odata_type(E::declared_odata_type());
    }
    Ok(Box::new(entity))
}

/// Every entity type a serializer may instantiate.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<&'static str, HashMap<&'static str, EntityDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: EntityType>(&mut self) -> &mut Self {
        self.types
            .entry(E::SCOPE)
            .or_default()
            .insert(E::NAME, EntityDescriptor::of::<E>());
        self
    }

    /// Builder form of `register`.
    pub fn with<E: EntityType>(mut self) -> Self {
        self.register::<E>();
        self
    }

    pub fn lookup(&self, scope: &str, name: &str) -> Option<EntityDescriptor> {
        self.types.get(scope)?.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

pub struct TypeResolver {
    registry: TypeRegistry,
    cache: ArcSwap<HashMap<String, EntityDescriptor>>,
}

impl TypeResolver {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry,
            cache: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Concrete type named by `json`'s discriminator within
    /// `requested_scope`, or `None` to decode as the requested type.
    pub fn resolve(&self, json: &Value, requested_scope: &str) -> Option<EntityDescriptor> {
        let odata_type = json.as_object()?.get(ODATA_TYPE_PROPERTY_NAME)?.as_str()?;

        if let Some(hit) = self.cache.load().get(odata_type) {
            return Some(*hit);
        }

        let simple_name = odata_type.rsplit('.').next()?;
        let Some(candidate) = self.registry.lookup(requested_scope, simple_name) else {
            debug!(odata_type, requested_scope, "no registered type for discriminator");
            return None;
        };

        if candidate.default_odata_type() != odata_type {
            debug!(
                odata_type,
                declared = %candidate.default_odata_type(),
                "discriminator does not match registered type"
            );
            return None;
        }

        let mut winner = candidate;
        self.cache.rcu(|current| {
            if let Some(existing) = current.get(odata_type) {
                winner = *existing;
                return Arc::clone(current);
            }
            winner = candidate;
            let mut next = (**current).clone();
            next.insert(odata_type.to_string(), candidate);
            Arc::new(next)
        });
        debug!(odata_type, resolved = ?winner, "cached discriminator");
        Some(winner)
    }

    /// Cached entry for `odata_type`, if one was accepted.
    pub fn cached(&self, odata_type: &str) -> Option<EntityDescriptor> {
        self.cache.load().get(odata_type).copied()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.load().len()
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("registered", &self.registry.len())
            .field("cached", &self.cache_len())
            .finish()
    }
}
