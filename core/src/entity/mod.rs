//! Entity model shared by every generated service type.
//!
//! # Design
//! An entity is a serde struct with a flattened `EntityBase` field named
//! `base`. The base carries the type discriminator plus in-memory state
//! that never goes over the wire: a process-unique id, the single-assignment
//! parent back-reference and the change notifier.
//!
//! Ownership runs strictly downward (entity → `EntityList` → element). The
//! back-reference a child keeps is only the owner's id, the field name and a
//! clone of the owner's notifier, never the owner itself.
//!
//! Service types implement `Entity` and `EntityType` through the
//! [`entity!`](crate::entity!) macro, which also lists the fields the graph
//! walker visits.

pub mod change;
pub mod list;

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::BindError;
use crate::serializer::binder::FieldBinder;
use crate::serializer::names::ODATA_TYPE_PROPERTY_NAME;

pub use change::{ChangeEvent, ChangeNotifier};
pub use list::EntityList;

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an in-memory entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-owning link from a child to the entity field that holds it.
#[derive(Debug, Clone)]
pub struct ParentRef {
    owner: EntityId,
    field: String,
    notifier: ChangeNotifier,
}

impl ParentRef {
    pub fn new(owner: EntityId, field: impl Into<String>, notifier: ChangeNotifier) -> Self {
        Self {
            owner,
            field: field.into(),
            notifier,
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }
}

/// Fields common to all entities.
#[derive(Serialize, Deserialize)]
pub struct EntityBase {
    #[serde(
        rename = "$$__ODataType",
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    odata_type: String,
    #[serde(skip, default = "EntityId::next")]
    id: EntityId,
    #[serde(skip)]
    parent: Option<ParentRef>,
    #[serde(skip)]
    notifier: ChangeNotifier,
}

impl EntityBase {
    pub fn new(odata_type: impl Into<String>) -> Self {
        Self {
            odata_type: odata_type.into(),
            id: EntityId::next(),
            parent: None,
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn odata_type(&self) -> &str {
        &self.odata_type
    }

    pub fn set_odata_type(&mut self, odata_type: impl Into<String>) {
        self.odata_type = odata_type.into();
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Attach the parent link. Re-attaching the same owner and field is a
    /// no-op; any other owner is rejected.
    pub fn set_parent(&mut self, parent: ParentRef) -> Result<(), BindError> {
        match &self.parent {
            None => {
                self.parent = Some(parent);
                Ok(())
            }
            Some(existing) if existing.owner == parent.owner && existing.field == parent.field => Ok(()),
            Some(existing) => Err(BindError::ParentAlreadySet {
                entity: self.id.get(),
                existing_owner: existing.owner.get(),
                existing_field: existing.field.clone(),
                owner: parent.owner.get(),
                field: parent.field,
            }),
        }
    }

    /// Report that `field` now holds `value`.
    pub fn value_changed(&self, field: &str, value: &dyn Any) {
        self.notifier.notify(self.id, field, value);
    }
}

// An explicit `null` discriminator reads as absent.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for EntityBase {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// A clone is a detached copy: new id, no parent, no subscribers.
impl Clone for EntityBase {
    fn clone(&self) -> Self {
        Self::new(self.odata_type.clone())
    }
}

/// Bases compare by discriminator only; identity and wiring are not data.
impl PartialEq for EntityBase {
    fn eq(&self, other: &Self) -> bool {
        self.odata_type == other.odata_type
    }
}

impl fmt::Debug for EntityBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityBase")
            .field(ODATA_TYPE_PROPERTY_NAME, &self.odata_type)
            .field("id", &self.id)
            .field("parent", &self.parent.as_ref().map(|p| (p.owner, p.field.as_str())))
            .finish()
    }
}

/// Object-safe view of any entity.
pub trait Entity: Any + Send + Sync + fmt::Debug {
    fn base(&self) -> &EntityBase;

    fn base_mut(&mut self) -> &mut EntityBase;

    /// Offer every declared field, in declaration order, to `binder`.
    fn bind_fields(&mut self, binder: &mut FieldBinder) -> Result<(), BindError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    /// Generic JSON tree of this entity, before wire-name rewriting.
    fn to_json(&self) -> Result<Value, serde_json::Error>;
}

impl dyn Entity {
    pub fn is<T: Entity>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn downcast<T: Entity>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }

    pub fn odata_type(&self) -> &str {
        self.base().odata_type()
    }
}

impl Serialize for dyn Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

/// Static description of a concrete entity type.
pub trait EntityType: Entity + Serialize + serde::de::DeserializeOwned + Default {
    /// Namespace the type lives in, e.g. `Microsoft.OutlookServices`.
    const SCOPE: &'static str;
    /// Simple type name, the last segment of the discriminator.
    const NAME: &'static str;

    /// Discriminator a default instance carries.
    fn declared_odata_type() -> String {
        format!("#{}.{}", Self::SCOPE, Self::NAME)
    }
}

/// Implement `Entity`, `EntityType` and `Bindable` for a struct with a
/// `base: EntityBase` field.
///
/// ```
/// use orc_core::entity::{EntityBase, EntityList, EntityType};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// pub struct Message {
///     #[serde(flatten)]
///     base: EntityBase,
///     #[serde(rename = "Subject", default)]
///     subject: String,
/// }
///
/// impl Default for Message {
///     fn default() -> Self {
///         Self {
///             base: EntityBase::new(Self::declared_odata_type()),
///             subject: String::new(),
///         }
///     }
/// }
///
/// orc_core::entity!(Message, scope = "Microsoft.OutlookServices", fields = [subject]);
///
/// #[derive(Debug, Serialize, Deserialize)]
/// pub struct Folder {
///     #[serde(flatten)]
///     base: EntityBase,
///     #[serde(rename = "DisplayName", default)]
///     display_name: String,
///     #[serde(rename = "Messages", default)]
///     messages: EntityList<Message>,
/// }
///
/// impl Default for Folder {
///     fn default() -> Self {
///         Self {
///             base: EntityBase::new(Self::declared_odata_type()),
///             display_name: String::new(),
///             messages: EntityList::new(),
///         }
///     }
/// }
///
/// orc_core::entity!(Folder, scope = "Microsoft.OutlookServices", fields = [display_name, messages]);
///
/// assert_eq!(Folder::declared_odata_type(), "#Microsoft.OutlookServices.Folder");
/// ```
///
/// `fields` lists the properties the graph walker visits, in declaration
/// order; the field name is what parent links and change events report.
/// `Default` must set the base discriminator to `declared_odata_type()`.
#[macro_export]
macro_rules! entity {
    ($ty:ident, scope = $scope:expr, fields = [$($field:ident),* $(,)?]) => {
        impl $crate::entity::Entity for $ty {
            fn base(&self) -> &$crate::entity::EntityBase {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::entity::EntityBase {
                &mut self.base
            }

            #[allow(unused_variables)]
            fn bind_fields(
                &mut self,
                binder: &mut $crate::serializer::binder::FieldBinder,
            ) -> ::std::result::Result<(), $crate::error::BindError> {
                $( binder.field(stringify!($field), &mut self.$field)?; )*
                Ok(())
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }

            fn to_json(&self) -> ::std::result::Result<$crate::__private::Value, $crate::__private::JsonError> {
                $crate::__private::to_value(self)
            }
        }

        impl $crate::entity::EntityType for $ty {
            const SCOPE: &'static str = $scope;
            const NAME: &'static str = stringify!($ty);
        }

        impl $crate::serializer::binder::Bindable for $ty {
            fn bind(
                &mut self,
                parent: ::std::option::Option<&$crate::entity::ParentRef>,
            ) -> ::std::result::Result<(), $crate::error::BindError> {
                $crate::serializer::binder::bind_entity(self, parent)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = EntityBase::new("#NS.A");
        let b = EntityBase::new("#NS.A");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn parent_is_single_assignment() {
        let mut child = EntityBase::new("#NS.Item");
        let owner = EntityId::next();
        let notifier = ChangeNotifier::new();

        child.set_parent(ParentRef::new(owner, "Items", notifier.clone())).unwrap();
        child.set_parent(ParentRef::new(owner, "Items", notifier.clone())).unwrap();
        let err = child
            .set_parent(ParentRef::new(EntityId::next(), "Items", notifier))
            .unwrap_err();
        assert!(matches!(err, BindError::ParentAlreadySet { .. }));
        assert_eq!(child.parent().map(|p| p.owner()), Some(owner));
    }

    #[test]
    fn clone_is_detached() {
        let mut original = EntityBase::new("#NS.Item");
        original
            .set_parent(ParentRef::new(EntityId::next(), "Items", ChangeNotifier::new()))
            .unwrap();
        let copy = original.clone();
        assert!(copy.parent().is_none());
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.odata_type(), "#NS.Item");
    }

    #[test]
    fn base_serializes_only_the_discriminator() {
        let base = EntityBase::new("#NS.Item");
        let json = serde_json::to_value(&base).unwrap();
        assert_eq!(json, serde_json::json!({ "$$__ODataType": "#NS.Item" }));
    }

    #[test]
    fn value_changed_reaches_subscribers() {
        let base = EntityBase::new("#NS.Item");
        base.value_changed("Subject", &"new".to_string());
        assert_eq!(base.notifier().changed_fields(), vec!["Subject".to_string()]);
    }
}
