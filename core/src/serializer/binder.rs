//! Parent back-reference wiring for freshly decoded entity graphs.
//!
//! # Design
//! The walk is depth-first and follows each entity's declared field order:
//! - an entity gets its parent link (when it has a parent) and then offers
//!   each of its fields to a `FieldBinder`;
//! - an `EntityList` held directly by an entity field is observed as
//!   `(entity, field)` unless it already is, and its elements are bound to
//!   that same link;
//! - any other sequence or optional value forwards its parent unchanged;
//! - scalars stop the walk.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::entity::{ChangeNotifier, Entity, EntityId, EntityList, ParentRef};
use crate::error::BindError;

/// A node of an entity graph the walker can descend into.
pub trait Bindable {
    /// Bind this value as nested under `parent` (`None` at the root).
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError>;

    /// Bind this value as the direct content of an entity field.
    fn bind_as_field(&mut self, field: &ParentRef) -> Result<(), BindError> {
        self.bind(Some(field))
    }
}

/// Handed to `Entity::bind_fields`; turns each field into a parent link
/// naming the entity being walked.
pub struct FieldBinder {
    owner: EntityId,
    notifier: ChangeNotifier,
}

impl FieldBinder {
    pub fn field<T: Bindable + ?Sized>(&mut self, name: &str, value: &mut T) -> Result<(), BindError> {
        let link = ParentRef::new(self.owner, name, self.notifier.clone());
        value.bind_as_field(&link)
    }
}

/// Attach `entity` to `parent`, then walk its declared fields.
pub fn bind_entity(entity: &mut dyn Entity, parent: Option<&ParentRef>) -> Result<(), BindError> {
    if let Some(parent) = parent {
        entity.base_mut().set_parent(parent.clone())?;
    }
    let mut binder = FieldBinder {
        owner: entity.base().id(),
        notifier: entity.base().notifier().clone(),
    };
    entity.bind_fields(&mut binder)
}

/// Walks a deserialized root and wires parent links throughout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphWalker;

impl GraphWalker {
    pub fn new() -> Self {
        Self
    }

    pub fn bind_root(&self, root: &mut dyn Entity) -> Result<(), BindError> {
        bind_entity(root, None)
    }

    pub fn bind<T: Bindable + ?Sized>(&self, node: &mut T, parent: Option<&ParentRef>) -> Result<(), BindError> {
        node.bind(parent)
    }
}

impl<T: Bindable + 'static> Bindable for EntityList<T> {
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError> {
        for item in self.iter_mut() {
            item.bind(parent)?;
        }
        Ok(())
    }

    fn bind_as_field(&mut self, field: &ParentRef) -> Result<(), BindError> {
        self.observe(field.clone());
        self.bind(Some(field))
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError> {
        for item in self.iter_mut() {
            item.bind(parent)?;
        }
        Ok(())
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError> {
        match self {
            Some(value) => value.bind(parent),
            None => Ok(()),
        }
    }

    fn bind_as_field(&mut self, field: &ParentRef) -> Result<(), BindError> {
        match self {
            Some(value) => value.bind_as_field(field),
            None => Ok(()),
        }
    }
}

impl<T: Bindable + ?Sized> Bindable for Box<T> {
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError> {
        (**self).bind(parent)
    }

    fn bind_as_field(&mut self, field: &ParentRef) -> Result<(), BindError> {
        (**self).bind_as_field(field)
    }
}

impl Bindable for dyn Entity {
    fn bind(&mut self, parent: Option<&ParentRef>) -> Result<(), BindError> {
        bind_entity(self, parent)
    }
}

macro_rules! leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn bind(&mut self, _parent: Option<&ParentRef>) -> Result<(), BindError> {
                    Ok(())
                }
            }
        )*
    };
}

leaf!(
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    i8,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Value,
    DateTime<Utc>,
    DateTime<FixedOffset>,
    NaiveDate,
    NaiveDateTime,
    bytes::Bytes,
);
