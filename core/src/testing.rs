//! Entity types shared by unit tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityBase, EntityList, EntityType};
use crate::serializer::adapters;
use crate::serializer::resolver::TypeRegistry;

pub const SCOPE: &str = "Contoso.Staff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Badge", with = "adapters::base64_bytes_opt", default)]
    pub badge: Option<Vec<u8>>,
}

impl Default for Employee {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            name: String::new(),
            badge: None,
        }
    }
}

crate::entity!(Employee, scope = "Contoso.Staff", fields = [name, badge]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manager {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Badge", with = "adapters::base64_bytes_opt", default)]
    pub badge: Option<Vec<u8>>,
    #[serde(rename = "Reports", default)]
    pub reports: EntityList<Employee>,
}

impl Default for Manager {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            name: String::new(),
            badge: None,
            reports: EntityList::new(),
        }
    }
}

crate::entity!(Manager, scope = "Contoso.Staff", fields = [name, badge, reports]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(rename = "Subject", default)]
    pub subject: String,
    #[serde(rename = "Content", with = "adapters::base64_bytes", default)]
    pub content: Vec<u8>,
    #[serde(rename = "Received", with = "adapters::date_time_opt", default)]
    pub received: Option<DateTime<Utc>>,
    #[serde(rename = "$$__type", default)]
    pub kind: String,
    #[serde(rename = "$$$$Draft", default)]
    pub draft: bool,
}

impl Default for Item {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            subject: String::new(),
            content: Vec::new(),
            received: None,
            kind: String::new(),
            draft: false,
        }
    }
}

crate::entity!(Item, scope = "Contoso.Staff", fields = [subject, content, received, kind, draft]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(rename = "DisplayName", default)]
    pub display_name: String,
    #[serde(rename = "Owner", default)]
    pub owner: Option<Employee>,
    #[serde(rename = "items", default)]
    pub items: EntityList<Item>,
}

impl Default for Folder {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            display_name: String::new(),
            owner: None,
            items: EntityList::new(),
        }
    }
}

crate::entity!(Folder, scope = "Contoso.Staff", fields = [display_name, owner, items]);

pub fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with::<Employee>()
        .with::<Manager>()
        .with::<Item>()
        .with::<Folder>()
}
