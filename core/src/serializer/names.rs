//! Wire/in-memory property name rewriting.
//!
//! # Design
//! Some wire property names cannot be used as-is in the in-memory model:
//! reserved words, and the `@odata.type` discriminator. In memory they carry
//! fixed names (`$$__<name>` and `$$__ODataType`). Properties whose in-memory
//! name starts with `$$$$` are local-only and never reach the wire.
//!
//! `encode` runs on the JSON tree produced from the model before it is
//! rendered; `decode` runs on the parsed wire tree before it is bound to the
//! model. Both recurse through every object and array in place. Apart from
//! dropped `$$$$` properties, `decode` undoes `encode`.

use serde_json::{Map, Value};

/// In-memory prefix for properties whose wire name is reserved.
pub const RESERVED_PREFIX: &str = "$$__";
/// In-memory prefix for properties that are never sent.
pub const IGNORE_PREFIX: &str = "$$$$";
/// In-memory name of the type discriminator.
pub const ODATA_TYPE_PROPERTY_NAME: &str = "$$__ODataType";
/// Wire name of the type discriminator.
pub const ODATA_TYPE_JSON_PROPERTY: &str = "@odata.type";

/// Wire names that collide with reserved words of the in-memory model.
pub const RESERVED_NAMES: &[&str] = &[
    "abstract", "async", "await", "class", "const", "crate", "default", "dyn", "enum", "final", "fn", "impl", "let",
    "loop", "match", "mod", "move", "mut", "override", "package", "pub", "ref", "self", "static", "struct", "super",
    "trait", "type", "use", "virtual", "where",
];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReservedNameCodec;

impl ReservedNameCodec {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite an in-memory tree into wire names.
    pub fn encode(&self, json: &mut Value) {
        match json {
            Value::Array(items) => items.iter_mut().for_each(|item| self.encode(item)),
            Value::Object(map) => {
                for (name, mut value) in drain(map) {
                    self.encode(&mut value);

                    if name == ODATA_TYPE_PROPERTY_NAME {
                        map.insert(ODATA_TYPE_JSON_PROPERTY.to_string(), value);
                        continue;
                    }
                    if name.starts_with(IGNORE_PREFIX) {
                        continue;
                    }
                    match name.strip_prefix(RESERVED_PREFIX) {
                        Some(stripped) if is_reserved_name(stripped) => {
                            map.insert(stripped.to_string(), value);
                        }
                        _ => {
                            map.insert(name, value);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Rewrite a wire tree into in-memory names.
    pub fn decode(&self, json: &mut Value) {
        match json {
            Value::Array(items) => items.iter_mut().for_each(|item| self.decode(item)),
            Value::Object(map) => {
                for (name, mut value) in drain(map) {
                    self.decode(&mut value);

                    if is_reserved_name(&name) {
                        map.insert(format!("{RESERVED_PREFIX}{name}"), value);
                    } else if name == ODATA_TYPE_JSON_PROPERTY {
                        map.insert(ODATA_TYPE_PROPERTY_NAME.to_string(), value);
                    } else {
                        map.insert(name, value);
                    }
                }
            }
            _ => {}
        }
    }
}

fn drain(map: &mut Map<String, Value>) -> Vec<(String, Value)> {
    std::mem::take(map).into_iter().collect()
}
