//! Runtime value, entity, and request shapes `ValueChecker` validates.

use std::collections::{BTreeMap, BTreeSet};

use cedar_schema_model::{ActionUid, EntityTypeName};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityUid {
    pub ty: EntityTypeName,
    pub id: String,
}

impl EntityUid {
    pub fn new(ty: impl Into<EntityTypeName>, id: impl Into<String>) -> Self {
        Self { ty: ty.into(), id: id.into() }
    }
}

impl std::fmt::Display for EntityUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::\"{}\"", self.ty, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Long(i64),
    String(String),
    Set(Vec<Value>),
    Record(BTreeMap<String, Value>),
    EntityUid(EntityTypeName, String),
    /// An extension value, e.g. `("ipaddr", "10.0.0.1/8")`; the representation
    /// isn't parsed here, only its extension-type name is checked.
    Extension(String, String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub parents: BTreeSet<EntityUid>,
    pub attrs: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub principal: EntityUid,
    pub action: ActionUid,
    pub resource: EntityUid,
    pub context: BTreeMap<String, Value>,
}
