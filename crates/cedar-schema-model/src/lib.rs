//! The resolved-schema data model.
//!
//! This is the contract a schema resolver hands to the checker: every
//! common-type alias has already been inlined, every `EntityRef` names a key
//! of `entity_types` or `enum_types`, and every action UID is unique. This
//! crate only defines the shape of that contract; `cedar-schema-parser`
//! provides one (intentionally thin) way to produce it from schema text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A fully-qualified entity type name, e.g. `App::User` or `User`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityTypeName(pub String);

impl EntityTypeName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityTypeName {
    fn from(s: &str) -> Self {
        EntityTypeName(s.to_string())
    }
}

impl From<String> for EntityTypeName {
    fn from(s: String) -> Self {
        EntityTypeName(s)
    }
}

/// A unique action identifier: its declared entity type plus its id string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActionUid {
    pub ty: String,
    pub id: String,
}

impl ActionUid {
    pub fn new(ty: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ActionUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::\"{}\"", self.ty, self.id)
    }
}

/// A resolved schema type: no common-type aliases remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Long,
    String,
    Bool,
    Set(Box<Type>),
    Record(RecordType),
    EntityRef(EntityTypeName),
    Extension(String),
}

/// A record type: a map from attribute name to its declared type, plus
/// whether the record admits attributes beyond the declared set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordType {
    pub attrs: BTreeMap<String, AttrType>,
    pub open: bool,
}

impl RecordType {
    pub fn closed(attrs: BTreeMap<String, AttrType>) -> Self {
        Self { attrs, open: false }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrType {
    pub ty: Type,
    pub required: bool,
}

impl AttrType {
    pub fn required(ty: Type) -> Self {
        Self { ty, required: true }
    }

    pub fn optional(ty: Type) -> Self {
        Self {
            ty,
            required: false,
        }
    }
}

/// A declared entity type: its parents, attribute shape, and optional tag
/// value type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityTypeDecl {
    pub parents: Vec<EntityTypeName>,
    pub shape: RecordType,
    pub tags: Option<Type>,
}

/// What an action's `appliesTo` clause declares.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliesTo {
    pub principals: BTreeSet<EntityTypeName>,
    pub resources: BTreeSet<EntityTypeName>,
    pub context: RecordType,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionDecl {
    pub parents: BTreeSet<ActionUid>,
    pub applies_to: Option<AppliesTo>,
}

/// The fully resolved schema: the only form the checker consumes.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchema {
    pub entity_types: BTreeMap<EntityTypeName, EntityTypeDecl>,
    pub enum_types: BTreeMap<EntityTypeName, Vec<String>>,
    pub actions: BTreeMap<ActionUid, ActionDecl>,
}

impl ResolvedSchema {
    pub fn is_known_entity_or_enum(&self, name: &EntityTypeName) -> bool {
        self.entity_types.contains_key(name) || self.enum_types.contains_key(name)
    }

    pub fn is_enum(&self, name: &EntityTypeName) -> bool {
        self.enum_types.contains_key(name)
    }

    /// Declared parents of an entity or enum type (enums have none).
    pub fn parents_of(&self, name: &EntityTypeName) -> &[EntityTypeName] {
        self.entity_types
            .get(name)
            .map(|d| d.parents.as_slice())
            .unwrap_or(&[])
    }

    /// The set of types an instance of `name` could claim via `in`: `name`
    /// itself plus every ancestor reachable through `parents`.
    pub fn ancestor_closure(&self, name: &EntityTypeName) -> BTreeSet<EntityTypeName> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.clone()];
        while let Some(cur) = stack.pop() {
            if seen.insert(cur.clone()) {
                for parent in self.parents_of(&cur) {
                    stack.push(parent.clone());
                }
            }
        }
        seen
    }

    /// The set of types that can be "in" `name`: `name` itself plus every
    /// descendant (type whose ancestor closure contains `name`).
    pub fn descendant_closure(&self, name: &EntityTypeName) -> BTreeSet<EntityTypeName> {
        let mut result = BTreeSet::new();
        for candidate in self
            .entity_types
            .keys()
            .chain(self.enum_types.keys())
        {
            if self.ancestor_closure(candidate).contains(name) {
                result.insert(candidate.clone());
            }
        }
        result
    }

    /// Transitive closure of an action's parents, including itself.
    pub fn action_ancestor_closure(&self, uid: &ActionUid) -> BTreeSet<ActionUid> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![uid.clone()];
        while let Some(cur) = stack.pop() {
            if seen.insert(cur.clone()) {
                if let Some(decl) = self.actions.get(&cur) {
                    for parent in &decl.parents {
                        stack.push(parent.clone());
                    }
                }
            }
        }
        seen
    }

    /// Actions whose ancestor closure contains `uid` (i.e. "descend from" it
    /// through `in`), including `uid` itself.
    pub fn action_descendant_closure(&self, uid: &ActionUid) -> BTreeSet<ActionUid> {
        self.actions
            .keys()
            .filter(|candidate| self.action_ancestor_closure(candidate).contains(uid))
            .cloned()
            .collect()
    }

    /// The declared attribute type for `attr` on entity type `name`, if any.
    pub fn declared_attr(&self, name: &EntityTypeName, attr: &str) -> Option<&AttrType> {
        self.entity_types.get(name)?.shape.attrs.get(attr)
    }

    pub fn declared_tags(&self, name: &EntityTypeName) -> Option<&Type> {
        self.entity_types.get(name)?.tags.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_with_chain() -> ResolvedSchema {
        let mut schema = ResolvedSchema::default();
        schema.entity_types.insert(
            EntityTypeName::new("Org"),
            EntityTypeDecl::default(),
        );
        schema.entity_types.insert(
            EntityTypeName::new("Group"),
            EntityTypeDecl {
                parents: vec![EntityTypeName::new("Org")],
                ..Default::default()
            },
        );
        schema.entity_types.insert(
            EntityTypeName::new("User"),
            EntityTypeDecl {
                parents: vec![EntityTypeName::new("Group")],
                ..Default::default()
            },
        );
        schema
    }

    #[test]
    fn ancestor_closure_includes_self_and_transitive_parents() {
        let schema = schema_with_chain();
        let closure = schema.ancestor_closure(&EntityTypeName::new("User"));
        assert!(closure.contains(&EntityTypeName::new("User")));
        assert!(closure.contains(&EntityTypeName::new("Group")));
        assert!(closure.contains(&EntityTypeName::new("Org")));
    }

    #[test]
    fn descendant_closure_is_inverse_of_ancestor_closure() {
        let schema = schema_with_chain();
        let descendants = schema.descendant_closure(&EntityTypeName::new("Org"));
        assert!(descendants.contains(&EntityTypeName::new("Org")));
        assert!(descendants.contains(&EntityTypeName::new("Group")));
        assert!(descendants.contains(&EntityTypeName::new("User")));
    }
}
