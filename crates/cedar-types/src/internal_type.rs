use std::collections::BTreeMap;
use std::fmt;

use crate::EntityLub;

/// The internal type lattice the checker reasons in. Distinct from
/// `cedar_schema_model::Type`: it adds `Never`, the singleton booleans
/// `True`/`False`, `AnyEntity`, and represents entity types as a LUB rather
/// than a single name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalType {
    /// The bottom type: subtype of everything.
    Never,
    True,
    False,
    Bool,
    Long,
    String,
    Set(Box<InternalType>),
    Record(RecordShape),
    Entity(EntityLub),
    /// The top of the entity hierarchy: any entity of any type.
    AnyEntity,
    Extension(String),
}

impl InternalType {
    pub fn set(element: InternalType) -> Self {
        InternalType::Set(Box::new(element))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, InternalType::True | InternalType::False | InternalType::Bool)
    }

    pub fn is_entity_like(&self) -> bool {
        matches!(self, InternalType::Entity(_) | InternalType::AnyEntity)
    }

    pub fn as_entity_lub(&self) -> Option<&EntityLub> {
        match self {
            InternalType::Entity(lub) => Some(lub),
            _ => None,
        }
    }
}

impl fmt::Display for InternalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalType::Never => write!(f, "Never"),
            InternalType::True => write!(f, "true"),
            InternalType::False => write!(f, "false"),
            InternalType::Bool => write!(f, "Bool"),
            InternalType::Long => write!(f, "Long"),
            InternalType::String => write!(f, "String"),
            InternalType::Set(e) => write!(f, "Set<{e}>"),
            InternalType::Record(r) => {
                write!(f, "{{")?;
                for (i, (name, attr)) in r.attrs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}{}: {}", if attr.required { "" } else { "?" }, attr.ty)?;
                }
                if r.open {
                    if !r.attrs.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "..")?;
                }
                write!(f, "}}")
            }
            InternalType::Entity(lub) => {
                if let Some(single) = lub.as_single() {
                    write!(f, "{single}")
                } else {
                    write!(f, "(")?;
                    for (i, n) in lub.as_slice().iter().enumerate() {
                        if i > 0 {
                            write!(f, " | ")?;
                        }
                        write!(f, "{n}")?;
                    }
                    write!(f, ")")
                }
            }
            InternalType::AnyEntity => write!(f, "Entity"),
            InternalType::Extension(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordShape {
    pub attrs: BTreeMap<String, RecordAttr>,
    pub open: bool,
}

impl RecordShape {
    pub fn closed(attrs: BTreeMap<String, RecordAttr>) -> Self {
        Self { attrs, open: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordAttr {
    pub ty: InternalType,
    pub required: bool,
}
