//! Runtime-value validation diagnostics. Structural, not lattice-based: an
//! entity or request either matches the declared schema shape or it doesn't.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueErrorKind {
    UnknownEntityType { name: String },
    WrongAttributeType { attr: String, expected: String, found: String },
    WrongTagType { expected: String, found: String },
    ExtraneousAttribute { attr: String },
    MissingRequiredAttribute { attr: String },
    UnknownEnumId { ty: String, id: String },
    EnumEntityHasExtraState { uid: String },
    ParentTypeNotDeclared { parent: String, entity_type: String },
    ActionWrongParents { uid: String },
    UnexpectedTags { entity_type: String },
    UnknownAction { uid: String },
    NoAppliesTo { uid: String },
    PrincipalTypeNotAllowed { ty: String },
    ResourceTypeNotAllowed { ty: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueError {
    pub kind: ValueErrorKind,
}

impl ValueError {
    pub fn new(kind: ValueErrorKind) -> Self {
        Self { kind }
    }
}

impl std::fmt::Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValueErrorKind::UnknownEntityType { name } => {
                write!(f, "entity type `{name}` is not declared in the schema")
            }
            ValueErrorKind::WrongAttributeType { attr, expected, found } => {
                write!(f, "attribute `{attr}` expected {expected}, found {found}")
            }
            ValueErrorKind::WrongTagType { expected, found } => {
                write!(f, "tag value expected {expected}, found {found}")
            }
            ValueErrorKind::ExtraneousAttribute { attr } => {
                write!(f, "attribute `{attr}` is not declared on this entity type")
            }
            ValueErrorKind::MissingRequiredAttribute { attr } => {
                write!(f, "required attribute `{attr}` is missing")
            }
            ValueErrorKind::UnknownEnumId { ty, id } => {
                write!(f, "`{id}` is not a declared value of enum type `{ty}`")
            }
            ValueErrorKind::EnumEntityHasExtraState { uid } => {
                write!(f, "enum entity `{uid}` must have no parents, attributes, or tags")
            }
            ValueErrorKind::ParentTypeNotDeclared { parent, entity_type } => {
                write!(f, "`{parent}` is not a declared parent type of `{entity_type}`")
            }
            ValueErrorKind::ActionWrongParents { uid } => {
                write!(f, "action `{uid}`'s parents do not match the schema's declared parents")
            }
            ValueErrorKind::UnexpectedTags { entity_type } => {
                write!(f, "entity type `{entity_type}` declares no tag type but has tags")
            }
            ValueErrorKind::UnknownAction { uid } => write!(f, "`{uid}` is not a known action"),
            ValueErrorKind::NoAppliesTo { uid } => {
                write!(f, "action `{uid}` declares no `appliesTo` and cannot be requested")
            }
            ValueErrorKind::PrincipalTypeNotAllowed { ty } => {
                write!(f, "principal type `{ty}` is not permitted by this action's `appliesTo`")
            }
            ValueErrorKind::ResourceTypeNotAllowed { ty } => {
                write!(f, "resource type `{ty}` is not permitted by this action's `appliesTo`")
            }
        }
    }
}

impl std::error::Error for ValueError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_message() {
        let err = ValueError::new(ValueErrorKind::MissingRequiredAttribute { attr: "owner".to_string() });
        insta::assert_snapshot!(err.to_string(), @"required attribute `owner` is missing");
    }
}
