//! Expression and policy type checking against a resolved schema.
//!
//! This crate has no parser of its own: policies arrive as an already-parsed
//! [`expr::Expr`] tree (and, for whole policies, a [`policy::Policy`]). It
//! answers one question — does this expression, under every request
//! environment the schema admits, type-check? — tracking the flow-sensitive
//! capabilities that `has`/`hasTag` guards grant to later sub-expressions.

mod check;
mod dead_branch;
mod env;
mod error;
mod expr;
mod extensions;
mod policy;

pub use check::check_expr;
pub use env::RequestEnv;
pub use error::{PolicyCheckErrors, ScopeError, ScopeErrorKind, TypeError, TypeErrorKind};
pub use expr::{var_path, ArithOp, CmpOp, Expr, Literal, Var};
pub use policy::{check_policy, ActionScope, EntityUidLit, Policy, PrincipalOrResourceScope};

use cedar_schema_model::{EntityTypeName, ResolvedSchema};

/// An entity UID literal's type is valid if the schema knows it as an
/// entity type, an enum type, or the type half of some declared action UID.
pub fn is_known_entity_type(schema: &ResolvedSchema, name: &EntityTypeName) -> bool {
    schema.is_known_entity_or_enum(name) || schema.actions.keys().any(|uid| uid.ty == name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_schema_model::EntityTypeDecl;

    #[test]
    fn known_entity_type_includes_declared_entities_enums_and_action_types() {
        let mut schema = ResolvedSchema::default();
        schema
            .entity_types
            .insert(EntityTypeName::new("User"), EntityTypeDecl::default());
        schema
            .enum_types
            .insert(EntityTypeName::new("Color"), vec!["Red".to_string()]);
        schema.actions.insert(
            cedar_schema_model::ActionUid::new("Action", "view"),
            Default::default(),
        );

        assert!(is_known_entity_type(&schema, &EntityTypeName::new("User")));
        assert!(is_known_entity_type(&schema, &EntityTypeName::new("Color")));
        assert!(is_known_entity_type(&schema, &EntityTypeName::new("Action")));
        assert!(!is_known_entity_type(&schema, &EntityTypeName::new("Unknown")));
    }
}
