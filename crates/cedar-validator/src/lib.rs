//! Ties schema parsing, expression/policy type checking, and runtime-value
//! checking into one public surface. Downstream callers (the CLI, or any
//! embedder) only need this crate and a single error type.

pub use cedar_capabilities::{Capability, CapabilitySet};
pub use cedar_schema_model::{
    ActionUid, EntityTypeName, ResolvedSchema,
};
pub use cedar_schema_parser::{ParseError, ResolveError, SchemaError};
pub use cedar_typecheck::{
    check_expr, check_policy, ActionScope, ArithOp, CmpOp, EntityUidLit, Expr, Literal, Policy,
    PolicyCheckErrors, PrincipalOrResourceScope, RequestEnv, ScopeError, ScopeErrorKind, TypeError,
    TypeErrorKind, Var,
};
pub use cedar_types::{InternalType, Mode};
pub use cedar_valuecheck::{Entity, EntityUid, Request, Value, ValueError, ValueErrorKind};

use tracing::trace;

/// The union of every error kind this crate's entry points can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Schema(SchemaError),
    Policy(PolicyCheckErrors),
    Value(ValueError),
    Entities(Vec<(EntityUid, ValueError)>),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Schema(e) => write!(f, "{e}"),
            ValidationError::Policy(e) => write!(f, "{e}"),
            ValidationError::Value(e) => write!(f, "{e}"),
            ValidationError::Entities(errs) => {
                for (uid, e) in errs {
                    writeln!(f, "{uid}: {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<SchemaError> for ValidationError {
    fn from(e: SchemaError) -> Self {
        ValidationError::Schema(e)
    }
}

impl From<PolicyCheckErrors> for ValidationError {
    fn from(e: PolicyCheckErrors) -> Self {
        ValidationError::Policy(e)
    }
}

impl From<ValueError> for ValidationError {
    fn from(e: ValueError) -> Self {
        ValidationError::Value(e)
    }
}

impl From<Vec<(EntityUid, ValueError)>> for ValidationError {
    fn from(e: Vec<(EntityUid, ValueError)>) -> Self {
        ValidationError::Entities(e)
    }
}

/// Parses and resolves schema text. The common first step of every other
/// entry point here.
pub fn parse_schema(source: &str) -> Result<ResolvedSchema, ValidationError> {
    trace!("parsing schema");
    cedar_schema_parser::parse_and_resolve(source).map_err(ValidationError::from)
}

/// Checks one policy's scopes and conditions against a resolved schema.
pub fn validate_policy(
    policy: &Policy,
    schema: &ResolvedSchema,
    mode: Mode,
) -> Result<(), ValidationError> {
    check_policy(policy, schema, mode).map_err(ValidationError::from)
}

/// Validates a single entity's shape against a resolved schema.
pub fn validate_entity(
    uid: &EntityUid,
    entity: &Entity,
    schema: &ResolvedSchema,
) -> Result<(), ValidationError> {
    cedar_valuecheck::validate_entity(uid, entity, schema).map_err(ValidationError::from)
}

/// Validates every entity in a store, collecting all failures rather than
/// stopping at the first.
pub fn validate_entities(
    entities: &std::collections::BTreeMap<EntityUid, Entity>,
    schema: &ResolvedSchema,
) -> Result<(), ValidationError> {
    cedar_valuecheck::validate_entities(entities, schema).map_err(ValidationError::from)
}

/// Validates a request's principal/action/resource/context against a
/// resolved schema's `appliesTo` declarations.
pub fn validate_request(request: &Request, schema: &ResolvedSchema) -> Result<(), ValidationError> {
    cedar_valuecheck::validate_request(request, schema).map_err(ValidationError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_schema_surfaces_schema_error() {
        let err = parse_schema("entity User { age: UnknownType };").unwrap_err();
        assert!(matches!(err, ValidationError::Schema(_)));
    }

    #[test]
    fn parse_schema_succeeds_on_valid_text() {
        let schema = parse_schema("entity User; entity Doc { owner: User };").unwrap();
        assert!(schema.is_known_entity_or_enum(&EntityTypeName::new("Doc")));
    }

    #[test]
    fn entities_error_display_lists_one_line_per_uid() {
        let uid = EntityUid::new(EntityTypeName::new("Ghost"), "g1");
        let err = ValidationError::Entities(vec![(
            uid.clone(),
            ValueError::new(cedar_valuecheck::ValueErrorKind::UnknownEntityType { name: "Ghost".to_string() }),
        )]);
        insta::assert_snapshot!(err.to_string(), @r###"Ghost::"g1": entity type `Ghost` is not declared in the schema"###);
    }

    #[test]
    fn validate_policy_reports_no_applicable_action() {
        let schema = parse_schema(
            r#"
            entity User;
            entity Doc;
            action view appliesTo { principal: [User], resource: [Doc] };
            "#,
        )
        .unwrap();

        let policy = Policy {
            principal_scope: PrincipalOrResourceScope::Eq(EntityUidLit {
                ty: EntityTypeName::new("Doc"),
                id: "x".to_string(),
            }),
            action_scope: ActionScope::All,
            resource_scope: PrincipalOrResourceScope::All,
            conditions: vec![],
        };

        let err = validate_policy(&policy, &schema, Mode::Permissive).unwrap_err();
        match err {
            ValidationError::Policy(errs) => assert!(!errs.scope_errors.is_empty()),
            other => panic!("expected Policy error, got {other:?}"),
        }
    }
}
