//! `PolicyChecker`: RBAC scope validation, request-environment enumeration,
//! and running the expression checker over every environment a policy's
//! scope admits.

use std::collections::BTreeSet;

use cedar_capabilities::CapabilitySet;
use cedar_schema_model::{ActionUid, EntityTypeName, ResolvedSchema};
use cedar_types::Mode;

use crate::check::check_expr;
use crate::env::RequestEnv;
use crate::error::{PolicyCheckErrors, ScopeError, ScopeErrorKind, TypeError, TypeErrorKind};
use crate::expr::Expr;

/// An entity UID literal appearing in a policy scope clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUidLit {
    pub ty: EntityTypeName,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalOrResourceScope {
    All,
    Eq(EntityUidLit),
    In(EntityUidLit),
    Is(EntityTypeName),
    IsIn(EntityTypeName, EntityUidLit),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionScope {
    All,
    Eq(ActionUid),
    In(ActionUid),
    InSet(Vec<ActionUid>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub principal_scope: PrincipalOrResourceScope,
    pub action_scope: ActionScope,
    pub resource_scope: PrincipalOrResourceScope,
    pub conditions: Vec<Expr>,
}

pub fn check_policy(policy: &Policy, schema: &ResolvedSchema, mode: Mode) -> Result<(), PolicyCheckErrors> {
    let mut errors = PolicyCheckErrors::default();

    let principal_set = validate_par_scope(&policy.principal_scope, schema, &mut errors);
    let resource_set = validate_par_scope(&policy.resource_scope, schema, &mut errors);
    let action_set = validate_action_scope(&policy.action_scope, schema, &mut errors);

    if !errors.scope_errors.is_empty() {
        return Err(errors);
    }

    let relevant_actions: Vec<ActionUid> = match &action_set {
        Some(set) => set.iter().cloned().collect(),
        None => schema.actions.keys().cloned().collect(),
    };

    let any_constrained = !matches!(policy.principal_scope, PrincipalOrResourceScope::All)
        || !matches!(policy.resource_scope, PrincipalOrResourceScope::All)
        || !matches!(policy.action_scope, ActionScope::All);

    if any_constrained {
        let covered = relevant_actions.iter().any(|uid| {
            let applies = match schema.actions.get(uid).and_then(|d| d.applies_to.as_ref()) {
                Some(a) => a,
                None => return false,
            };
            let p_ok = principal_set
                .as_ref()
                .map(|p| p.is_subset(&applies.principals))
                .unwrap_or(true);
            let r_ok = resource_set
                .as_ref()
                .map(|r| r.is_subset(&applies.resources))
                .unwrap_or(true);
            p_ok && r_ok
        });
        if !covered {
            errors
                .scope_errors
                .push(ScopeError::new(ScopeErrorKind::NoApplicableAction));
            return Err(errors);
        }
    }

    let mut envs = Vec::new();
    for uid in &relevant_actions {
        let applies = match schema.actions.get(uid).and_then(|d| d.applies_to.as_ref()) {
            Some(a) => a,
            None => continue,
        };
        for p in &applies.principals {
            if let Some(set) = &principal_set {
                if !set.contains(p) {
                    continue;
                }
            }
            for r in &applies.resources {
                if let Some(set) = &resource_set {
                    if !set.contains(r) {
                        continue;
                    }
                }
                envs.push(RequestEnv {
                    principal_type: p.clone(),
                    action_uid: uid.clone(),
                    resource_type: r.clone(),
                    context_type: applies.context.clone(),
                });
            }
        }
    }

    for env in &envs {
        for cond in &policy.conditions {
            match check_expr(cond, env, schema, &CapabilitySet::empty(), mode) {
                Ok((ty, _)) => {
                    if !ty.is_boolean() {
                        errors.type_errors.push(TypeError::new(TypeErrorKind::OperandMismatch {
                            op: "policy condition".to_string(),
                            expected: "Bool".to_string(),
                            found: ty.to_string(),
                        }));
                    }
                }
                Err(e) => errors.type_errors.push(e),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_par_scope(
    scope: &PrincipalOrResourceScope,
    schema: &ResolvedSchema,
    errors: &mut PolicyCheckErrors,
) -> Option<BTreeSet<EntityTypeName>> {
    match scope {
        PrincipalOrResourceScope::All => None,
        PrincipalOrResourceScope::Eq(lit) => {
            validate_entity_uid_lit(lit, schema, errors);
            Some(BTreeSet::from([lit.ty.clone()]))
        }
        PrincipalOrResourceScope::In(lit) => {
            validate_entity_uid_lit(lit, schema, errors);
            Some(schema.descendant_closure(&lit.ty))
        }
        PrincipalOrResourceScope::Is(ty) => {
            validate_entity_type(ty, schema, errors);
            Some(BTreeSet::from([ty.clone()]))
        }
        PrincipalOrResourceScope::IsIn(ty, lit) => {
            validate_entity_type(ty, schema, errors);
            validate_entity_uid_lit(lit, schema, errors);
            if !schema.descendant_closure(&lit.ty).contains(ty) {
                errors.scope_errors.push(ScopeError::new(ScopeErrorKind::InvalidIsIn {
                    ty: ty.as_str().to_string(),
                    base: lit.ty.as_str().to_string(),
                }));
            }
            Some(BTreeSet::from([ty.clone()]))
        }
    }
}

fn validate_entity_type(ty: &EntityTypeName, schema: &ResolvedSchema, errors: &mut PolicyCheckErrors) {
    if !schema.is_known_entity_or_enum(ty) {
        errors.scope_errors.push(ScopeError::new(ScopeErrorKind::UnknownEntityType {
            name: ty.as_str().to_string(),
        }));
    }
}

fn validate_entity_uid_lit(lit: &EntityUidLit, schema: &ResolvedSchema, errors: &mut PolicyCheckErrors) {
    if let Some(values) = schema.enum_types.get(&lit.ty) {
        if !values.iter().any(|v| v == &lit.id) {
            errors.scope_errors.push(ScopeError::new(ScopeErrorKind::UnknownEnumId {
                ty: lit.ty.as_str().to_string(),
                id: lit.id.clone(),
            }));
        }
    } else if !schema.entity_types.contains_key(&lit.ty) {
        errors.scope_errors.push(ScopeError::new(ScopeErrorKind::UnknownEntityType {
            name: lit.ty.as_str().to_string(),
        }));
    }
}

fn validate_action_scope(
    scope: &ActionScope,
    schema: &ResolvedSchema,
    errors: &mut PolicyCheckErrors,
) -> Option<BTreeSet<ActionUid>> {
    match scope {
        ActionScope::All => None,
        ActionScope::Eq(uid) => {
            validate_action_uid(uid, schema, errors);
            Some(BTreeSet::from([uid.clone()]))
        }
        ActionScope::In(uid) => {
            validate_action_uid(uid, schema, errors);
            Some(schema.action_descendant_closure(uid))
        }
        ActionScope::InSet(uids) => {
            let mut set = BTreeSet::new();
            for uid in uids {
                validate_action_uid(uid, schema, errors);
                set.extend(schema.action_descendant_closure(uid));
            }
            Some(set)
        }
    }
}

fn validate_action_uid(uid: &ActionUid, schema: &ResolvedSchema, errors: &mut PolicyCheckErrors) {
    if !schema.actions.contains_key(uid) {
        errors
            .scope_errors
            .push(ScopeError::new(ScopeErrorKind::UnknownAction { uid: uid.to_string() }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_schema_model::{ActionDecl, AppliesTo, EntityTypeDecl, RecordType};

    fn schema_with_view_action() -> ResolvedSchema {
        let mut schema = ResolvedSchema::default();
        schema
            .entity_types
            .insert(EntityTypeName::new("User"), EntityTypeDecl::default());
        schema
            .entity_types
            .insert(EntityTypeName::new("Photo"), EntityTypeDecl::default());
        let mut principals = BTreeSet::new();
        principals.insert(EntityTypeName::new("User"));
        let mut resources = BTreeSet::new();
        resources.insert(EntityTypeName::new("Photo"));
        schema.actions.insert(
            ActionUid::new("Action", "view"),
            ActionDecl {
                parents: BTreeSet::new(),
                applies_to: Some(AppliesTo {
                    principals,
                    resources,
                    context: RecordType::empty(),
                }),
            },
        );
        schema
    }

    #[test]
    fn policy_with_all_scopes_enumerates_every_environment() {
        let schema = schema_with_view_action();
        let policy = Policy {
            principal_scope: PrincipalOrResourceScope::All,
            action_scope: ActionScope::All,
            resource_scope: PrincipalOrResourceScope::All,
            conditions: vec![Expr::Lit(crate::expr::Literal::Bool(true))],
        };
        assert!(check_policy(&policy, &schema, Mode::Permissive).is_ok());
    }

    #[test]
    fn mismatched_principal_scope_reports_no_applicable_action() {
        let mut schema = schema_with_view_action();
        schema
            .entity_types
            .insert(EntityTypeName::new("Robot"), EntityTypeDecl::default());
        let policy = Policy {
            principal_scope: PrincipalOrResourceScope::Is(EntityTypeName::new("Robot")),
            action_scope: ActionScope::All,
            resource_scope: PrincipalOrResourceScope::All,
            conditions: vec![],
        };
        let err = check_policy(&policy, &schema, Mode::Permissive).unwrap_err();
        assert!(err
            .scope_errors
            .iter()
            .any(|e| matches!(e.kind, ScopeErrorKind::NoApplicableAction)));
    }

    #[test]
    fn non_boolean_condition_is_a_type_error() {
        let schema = schema_with_view_action();
        let policy = Policy {
            principal_scope: PrincipalOrResourceScope::All,
            action_scope: ActionScope::All,
            resource_scope: PrincipalOrResourceScope::All,
            conditions: vec![Expr::Lit(crate::expr::Literal::Long(1))],
        };
        let err = check_policy(&policy, &schema, Mode::Permissive).unwrap_err();
        assert!(!err.type_errors.is_empty());
    }

    #[test]
    fn unknown_enum_id_in_scope_is_rejected() {
        let mut schema = schema_with_view_action();
        schema
            .enum_types
            .insert(EntityTypeName::new("Color"), vec!["Red".to_string()]);
        let policy = Policy {
            principal_scope: PrincipalOrResourceScope::All,
            action_scope: ActionScope::All,
            resource_scope: PrincipalOrResourceScope::Eq(EntityUidLit {
                ty: EntityTypeName::new("Color"),
                id: "Blue".to_string(),
            }),
            conditions: vec![],
        };
        let err = check_policy(&policy, &schema, Mode::Permissive).unwrap_err();
        assert!(err
            .scope_errors
            .iter()
            .any(|e| matches!(e.kind, ScopeErrorKind::UnknownEnumId { .. })));
    }
}
