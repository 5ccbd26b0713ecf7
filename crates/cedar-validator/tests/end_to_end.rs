//! End-to-end scenarios exercising schema parsing, expression checking,
//! policy checking, and value checking together, the way a caller would
//! actually wire this crate up.

use std::collections::BTreeMap;

use cedar_schema_model::EntityTypeName;
use cedar_validator::{
    check_expr, ActionScope, ActionUid, CapabilitySet, CmpOp, Entity, EntityUid, EntityUidLit,
    Expr, InternalType, Literal, Mode, Policy, PrincipalOrResourceScope, Request, RequestEnv,
    ScopeError, ScopeErrorKind, TypeErrorKind, ValidationError, Value, ValueErrorKind, Var,
};

const SCHEMA_SOURCE: &str = r#"
namespace App {
  @doc("a user")
  entity User in [Group] { name: String, age?: Long } tags String;
  entity Group;
  action view appliesTo { principal: [User], resource: [User] };
}
"#;

#[test]
fn schema_parse_nested_types_and_annotations() {
    let file = cedar_schema_parser::parse(SCHEMA_SOURCE).expect("schema parses");

    assert_eq!(file.namespaces.len(), 1);
    let ns = &file.namespaces[0];
    assert_eq!(ns.path, vec!["App".to_string()]);

    let user = ns
        .decls
        .iter()
        .find_map(|d| match d {
            cedar_schema_parser::Decl::Entity(e) if e.names.contains(&"User".to_string()) => Some(e),
            _ => None,
        })
        .expect("User entity declared");

    assert_eq!(user.annotations.get("doc"), Some("a user"));

    assert_eq!(user.member_of.len(), 1);
    match &user.member_of[0] {
        cedar_schema_parser::TypeExpr::Path(segments, _) => {
            assert_eq!(segments, &vec!["Group".to_string()]);
        }
        other => panic!("expected a path reference to Group, got {other:?}"),
    }

    let shape = user.shape.as_ref().expect("User has a shape");
    assert_eq!(shape.attrs.len(), 2);
    let name_attr = shape.attrs.iter().find(|a| a.name == "name").unwrap();
    assert!(!name_attr.optional);
    let age_attr = shape.attrs.iter().find(|a| a.name == "age").unwrap();
    assert!(age_attr.optional);

    assert!(user.tags.is_some());

    let view = ns
        .decls
        .iter()
        .find_map(|d| match d {
            cedar_schema_parser::Decl::Action(a) if a.names.contains(&"view".to_string()) => Some(a),
            _ => None,
        })
        .expect("view action declared");
    let applies_to = view.applies_to.as_ref().expect("view has appliesTo");
    assert_eq!(applies_to.principal_types.as_ref().unwrap().len(), 1);
    assert_eq!(applies_to.resource_types.as_ref().unwrap().len(), 1);
    assert!(applies_to.context.is_none());

    // Resolution qualifies everything under the namespace.
    let schema = cedar_validator::parse_schema(SCHEMA_SOURCE).expect("schema resolves");
    let user_ty = EntityTypeName::new("App::User");
    assert!(schema.entity_types.contains_key(&user_ty));
    let decl = &schema.entity_types[&user_ty];
    assert_eq!(decl.parents, vec![EntityTypeName::new("App::Group")]);
    assert!(decl.shape.attrs["name"].required);
    assert!(!decl.shape.attrs["age"].required);
    assert_eq!(decl.tags, Some(cedar_schema_model::Type::String));

    let view_uid = ActionUid::new("App::Action", "view");
    assert!(schema.actions.contains_key(&view_uid));
}

fn app_env() -> (cedar_schema_model::ResolvedSchema, RequestEnv) {
    let schema = cedar_validator::parse_schema(SCHEMA_SOURCE).expect("schema resolves");
    let env = RequestEnv {
        principal_type: EntityTypeName::new("App::User"),
        action_uid: ActionUid::new("App::Action", "view"),
        resource_type: EntityTypeName::new("App::User"),
        context_type: cedar_schema_model::RecordType::empty(),
    };
    (schema, env)
}

#[test]
fn optional_attribute_requires_has_guard() {
    let (schema, env) = app_env();

    let unguarded = Expr::Cmp(
        CmpOp::Gt,
        Box::new(Expr::GetAttr(Box::new(Expr::Var(Var::Principal)), "age".to_string())),
        Box::new(Expr::Lit(Literal::Long(18))),
    );
    let err = check_expr(&unguarded, &env, &schema, &CapabilitySet::empty(), Mode::Permissive).unwrap_err();
    assert!(matches!(
        err.kind,
        TypeErrorKind::OptionalAttributeWithoutGuard { .. }
    ));

    let guarded = Expr::And(
        Box::new(Expr::Has(Box::new(Expr::Var(Var::Principal)), "age".to_string())),
        Box::new(unguarded),
    );
    let (ty, _caps) = check_expr(&guarded, &env, &schema, &CapabilitySet::empty(), Mode::Permissive)
        .expect("guarded access type-checks");
    assert_eq!(ty, InternalType::Bool);
}

#[test]
fn is_on_singleton_lub() {
    let (schema, env) = app_env();

    let is_user = Expr::Is(Box::new(Expr::Var(Var::Principal)), EntityTypeName::new("App::User"));
    let (ty, _) = check_expr(&is_user, &env, &schema, &CapabilitySet::empty(), Mode::Permissive).unwrap();
    assert_eq!(ty, InternalType::True);

    let is_group = Expr::Is(Box::new(Expr::Var(Var::Principal)), EntityTypeName::new("App::Group"));
    let (ty, _) = check_expr(&is_group, &env, &schema, &CapabilitySet::empty(), Mode::Permissive).unwrap();
    assert_eq!(ty, InternalType::False);
}

#[test]
fn dead_branch_entity_literal_is_still_checked() {
    let (schema, env) = app_env();

    let expr = Expr::And(
        Box::new(Expr::Lit(Literal::Bool(false))),
        Box::new(Expr::Eq(
            Box::new(Expr::Var(Var::Principal)),
            Box::new(Expr::Lit(Literal::EntityUid(EntityTypeName::new("Unknown"), "x".to_string()))),
        )),
    );
    let err = check_expr(&expr, &env, &schema, &CapabilitySet::empty(), Mode::Permissive).unwrap_err();
    assert!(matches!(err.kind, TypeErrorKind::EntityTypeUnknown { .. }));
}

#[test]
fn action_application_failure_reports_no_applicable_action() {
    let schema = cedar_validator::parse_schema(SCHEMA_SOURCE).expect("schema resolves");

    let policy = Policy {
        principal_scope: PrincipalOrResourceScope::Is(EntityTypeName::new("App::Group")),
        action_scope: ActionScope::All,
        resource_scope: PrincipalOrResourceScope::All,
        conditions: vec![],
    };

    let err = cedar_validator::validate_policy(&policy, &schema, Mode::Permissive).unwrap_err();
    match err {
        ValidationError::Policy(errors) => {
            assert!(!errors.scope_errors.is_empty());
            let found = errors
                .scope_errors
                .iter()
                .any(|e: &ScopeError| matches!(e.kind, ScopeErrorKind::NoApplicableAction));
            assert!(found, "expected a NoApplicableAction scope error, got {errors:?}");
        }
        other => panic!("expected a policy error, got {other:?}"),
    }

    // Sanity check: the unconstrained-resource form of the same policy does
    // apply, since `view`'s principal and resource are both `User`.
    let eq_user_policy = Policy {
        principal_scope: PrincipalOrResourceScope::Eq(EntityUidLit {
            ty: EntityTypeName::new("App::User"),
            id: "alice".to_string(),
        }),
        action_scope: ActionScope::All,
        resource_scope: PrincipalOrResourceScope::All,
        conditions: vec![],
    };
    cedar_validator::validate_policy(&eq_user_policy, &schema, Mode::Permissive)
        .expect("principal User scope applies to the view action");
}

const CONTEXT_SCHEMA: &str = r#"
entity User;
action view appliesTo { principal: [User], resource: [User], context: { ip: ipaddr } };
"#;

#[test]
fn request_validation_checks_context_shape() {
    let schema = cedar_validator::parse_schema(CONTEXT_SCHEMA).expect("schema resolves");

    let principal = EntityUid::new(EntityTypeName::new("User"), "alice");
    let resource = EntityUid::new(EntityTypeName::new("User"), "doc1");
    let action = ActionUid::new("Action", "view");

    let missing_context = Request {
        principal: principal.clone(),
        action: action.clone(),
        resource: resource.clone(),
        context: BTreeMap::new(),
    };
    let err = cedar_validator::validate_request(&missing_context, &schema).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::Value(e) if matches!(e.kind, ValueErrorKind::MissingRequiredAttribute { .. })
    ));

    let mut context = BTreeMap::new();
    context.insert("ip".to_string(), Value::Extension("ipaddr".to_string(), "127.0.0.1".to_string()));
    let with_context = Request { principal, action, resource, context };
    cedar_validator::validate_request(&with_context, &schema).expect("context satisfies the declared shape");
}

#[test]
fn entity_store_validation_rejects_unknown_parent_type() {
    let schema = cedar_validator::parse_schema(CONTEXT_SCHEMA).expect("schema resolves");

    let uid = EntityUid::new(EntityTypeName::new("User"), "alice");
    let mut entities = BTreeMap::new();
    entities.insert(uid.clone(), Entity::default());
    cedar_validator::validate_entities(&entities, &schema).expect("a bare User entity is valid");

    entities.get_mut(&uid).unwrap().parents.insert(EntityUid::new(EntityTypeName::new("Ghost"), "g"));
    let err = cedar_validator::validate_entities(&entities, &schema).unwrap_err();
    match err {
        ValidationError::Entities(errs) => {
            assert_eq!(errs.len(), 1);
            assert_eq!(errs[0].0, uid);
        }
        other => panic!("expected an Entities error, got {other:?}"),
    }
}
