//! The expression checker: walks a policy-condition `Expr`, producing an
//! `InternalType` and an updated `CapabilitySet`, or a typed error.

use std::collections::BTreeMap;

use cedar_capabilities::{Capability, CapabilitySet};
use cedar_schema_model::ResolvedSchema;
use cedar_types::{is_subtype, least_upper_bound, lower_schema_type, InternalType, Mode, RecordAttr, RecordShape};
use tracing::trace;

use crate::dead_branch::validate_dead_branch;
use crate::env::RequestEnv;
use crate::error::{TypeError, TypeErrorKind};
use crate::expr::{var_path, ArithOp, CmpOp, Expr, Literal, Var};
use crate::extensions;
use crate::is_known_entity_type;

pub fn check_expr(
    expr: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    trace!(?expr, "checking expression");
    match expr {
        Expr::Lit(lit) => check_literal(lit, schema, caps),
        Expr::Var(v) => Ok((check_var(*v, env), caps.clone())),

        Expr::Not(e) => {
            let (t, c) = check_expr(e, env, schema, caps, mode)?;
            if !t.is_boolean() {
                return Err(mismatch("!", "Bool", &t));
            }
            let result = match t {
                InternalType::True => InternalType::False,
                InternalType::False => InternalType::True,
                _ => InternalType::Bool,
            };
            Ok((result, c))
        }

        Expr::Neg(e) => {
            let (t, c) = check_expr(e, env, schema, caps, mode)?;
            require(&t, &InternalType::Long, "-")?;
            Ok((InternalType::Long, c))
        }

        Expr::Arith(op, a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            require(&ta, &InternalType::Long, arith_name(*op))?;
            require(&tb, &InternalType::Long, arith_name(*op))?;
            Ok((InternalType::Long, c))
        }

        Expr::Cmp(op, a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            require(&ta, &InternalType::Long, cmp_name(*op))?;
            require(&tb, &InternalType::Long, cmp_name(*op))?;
            Ok((InternalType::Bool, c))
        }

        Expr::Eq(a, b) | Expr::NotEq(a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            if least_upper_bound(&ta, &tb, mode).is_err() && mode.is_strict() {
                return Err(TypeError::new(TypeErrorKind::IncompatibleLub {
                    a: ta.to_string(),
                    b: tb.to_string(),
                }));
            }
            Ok((InternalType::Bool, c))
        }

        Expr::And(lhs, rhs) => check_and(lhs, rhs, env, schema, caps, mode),
        Expr::Or(lhs, rhs) => check_or(lhs, rhs, env, schema, caps, mode),
        Expr::If(c, t, e) => check_if(c, t, e, env, schema, caps, mode),

        Expr::In(a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            if !ta.is_entity_like() {
                return Err(mismatch("in", "entity", &ta));
            }
            let rhs_ok = tb.is_entity_like()
                || matches!(&tb, InternalType::Set(inner) if inner.is_entity_like());
            if !rhs_ok {
                return Err(mismatch("in", "entity or Set<entity>", &tb));
            }
            Ok((InternalType::Bool, c))
        }

        Expr::Contains(set_e, elem_e) => {
            let ((set_ty, elem_ty), c) = check_pair(set_e, elem_e, env, schema, caps, mode)?;
            let element = match &set_ty {
                InternalType::Set(e) => (**e).clone(),
                other => return Err(mismatch("contains", "Set", other)),
            };
            if matches!(element, InternalType::Never) && !matches!(elem_ty, InternalType::Never) {
                return Err(TypeError::new(TypeErrorKind::EmptySetContains));
            }
            if least_upper_bound(&element, &elem_ty, mode).is_err() {
                return Err(TypeError::new(TypeErrorKind::IncompatibleLub {
                    a: element.to_string(),
                    b: elem_ty.to_string(),
                }));
            }
            Ok((InternalType::Bool, c))
        }

        Expr::ContainsAll(a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            require_set(&ta, "containsAll")?;
            require_set(&tb, "containsAll")?;
            Ok((InternalType::Bool, c))
        }

        Expr::ContainsAny(a, b) => {
            let ((ta, tb), c) = check_pair(a, b, env, schema, caps, mode)?;
            require_set(&ta, "containsAny")?;
            require_set(&tb, "containsAny")?;
            Ok((InternalType::Bool, c))
        }

        Expr::IsEmpty(e) => {
            let (t, c) = check_expr(e, env, schema, caps, mode)?;
            require_set(&t, "isEmpty")?;
            Ok((InternalType::Bool, c))
        }

        Expr::Like(e, _pattern) => {
            let (t, c) = check_expr(e, env, schema, caps, mode)?;
            if !matches!(t, InternalType::String) {
                return Err(mismatch("like", "String", &t));
            }
            Ok((InternalType::Bool, c))
        }

        Expr::Is(e, ty) => {
            let (e_ty, c) = check_expr(e, env, schema, caps, mode)?;
            if !is_known_entity_type(schema, ty) {
                return Err(TypeError::new(TypeErrorKind::EntityTypeUnknown {
                    name: ty.as_str().to_string(),
                }));
            }
            let lub = match &e_ty {
                InternalType::Entity(lub) => lub,
                InternalType::AnyEntity => return Ok((InternalType::Bool, c)),
                other => return Err(mismatch("is", "entity", other)),
            };
            let result = match lub.as_single() {
                Some(single) if single == ty => InternalType::True,
                Some(_) => InternalType::False,
                None => InternalType::Bool,
            };
            Ok((result, c))
        }

        Expr::IsIn(e, ty, target) => {
            let ((e_ty, target_ty), c) = check_pair(e, target, env, schema, caps, mode)?;
            if !is_known_entity_type(schema, ty) {
                return Err(TypeError::new(TypeErrorKind::EntityTypeUnknown {
                    name: ty.as_str().to_string(),
                }));
            }
            if !e_ty.is_entity_like() {
                return Err(mismatch("is...in", "entity", &e_ty));
            }
            if !target_ty.is_entity_like() {
                return Err(mismatch("is...in", "entity", &target_ty));
            }
            Ok((InternalType::Bool, c))
        }

        Expr::Has(arg, attr) => {
            let (arg_ty, caps_arg) = check_expr(arg, env, schema, caps, mode)?;
            let result = has_result(arg, &arg_ty, attr, schema, &caps_arg)?;
            let mut out_caps = caps_arg;
            if let Some(path) = var_path(arg) {
                out_caps = out_caps.add(Capability::new(path, attr.clone()));
            }
            Ok((result, out_caps))
        }

        Expr::GetAttr(arg, attr) => {
            let (arg_ty, caps_arg) = check_expr(arg, env, schema, caps, mode)?;
            let result = get_attr_result(arg, &arg_ty, attr, schema, &caps_arg, mode)?;
            Ok((result, caps_arg))
        }

        Expr::HasTag(lhs, key) => check_has_tag(lhs, key, env, schema, caps, mode),
        Expr::GetTag(lhs, key) => check_get_tag(lhs, key, env, schema, caps, mode),

        Expr::Set(items) => {
            let mut cur_caps = caps.clone();
            let mut acc: Option<InternalType> = None;
            for item in items {
                let (t, c) = check_expr(item, env, schema, &cur_caps, mode)?;
                cur_caps = c;
                acc = Some(match acc {
                    None => t,
                    Some(prev) => least_upper_bound(&prev, &t, mode).map_err(|_| {
                        TypeError::new(TypeErrorKind::IncompatibleLub {
                            a: prev.to_string(),
                            b: t.to_string(),
                        })
                    })?,
                });
            }
            Ok((InternalType::set(acc.unwrap_or(InternalType::Never)), cur_caps))
        }

        Expr::Record(fields) => {
            let mut cur_caps = caps.clone();
            let mut attrs = BTreeMap::new();
            for (name, value) in fields {
                let (t, c) = check_expr(value, env, schema, &cur_caps, mode)?;
                cur_caps = c;
                attrs.insert(name.clone(), RecordAttr { ty: t, required: true });
            }
            Ok((InternalType::Record(RecordShape::closed(attrs)), cur_caps))
        }

        Expr::ExtensionCall(name, args) => check_extension_call(name, args, env, schema, caps, mode),
    }
}

fn check_literal(
    lit: &Literal,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let ty = match lit {
        Literal::Bool(true) => InternalType::True,
        Literal::Bool(false) => InternalType::False,
        Literal::Long(_) => InternalType::Long,
        Literal::String(_) => InternalType::String,
        Literal::EntityUid(ty, _) => {
            if !is_known_entity_type(schema, ty) {
                return Err(TypeError::new(TypeErrorKind::EntityTypeUnknown {
                    name: ty.as_str().to_string(),
                }));
            }
            InternalType::Entity(cedar_types::EntityLub::single(ty.clone()))
        }
    };
    Ok((ty, caps.clone()))
}

fn check_var(var: Var, env: &RequestEnv) -> InternalType {
    use cedar_types::EntityLub;
    match var {
        Var::Principal => InternalType::Entity(EntityLub::single(env.principal_type.clone())),
        Var::Action => InternalType::Entity(EntityLub::single(cedar_schema_model::EntityTypeName::new(
            env.action_uid.ty.clone(),
        ))),
        Var::Resource => InternalType::Entity(EntityLub::single(env.resource_type.clone())),
        Var::Context => InternalType::Record(cedar_types::lower_record(&env.context_type)),
    }
}

fn check_pair(
    a: &Expr,
    b: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<((InternalType, InternalType), CapabilitySet), TypeError> {
    let (ta, ca) = check_expr(a, env, schema, caps, mode)?;
    let (tb, cb) = check_expr(b, env, schema, &ca, mode)?;
    Ok(((ta, tb), cb))
}

fn check_and(
    lhs: &Expr,
    rhs: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let (lhs_ty, caps_lhs) = check_expr(lhs, env, schema, caps, mode)?;
    if !lhs_ty.is_boolean() {
        return Err(mismatch("&&", "Bool", &lhs_ty));
    }
    if matches!(lhs_ty, InternalType::False) {
        validate_dead_branch(rhs, schema)?;
        return Ok((InternalType::False, caps.clone()));
    }
    let caps_for_rhs = caps.union(&caps_lhs);
    let (rhs_ty, caps_rhs) = check_expr(rhs, env, schema, &caps_for_rhs, mode)?;
    if !rhs_ty.is_boolean() {
        return Err(mismatch("&&", "Bool", &rhs_ty));
    }
    if matches!(lhs_ty, InternalType::True) {
        return Ok((rhs_ty, caps_rhs));
    }
    if matches!(rhs_ty, InternalType::False) {
        return Ok((InternalType::False, caps_rhs));
    }
    Ok((InternalType::Bool, caps_rhs))
}

fn check_or(
    lhs: &Expr,
    rhs: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let (lhs_ty, _caps_lhs) = check_expr(lhs, env, schema, caps, mode)?;
    if !lhs_ty.is_boolean() {
        return Err(mismatch("||", "Bool", &lhs_ty));
    }
    if matches!(lhs_ty, InternalType::True) {
        validate_dead_branch(rhs, schema)?;
        return Ok((InternalType::True, caps.clone()));
    }
    // Capabilities from the left do not flow into the right.
    let (rhs_ty, _caps_rhs) = check_expr(rhs, env, schema, caps, mode)?;
    if !rhs_ty.is_boolean() {
        return Err(mismatch("||", "Bool", &rhs_ty));
    }
    Ok((InternalType::Bool, caps.clone()))
}

fn check_if(
    c: &Expr,
    t: &Expr,
    e: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let (c_ty, caps_c) = check_expr(c, env, schema, caps, mode)?;
    if !c_ty.is_boolean() {
        return Err(mismatch("if", "Bool", &c_ty));
    }
    let caps_prime = caps.union(&caps_c);
    match c_ty {
        InternalType::True => {
            validate_dead_branch(e, schema)?;
            let (t_ty, _) = check_expr(t, env, schema, &caps_prime, mode)?;
            Ok((t_ty, caps.clone()))
        }
        InternalType::False => {
            validate_dead_branch(t, schema)?;
            let (e_ty, _) = check_expr(e, env, schema, &caps_prime, mode)?;
            Ok((e_ty, caps.clone()))
        }
        _ => {
            let (t_ty, _) = check_expr(t, env, schema, &caps_prime, mode)?;
            let (e_ty, _) = check_expr(e, env, schema, &caps_prime, mode)?;
            let joined = least_upper_bound(&t_ty, &e_ty, mode).map_err(|_| {
                TypeError::new(TypeErrorKind::IncompatibleLub {
                    a: t_ty.to_string(),
                    b: e_ty.to_string(),
                })
            })?;
            Ok((joined, caps.clone()))
        }
    }
}

fn has_result(
    arg: &Expr,
    arg_ty: &InternalType,
    attr: &str,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
) -> Result<InternalType, TypeError> {
    match arg_ty {
        InternalType::Record(shape) => match shape.attrs.get(attr) {
            Some(a) if a.required => Ok(InternalType::True),
            Some(_) => Ok(InternalType::Bool),
            None => Ok(if shape.open { InternalType::Bool } else { InternalType::False }),
        },
        InternalType::Entity(lub) => {
            if let Some(path) = var_path(arg) {
                if caps.has(&Capability::new(path, attr.to_string())) {
                    return Ok(InternalType::True);
                }
            }
            let known = lub.as_slice().iter().all(|n| is_known_entity_type(schema, n));
            if known {
                let any_has = lub.as_slice().iter().any(|n| schema.declared_attr(n, attr).is_some());
                Ok(if any_has { InternalType::Bool } else { InternalType::False })
            } else {
                Ok(InternalType::Bool)
            }
        }
        InternalType::AnyEntity => Ok(InternalType::Bool),
        other => Err(mismatch("has", "entity or record", other)),
    }
}

fn get_attr_result(
    arg: &Expr,
    arg_ty: &InternalType,
    attr: &str,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<InternalType, TypeError> {
    match arg_ty {
        InternalType::Record(shape) => {
            if shape.open {
                return Ok(InternalType::Never);
            }
            match shape.attrs.get(attr) {
                Some(a) if a.required => Ok(a.ty.clone()),
                Some(a) => {
                    if attribute_guard_present(arg, attr, caps) {
                        Ok(a.ty.clone())
                    } else {
                        Err(TypeError::new(TypeErrorKind::OptionalAttributeWithoutGuard {
                            attr: attr.to_string(),
                        }))
                    }
                }
                None => Err(TypeError::new(TypeErrorKind::AttributeNotDeclared {
                    attr: attr.to_string(),
                })),
            }
        }
        InternalType::Entity(lub) => {
            let mut acc: Option<InternalType> = None;
            let mut any_declared = false;
            let mut all_required = true;
            for name in lub.as_slice() {
                match schema.declared_attr(name, attr) {
                    Some(declared) => {
                        any_declared = true;
                        if !declared.required {
                            all_required = false;
                        }
                        let lowered = lower_schema_type(&declared.ty);
                        acc = Some(match acc {
                            None => lowered,
                            Some(prev) => match least_upper_bound(&prev, &lowered, mode) {
                                Ok(joined) => joined,
                                Err(_) => return Ok(InternalType::Never),
                            },
                        });
                    }
                    None => all_required = false,
                }
            }
            if !any_declared {
                return Err(TypeError::new(TypeErrorKind::AttributeNotDeclared {
                    attr: attr.to_string(),
                }));
            }
            if !all_required && !attribute_guard_present(arg, attr, caps) {
                return Err(TypeError::new(TypeErrorKind::OptionalAttributeWithoutGuard {
                    attr: attr.to_string(),
                }));
            }
            Ok(acc.unwrap_or(InternalType::Never))
        }
        other => Err(mismatch("attribute access", "entity or record", other)),
    }
}

/// The `has` guard is satisfied if the capability is present, or if `arg`
/// has no variable path at all (an anonymous sub-expression is treated as
/// required-only access).
fn attribute_guard_present(arg: &Expr, attr: &str, caps: &CapabilitySet) -> bool {
    match var_path(arg) {
        Some(path) => caps.has(&Capability::new(path, attr.to_string())),
        None => true,
    }
}

fn check_has_tag(
    lhs: &Expr,
    key: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let ((lhs_ty, key_ty), c) = check_pair(lhs, key, env, schema, caps, mode)?;
    if !matches!(key_ty, InternalType::String) {
        return Err(mismatch("hasTag", "String", &key_ty));
    }
    let lub = match &lhs_ty {
        InternalType::Entity(lub) => lub,
        other => return Err(mismatch("hasTag", "entity", other)),
    };
    let any_tags = lub.as_slice().iter().any(|n| schema.declared_tags(n).is_some());
    if !any_tags {
        return Ok((InternalType::False, c));
    }
    let mut out_caps = c;
    if let (Some(path), Expr::Lit(Literal::String(k))) = (var_path(lhs), key) {
        out_caps = out_caps.add(Capability::tag(path, k));
    }
    Ok((InternalType::Bool, out_caps))
}

fn check_get_tag(
    lhs: &Expr,
    key: &Expr,
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let ((lhs_ty, key_ty), c) = check_pair(lhs, key, env, schema, caps, mode)?;
    if !matches!(key_ty, InternalType::String) {
        return Err(mismatch("getTag", "String", &key_ty));
    }
    let lub = match &lhs_ty {
        InternalType::Entity(lub) => lub,
        other => return Err(mismatch("getTag", "entity", other)),
    };
    let tag_types: Vec<InternalType> = lub
        .as_slice()
        .iter()
        .filter_map(|n| schema.declared_tags(n).map(lower_schema_type))
        .collect();
    if tag_types.is_empty() {
        return Err(TypeError::new(TypeErrorKind::NoTagsDeclared));
    }
    let guarded = match (var_path(lhs), key) {
        (Some(path), Expr::Lit(Literal::String(k))) => c.has(&Capability::tag(path, k)),
        _ => false,
    };
    if !guarded {
        return Err(TypeError::new(TypeErrorKind::TagAccessWithoutGuard));
    }
    let mut acc = tag_types[0].clone();
    for t in &tag_types[1..] {
        acc = match least_upper_bound(&acc, t, mode) {
            Ok(joined) => joined,
            Err(_) => return Ok((InternalType::Never, c)),
        };
    }
    Ok((acc, c))
}

fn check_extension_call(
    name: &str,
    args: &[Expr],
    env: &RequestEnv,
    schema: &ResolvedSchema,
    caps: &CapabilitySet,
    mode: Mode,
) -> Result<(InternalType, CapabilitySet), TypeError> {
    let sig = extensions::lookup(name)
        .ok_or_else(|| TypeError::new(TypeErrorKind::UnknownExtensionFunction { name: name.to_string() }))?;
    if sig.params.len() != args.len() {
        return Err(TypeError::new(TypeErrorKind::ExtensionArityMismatch {
            name: name.to_string(),
            expected: sig.params.len(),
            found: args.len(),
        }));
    }
    let mut cur_caps = caps.clone();
    for (i, (arg, expected)) in args.iter().zip(sig.params.iter()).enumerate() {
        let (t, c) = check_expr(arg, env, schema, &cur_caps, mode)?;
        cur_caps = c;
        if !is_subtype(&t, expected, mode) {
            return Err(TypeError::new(TypeErrorKind::ExtensionArgTypeMismatch {
                name: name.to_string(),
                index: i,
                expected: expected.to_string(),
                found: t.to_string(),
            }));
        }
    }
    Ok((sig.ret, cur_caps))
}

fn require(found: &InternalType, expected: &InternalType, op: &str) -> Result<(), TypeError> {
    if found == expected {
        Ok(())
    } else {
        Err(mismatch(op, &expected.to_string(), found))
    }
}

fn require_set(ty: &InternalType, op: &str) -> Result<(), TypeError> {
    if matches!(ty, InternalType::Set(_)) {
        Ok(())
    } else {
        Err(mismatch(op, "Set", ty))
    }
}

fn mismatch(op: &str, expected: &str, found: &InternalType) -> TypeError {
    TypeError::new(TypeErrorKind::OperandMismatch {
        op: op.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

fn arith_name(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
    }
}

fn cmp_name(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Lt => "<",
        CmpOp::Le => "<=",
        CmpOp::Gt => ">",
        CmpOp::Ge => ">=",
    }
}
