//! JSON file format for policies: a direct, untagged-union-free encoding of
//! `cedar_validator::{Policy, Expr}`. This is our own internal AST's JSON
//! shape, not Cedar's official policy JSON schema — policies still arrive as
//! an already-built `Expr` tree, same as the checker expects; this module is
//! just the file-reading convenience the CLI needs to build one.

use cedar_schema_model::{ActionUid, EntityTypeName};
use cedar_validator::{
    ActionScope, ArithOp, CmpOp, EntityUidLit, Expr, Literal, Policy, PrincipalOrResourceScope,
    Var,
};
use serde_json::Value as Json;

use crate::CliError;

fn field<'a>(json: &'a Json, name: &str) -> Result<&'a Json, CliError> {
    json.get(name)
        .ok_or_else(|| CliError::Parse(format!("missing field `{name}`")))
}

fn str_field<'a>(json: &'a Json, name: &str) -> Result<&'a str, CliError> {
    field(json, name)?
        .as_str()
        .ok_or_else(|| CliError::Parse(format!("field `{name}` must be a string")))
}

fn entity_uid_lit(json: &Json) -> Result<EntityUidLit, CliError> {
    Ok(EntityUidLit {
        ty: EntityTypeName::new(str_field(json, "type")?),
        id: str_field(json, "id")?.to_string(),
    })
}

pub fn policy_from_json(json: &Json) -> Result<Policy, CliError> {
    Ok(Policy {
        principal_scope: par_scope_from_json(field(json, "principal")?)?,
        action_scope: action_scope_from_json(field(json, "action")?)?,
        resource_scope: par_scope_from_json(field(json, "resource")?)?,
        conditions: field(json, "conditions")?
            .as_array()
            .ok_or_else(|| CliError::Parse("`conditions` must be an array".to_string()))?
            .iter()
            .map(expr_from_json)
            .collect::<Result<_, _>>()?,
    })
}

fn par_scope_from_json(json: &Json) -> Result<PrincipalOrResourceScope, CliError> {
    match str_field(json, "kind")? {
        "all" => Ok(PrincipalOrResourceScope::All),
        "eq" => Ok(PrincipalOrResourceScope::Eq(entity_uid_lit(json)?)),
        "in" => Ok(PrincipalOrResourceScope::In(entity_uid_lit(json)?)),
        "is" => Ok(PrincipalOrResourceScope::Is(EntityTypeName::new(str_field(json, "type")?))),
        "isIn" => Ok(PrincipalOrResourceScope::IsIn(
            EntityTypeName::new(str_field(json, "type")?),
            entity_uid_lit(field(json, "in")?)?,
        )),
        other => Err(CliError::Parse(format!("unknown scope kind `{other}`"))),
    }
}

fn action_uid(json: &Json) -> Result<ActionUid, CliError> {
    Ok(ActionUid::new(str_field(json, "type")?, str_field(json, "id")?))
}

fn action_scope_from_json(json: &Json) -> Result<ActionScope, CliError> {
    match str_field(json, "kind")? {
        "all" => Ok(ActionScope::All),
        "eq" => Ok(ActionScope::Eq(action_uid(json)?)),
        "in" => Ok(ActionScope::In(action_uid(json)?)),
        "inSet" => {
            let actions = field(json, "actions")?
                .as_array()
                .ok_or_else(|| CliError::Parse("`actions` must be an array".to_string()))?
                .iter()
                .map(action_uid)
                .collect::<Result<_, _>>()?;
            Ok(ActionScope::InSet(actions))
        }
        other => Err(CliError::Parse(format!("unknown action scope kind `{other}`"))),
    }
}

fn literal_from_json(json: &Json) -> Result<Literal, CliError> {
    let value = field(json, "value")?;
    match value {
        Json::Bool(b) => Ok(Literal::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Literal::Long)
            .ok_or_else(|| CliError::Parse(format!("not an integer literal: {n}"))),
        Json::String(s) => Ok(Literal::String(s.clone())),
        Json::Object(_) => Ok(Literal::EntityUid(
            EntityTypeName::new(str_field(value, "type")?),
            str_field(value, "id")?.to_string(),
        )),
        other => Err(CliError::Parse(format!("invalid literal: {other}"))),
    }
}

fn var_from_json(json: &Json) -> Result<Var, CliError> {
    match str_field(json, "name")? {
        "principal" => Ok(Var::Principal),
        "action" => Ok(Var::Action),
        "resource" => Ok(Var::Resource),
        "context" => Ok(Var::Context),
        other => Err(CliError::Parse(format!("unknown variable `{other}`"))),
    }
}

fn boxed(json: &Json, name: &str) -> Result<Box<Expr>, CliError> {
    Ok(Box::new(expr_from_json(field(json, name)?)?))
}

pub fn expr_from_json(json: &Json) -> Result<Expr, CliError> {
    match str_field(json, "kind")? {
        "lit" => Ok(Expr::Lit(literal_from_json(json)?)),
        "var" => Ok(Expr::Var(var_from_json(json)?)),
        "not" => Ok(Expr::Not(boxed(json, "expr")?)),
        "neg" => Ok(Expr::Neg(boxed(json, "expr")?)),
        "arith" => Ok(Expr::Arith(
            match str_field(json, "op")? {
                "add" => ArithOp::Add,
                "sub" => ArithOp::Sub,
                "mul" => ArithOp::Mul,
                other => return Err(CliError::Parse(format!("unknown arith op `{other}`"))),
            },
            boxed(json, "lhs")?,
            boxed(json, "rhs")?,
        )),
        "cmp" => Ok(Expr::Cmp(
            match str_field(json, "op")? {
                "lt" => CmpOp::Lt,
                "le" => CmpOp::Le,
                "gt" => CmpOp::Gt,
                "ge" => CmpOp::Ge,
                other => return Err(CliError::Parse(format!("unknown cmp op `{other}`"))),
            },
            boxed(json, "lhs")?,
            boxed(json, "rhs")?,
        )),
        "eq" => Ok(Expr::Eq(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "neq" => Ok(Expr::NotEq(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "and" => Ok(Expr::And(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "or" => Ok(Expr::Or(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "if" => Ok(Expr::If(boxed(json, "cond")?, boxed(json, "then")?, boxed(json, "else")?)),
        "in" => Ok(Expr::In(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "contains" => Ok(Expr::Contains(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "containsAll" => Ok(Expr::ContainsAll(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "containsAny" => Ok(Expr::ContainsAny(boxed(json, "lhs")?, boxed(json, "rhs")?)),
        "isEmpty" => Ok(Expr::IsEmpty(boxed(json, "expr")?)),
        "like" => Ok(Expr::Like(boxed(json, "expr")?, str_field(json, "pattern")?.to_string())),
        "is" => Ok(Expr::Is(boxed(json, "expr")?, EntityTypeName::new(str_field(json, "entityType")?))),
        "isIn" => Ok(Expr::IsIn(
            boxed(json, "expr")?,
            EntityTypeName::new(str_field(json, "entityType")?),
            boxed(json, "in")?,
        )),
        "has" => Ok(Expr::Has(boxed(json, "expr")?, str_field(json, "attr")?.to_string())),
        "hasTag" => Ok(Expr::HasTag(boxed(json, "expr")?, boxed(json, "key")?)),
        "getAttr" => Ok(Expr::GetAttr(boxed(json, "expr")?, str_field(json, "attr")?.to_string())),
        "getTag" => Ok(Expr::GetTag(boxed(json, "expr")?, boxed(json, "key")?)),
        "set" => Ok(Expr::Set(
            field(json, "items")?
                .as_array()
                .ok_or_else(|| CliError::Parse("`items` must be an array".to_string()))?
                .iter()
                .map(expr_from_json)
                .collect::<Result<_, _>>()?,
        )),
        "record" => {
            let fields = field(json, "fields")?
                .as_object()
                .ok_or_else(|| CliError::Parse("`fields` must be an object".to_string()))?;
            let mut entries = Vec::with_capacity(fields.len());
            for (k, v) in fields {
                entries.push((k.clone(), expr_from_json(v)?));
            }
            Ok(Expr::Record(entries))
        }
        "extensionCall" => Ok(Expr::ExtensionCall(
            str_field(json, "name")?.to_string(),
            field(json, "args")?
                .as_array()
                .ok_or_else(|| CliError::Parse("`args` must be an array".to_string()))?
                .iter()
                .map(expr_from_json)
                .collect::<Result<_, _>>()?,
        )),
        other => Err(CliError::Parse(format!("unknown expression kind `{other}`"))),
    }
}
