//! The dead-branch visitor: when short-circuit evaluation skips a subtree
//! (`False && _`, `True || _`, a constant `if`), this walks it anyway,
//! checking only that every entity UID literal it contains names a type
//! known to the schema. Everything else in the skipped subtree is ignored.

use cedar_schema_model::ResolvedSchema;

use crate::error::{TypeError, TypeErrorKind};
use crate::expr::{Expr, Literal};
use crate::is_known_entity_type;

pub fn validate_dead_branch(expr: &Expr, schema: &ResolvedSchema) -> Result<(), TypeError> {
    match expr {
        Expr::Lit(Literal::EntityUid(ty, _)) => {
            if !is_known_entity_type(schema, ty) {
                return Err(TypeError::new(TypeErrorKind::EntityTypeUnknown {
                    name: ty.as_str().to_string(),
                }));
            }
            Ok(())
        }
        Expr::Lit(_) | Expr::Var(_) => Ok(()),
        Expr::Not(e) | Expr::Neg(e) | Expr::IsEmpty(e) | Expr::Has(e, _) | Expr::GetAttr(e, _) => {
            validate_dead_branch(e, schema)
        }
        Expr::Like(e, _) => validate_dead_branch(e, schema),
        Expr::Is(e, _) => validate_dead_branch(e, schema),
        Expr::IsIn(e, _, target) => {
            validate_dead_branch(e, schema)?;
            validate_dead_branch(target, schema)
        }
        Expr::Arith(_, a, b)
        | Expr::Cmp(_, a, b)
        | Expr::Eq(a, b)
        | Expr::NotEq(a, b)
        | Expr::And(a, b)
        | Expr::Or(a, b)
        | Expr::In(a, b)
        | Expr::Contains(a, b)
        | Expr::ContainsAll(a, b)
        | Expr::ContainsAny(a, b)
        | Expr::HasTag(a, b)
        | Expr::GetTag(a, b) => {
            validate_dead_branch(a, schema)?;
            validate_dead_branch(b, schema)
        }
        Expr::If(c, t, e) => {
            validate_dead_branch(c, schema)?;
            validate_dead_branch(t, schema)?;
            validate_dead_branch(e, schema)
        }
        Expr::Set(items) => {
            for item in items {
                validate_dead_branch(item, schema)?;
            }
            Ok(())
        }
        Expr::Record(fields) => {
            for (_, value) in fields {
                validate_dead_branch(value, schema)?;
            }
            Ok(())
        }
        Expr::ExtensionCall(_, args) => {
            for arg in args {
                validate_dead_branch(arg, schema)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_schema_model::EntityTypeName;

    #[test]
    fn rejects_entity_literal_of_unknown_type_in_dead_branch() {
        let schema = ResolvedSchema::default();
        let expr = Expr::Eq(
            Box::new(Expr::Var(crate::expr::Var::Principal)),
            Box::new(Expr::Lit(Literal::EntityUid(
                EntityTypeName::new("Unknown"),
                "x".to_string(),
            ))),
        );
        let err = validate_dead_branch(&expr, &schema).unwrap_err();
        assert!(matches!(err.kind, TypeErrorKind::EntityTypeUnknown { .. }));
    }

    #[test]
    fn ignores_everything_else() {
        let schema = ResolvedSchema::default();
        let expr = Expr::Arith(
            crate::expr::ArithOp::Add,
            Box::new(Expr::Lit(Literal::Long(1))),
            Box::new(Expr::Lit(Literal::Long(2))),
        );
        assert!(validate_dead_branch(&expr, &schema).is_ok());
    }
}
