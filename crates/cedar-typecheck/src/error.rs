//! Type-checker and scope-checker diagnostics. These carry no source span:
//! the expression AST this crate checks is built by a caller-supplied
//! policy parser, not parsed here.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeErrorKind {
    OperandMismatch {
        op: String,
        expected: String,
        found: String,
    },
    EntityTypeUnknown {
        name: String,
    },
    AttributeNotDeclared {
        attr: String,
    },
    OptionalAttributeWithoutGuard {
        attr: String,
    },
    TagAccessWithoutGuard,
    NoTagsDeclared,
    IncompatibleLub {
        a: String,
        b: String,
    },
    UnknownExtensionFunction {
        name: String,
    },
    ExtensionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    ExtensionArgTypeMismatch {
        name: String,
        index: usize,
        expected: String,
        found: String,
    },
    OpenRecordAttributeAccess {
        attr: String,
    },
    EmptySetContains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind) -> Self {
        Self { kind }
    }
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TypeErrorKind::OperandMismatch { op, expected, found } => {
                write!(f, "`{op}` expected {expected}, found `{found}`")
            }
            TypeErrorKind::EntityTypeUnknown { name } => {
                write!(f, "entity type `{name}` is not declared in the schema")
            }
            TypeErrorKind::AttributeNotDeclared { attr } => {
                write!(f, "attribute `{attr}` is not declared")
            }
            TypeErrorKind::OptionalAttributeWithoutGuard { attr } => {
                write!(f, "optional attribute `{attr}` accessed without a `has` guard")
            }
            TypeErrorKind::TagAccessWithoutGuard => {
                write!(f, "tag accessed without a `hasTag` guard")
            }
            TypeErrorKind::NoTagsDeclared => {
                write!(f, "entity type declares no tags")
            }
            TypeErrorKind::IncompatibleLub { a, b } => {
                write!(f, "no least upper bound between `{a}` and `{b}` in strict mode")
            }
            TypeErrorKind::UnknownExtensionFunction { name } => {
                write!(f, "unknown extension function `{name}`")
            }
            TypeErrorKind::ExtensionArityMismatch { name, expected, found } => {
                write!(f, "`{name}` expects {expected} argument(s), found {found}")
            }
            TypeErrorKind::ExtensionArgTypeMismatch { name, index, expected, found } => {
                write!(
                    f,
                    "`{name}` argument {index} expected `{expected}`, found `{found}`"
                )
            }
            TypeErrorKind::OpenRecordAttributeAccess { attr } => {
                write!(f, "cannot access attribute `{attr}` on an open record")
            }
            TypeErrorKind::EmptySetContains => {
                write!(f, "`contains` on an empty set accepts no argument type")
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeErrorKind {
    UnknownEntityType { name: String },
    UnknownAction { uid: String },
    UnknownEnumId { ty: String, id: String },
    InvalidIsIn { ty: String, base: String },
    NoApplicableAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeError {
    pub kind: ScopeErrorKind,
}

impl ScopeError {
    pub fn new(kind: ScopeErrorKind) -> Self {
        Self { kind }
    }
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ScopeErrorKind::UnknownEntityType { name } => {
                write!(f, "`{name}` is not a known entity or enum type")
            }
            ScopeErrorKind::UnknownAction { uid } => write!(f, "`{uid}` is not a known action"),
            ScopeErrorKind::UnknownEnumId { ty, id } => {
                write!(f, "`{id}` is not a declared value of enum type `{ty}`")
            }
            ScopeErrorKind::InvalidIsIn { ty, base } => {
                write!(f, "`{ty}` can never be a member of `{base}`")
            }
            ScopeErrorKind::NoApplicableAction => write!(
                f,
                "no action applies to the given principal and resource type constraints"
            ),
        }
    }
}

impl std::error::Error for ScopeError {}

/// The aggregate result of checking one policy: independent scope and
/// expression-type errors are collected rather than failing fast.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyCheckErrors {
    pub scope_errors: Vec<ScopeError>,
    pub type_errors: Vec<TypeError>,
}

impl PolicyCheckErrors {
    pub fn is_empty(&self) -> bool {
        self.scope_errors.is_empty() && self.type_errors.is_empty()
    }
}

impl std::fmt::Display for PolicyCheckErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for e in &self.scope_errors {
            writeln!(f, "{e}")?;
        }
        for e in &self.type_errors {
            writeln!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PolicyCheckErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_errors_render_one_line_each() {
        let errors = PolicyCheckErrors {
            scope_errors: vec![ScopeError::new(ScopeErrorKind::NoApplicableAction)],
            type_errors: vec![TypeError::new(TypeErrorKind::OptionalAttributeWithoutGuard {
                attr: "age".to_string(),
            })],
        };
        insta::assert_snapshot!(errors.to_string(), @r###"
        no action applies to the given principal and resource type constraints
        optional attribute `age` accessed without a `has` guard
        "###);
    }
}
