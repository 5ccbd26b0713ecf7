//! Parses Cedar schema text into an unresolved tree, then resolves it
//! (common-type inlining, reference validation) into the contract
//! `cedar-schema-model` defines.

mod annotations;
mod ast;
mod error;
mod parser;
mod resolve;

pub use annotations::Annotations;
pub use ast::{
    ActionDecl, ActionRef, AppliesToExpr, AttrDecl, CommonTypeDecl, Decl, EntityDecl, EnumDecl,
    Namespace, RecordTypeExpr, SchemaFile, TypeExpr,
};
pub use error::{DuplicateKind, ParseError, ParseErrorKind, ReservedNameKind, RESERVED_NAMES};
pub use parser::parse;
pub use resolve::{resolve, ResolveError, ResolveErrorKind};

use cedar_schema_model::ResolvedSchema;

/// Any failure from parsing or resolving schema text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    Parse(ParseError),
    Resolve(ResolveError),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::Parse(e) => write!(f, "{e}"),
            SchemaError::Resolve(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SchemaError {}

impl From<ParseError> for SchemaError {
    fn from(e: ParseError) -> Self {
        SchemaError::Parse(e)
    }
}

impl From<ResolveError> for SchemaError {
    fn from(e: ResolveError) -> Self {
        SchemaError::Resolve(e)
    }
}

impl SchemaError {
    pub fn render(&self, filename: &str, source: &str) -> String {
        match self {
            SchemaError::Parse(e) => e.render(filename, source),
            SchemaError::Resolve(e) => e.render(filename, source),
        }
    }
}

/// Parse and resolve schema text in one step; the common entry point for
/// callers that don't need the unresolved tree.
pub fn parse_and_resolve(source: &str) -> Result<ResolvedSchema, SchemaError> {
    let file = parser::parse(source)?;
    let schema = resolve::resolve(&file, source)?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_resolve_round_trip() {
        let schema = parse_and_resolve(
            r#"
            entity User;
            entity Doc { owner: User };
            action view appliesTo { principal: [User], resource: [Doc] };
            "#,
        )
        .unwrap();
        assert!(schema.is_known_entity_or_enum(&cedar_schema_model::EntityTypeName::new("Doc")));
    }
}
