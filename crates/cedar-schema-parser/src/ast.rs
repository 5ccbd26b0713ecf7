//! The unresolved schema tree: what the parser produces directly from
//! source text, before common-type inlining.

use cedar_tokenizer::Span;

use crate::Annotations;

#[derive(Debug, Clone, Default)]
pub struct SchemaFile {
    pub namespaces: Vec<Namespace>,
}

#[derive(Debug, Clone)]
pub struct Namespace {
    /// Empty for declarations made outside any `namespace` block.
    pub path: Vec<String>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Entity(EntityDecl),
    Enum(EnumDecl),
    Action(ActionDecl),
    CommonType(CommonTypeDecl),
}

#[derive(Debug, Clone)]
pub struct EntityDecl {
    pub names: Vec<String>,
    pub member_of: Vec<TypeExpr>,
    pub shape: Option<RecordTypeExpr>,
    pub tags: Option<TypeExpr>,
    pub annotations: Annotations,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub names: Vec<String>,
    pub values: Vec<String>,
    pub annotations: Annotations,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ActionDecl {
    pub names: Vec<String>,
    pub member_of: Vec<ActionRef>,
    pub applies_to: Option<AppliesToExpr>,
    pub annotations: Annotations,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ActionRef {
    Local(String),
    Qualified(Vec<String>, String),
}

#[derive(Debug, Clone, Default)]
pub struct AppliesToExpr {
    pub principal_types: Option<Vec<Vec<String>>>,
    pub resource_types: Option<Vec<Vec<String>>>,
    pub context: Option<RecordTypeExpr>,
}

#[derive(Debug, Clone)]
pub struct CommonTypeDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub annotations: Annotations,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Set(Box<TypeExpr>),
    Record(RecordTypeExpr),
    /// A dotted/`::`-joined path; disambiguated as primitive, extension,
    /// common-type alias, or entity reference during resolution.
    Path(Vec<String>, Span),
}

#[derive(Debug, Clone, Default)]
pub struct RecordTypeExpr {
    pub attrs: Vec<AttrDecl>,
}

#[derive(Debug, Clone)]
pub struct AttrDecl {
    pub name: String,
    pub optional: bool,
    pub ty: TypeExpr,
    pub annotations: Annotations,
}
