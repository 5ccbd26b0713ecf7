//! The checker's expression AST: a closed sum of policy-condition node
//! kinds, built by a caller-supplied policy parser (outside this crate).

use cedar_schema_model::EntityTypeName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Long(i64),
    String(String),
    /// An entity UID literal, e.g. `User::"alice"`.
    EntityUid(EntityTypeName, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    Principal,
    Action,
    Resource,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// A policy-condition expression. A closed sum, matched exhaustively
/// everywhere it's walked (the checker and the dead-branch validator stay
/// in sync because there's no open-recursion dispatch to drift apart).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Lit(Literal),
    Var(Var),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    In(Box<Expr>, Box<Expr>),
    Contains(Box<Expr>, Box<Expr>),
    ContainsAll(Box<Expr>, Box<Expr>),
    ContainsAny(Box<Expr>, Box<Expr>),
    IsEmpty(Box<Expr>),
    Like(Box<Expr>, String),
    Is(Box<Expr>, EntityTypeName),
    IsIn(Box<Expr>, EntityTypeName, Box<Expr>),
    Has(Box<Expr>, String),
    HasTag(Box<Expr>, Box<Expr>),
    GetAttr(Box<Expr>, String),
    GetTag(Box<Expr>, Box<Expr>),
    Set(Vec<Expr>),
    Record(Vec<(String, Expr)>),
    ExtensionCall(String, Vec<Expr>),
}

/// The dotted variable path an expression denotes, if it's an addressable
/// location rooted at a variable (`principal`, `principal.address`, …).
/// Anonymous sub-expressions (anything not a variable or a chain of
/// attribute accesses on one) have no path.
pub fn var_path(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Var(Var::Principal) => Some("principal".to_string()),
        Expr::Var(Var::Action) => Some("action".to_string()),
        Expr::Var(Var::Resource) => Some("resource".to_string()),
        Expr::Var(Var::Context) => Some("context".to_string()),
        Expr::GetAttr(inner, attr) => var_path(inner).map(|p| format!("{p}.{attr}")),
        _ => None,
    }
}
