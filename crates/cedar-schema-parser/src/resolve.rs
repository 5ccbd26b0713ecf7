//! Resolution: inlines common-type aliases, validates every reference, and
//! builds the resolved schema contract the checker consumes.
//!
//! This is intentionally a thin resolver: it does exactly what's needed to
//! turn an unresolved tree into a valid `ResolvedSchema` (alias inlining,
//! reference validation, duplicate-UID detection) and nothing more.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use cedar_schema_model::{
    ActionDecl as ResolvedActionDecl, ActionUid, AppliesTo, AttrType, EntityTypeDecl,
    EntityTypeName, RecordType, ResolvedSchema, Type,
};
use cedar_tokenizer::{line_col_at, Span};

use crate::ast::{ActionRef, Decl, RecordTypeExpr, SchemaFile, TypeExpr};

const PRIMITIVES: &[&str] = &["Long", "String", "Bool"];
const EXTENSIONS: &[&str] = &["ipaddr", "decimal", "datetime", "duration"];
/// Conventional type part of an action UID, qualified by its namespace.
const ACTION_TY: &str = "Action";

/// Get ariadne config, respecting NO_COLOR env var.
fn ariadne_config() -> Config {
    let no_color = std::env::var("NO_COLOR").is_ok();
    if no_color {
        Config::default().with_color(false)
    } else {
        Config::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveErrorKind {
    UndefinedType { name: String },
    UndefinedAction { reference: String },
    CycleInCommonTypes { path: Vec<String> },
    ShadowedName { name: String },
    DuplicateAction { uid: String },
}

/// A positioned resolution error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub kind: ResolveErrorKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl ResolveError {
    fn new(kind: ResolveErrorKind, span: Span, source: &str) -> Self {
        let lc = line_col_at(source, span.start);
        Self {
            kind,
            span,
            line: lc.line,
            column: lc.column,
        }
    }

    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut out = Vec::new();
        self.write_report(filename, source, &mut out);
        String::from_utf8(out).unwrap_or_else(|_| self.to_string())
    }

    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let range = std::ops::Range::<usize>::from(self.span);
        let report = match &self.kind {
            ResolveErrorKind::UndefinedType { name } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("undefined type `{name}`"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("referenced here")
                            .with_color(Color::Red),
                    )
            }
            ResolveErrorKind::UndefinedAction { reference } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("undefined action `{reference}`"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("referenced here")
                            .with_color(Color::Red),
                    )
            }
            ResolveErrorKind::CycleInCommonTypes { path } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!(
                        "cycle in common type aliases: {}",
                        path.join(" -> ")
                    ))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("cycle detected here")
                            .with_color(Color::Red),
                    )
            }
            ResolveErrorKind::ShadowedName { name } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!(
                        "`{name}` names both a common type and an entity or enum type"
                    ))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("conflicting declaration")
                            .with_color(Color::Red),
                    )
            }
            ResolveErrorKind::DuplicateAction { uid } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("duplicate action `{uid}`"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("duplicate declared here")
                            .with_color(Color::Red),
                    )
            }
        };
        let _ = report
            .with_config(ariadne_config())
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ResolveErrorKind::UndefinedType { name } => write!(f, "undefined type `{name}`"),
            ResolveErrorKind::UndefinedAction { reference } => {
                write!(f, "undefined action `{reference}`")
            }
            ResolveErrorKind::CycleInCommonTypes { path } => {
                write!(f, "cycle in common type aliases: {}", path.join(" -> "))
            }
            ResolveErrorKind::ShadowedName { name } => write!(
                f,
                "`{name}` names both a common type and an entity or enum type"
            ),
            ResolveErrorKind::DuplicateAction { uid } => write!(f, "duplicate action `{uid}`"),
        }?;
        write!(f, " at {}:{}", self.line, self.column)
    }
}

impl std::error::Error for ResolveError {}

type RResult<T> = Result<T, ResolveError>;

/// A common-type declaration as seen during collection: its body and the
/// namespace it was declared in (for resolving relative references inside
/// the alias body).
struct CommonTypeEntry {
    ty: TypeExpr,
    ns: Vec<String>,
    span: Span,
}

struct EntityEntry {
    member_of: Vec<TypeExpr>,
    shape: Option<RecordTypeExpr>,
    tags: Option<TypeExpr>,
    ns: Vec<String>,
    span: Span,
}

struct ActionEntry {
    member_of: Vec<ActionRef>,
    applies_to: Option<crate::ast::AppliesToExpr>,
    ns: Vec<String>,
    span: Span,
}

struct Resolver<'a> {
    source: &'a str,
    common_types: HashMap<String, CommonTypeEntry>,
    entities: HashMap<String, EntityEntry>,
    enums: HashMap<String, Vec<String>>,
    actions: BTreeMap<ActionUid, ActionEntry>,
    resolved_common: HashMap<String, Type>,
    resolving: HashSet<String>,
}

fn ns_join(ns: &[String], name: &str) -> String {
    if ns.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", ns.join("::"), name)
    }
}

/// Resolve an unresolved schema tree into the contract the checker consumes.
pub fn resolve(file: &SchemaFile, source: &str) -> RResult<ResolvedSchema> {
    let mut r = Resolver {
        source,
        common_types: HashMap::new(),
        entities: HashMap::new(),
        enums: HashMap::new(),
        actions: BTreeMap::new(),
        resolved_common: HashMap::new(),
        resolving: HashSet::new(),
    };
    r.collect(file)?;
    r.build()
}

impl<'a> Resolver<'a> {
    fn err(&self, kind: ResolveErrorKind, span: Span) -> ResolveError {
        ResolveError::new(kind, span, self.source)
    }

    fn collect(&mut self, file: &SchemaFile) -> RResult<()> {
        for namespace in &file.namespaces {
            for decl in &namespace.decls {
                match decl {
                    Decl::Entity(e) => {
                        for name in &e.names {
                            let qualified = ns_join(&namespace.path, name);
                            self.entities.insert(
                                qualified,
                                EntityEntry {
                                    member_of: e.member_of.clone(),
                                    shape: e.shape.clone(),
                                    tags: e.tags.clone(),
                                    ns: namespace.path.clone(),
                                    span: e.span,
                                },
                            );
                        }
                    }
                    Decl::Enum(e) => {
                        for name in &e.names {
                            let qualified = ns_join(&namespace.path, name);
                            self.enums.insert(qualified, e.values.clone());
                        }
                    }
                    Decl::CommonType(c) => {
                        let qualified = ns_join(&namespace.path, &c.name);
                        self.common_types.insert(
                            qualified,
                            CommonTypeEntry {
                                ty: c.ty.clone(),
                                ns: namespace.path.clone(),
                                span: c.span,
                            },
                        );
                    }
                    Decl::Action(a) => {
                        for name in &a.names {
                            let uid = ActionUid::new(ns_join(&namespace.path, ACTION_TY), name.clone());
                            if self.actions.contains_key(&uid) {
                                return Err(self.err(
                                    ResolveErrorKind::DuplicateAction {
                                        uid: uid.to_string(),
                                    },
                                    a.span,
                                ));
                            }
                            self.actions.insert(
                                uid,
                                ActionEntry {
                                    member_of: a.member_of.clone(),
                                    applies_to: a.applies_to.clone(),
                                    ns: namespace.path.clone(),
                                    span: a.span,
                                },
                            );
                        }
                    }
                }
            }
        }

        for (name, entry) in &self.common_types {
            if self.entities.contains_key(name) || self.enums.contains_key(name) {
                return Err(self.err(
                    ResolveErrorKind::ShadowedName { name: name.clone() },
                    entry.span,
                ));
            }
        }

        Ok(())
    }

    /// Find the qualified name a bare or dotted path refers to among
    /// `candidates`, preferring a namespace-relative match over a bare
    /// top-level one.
    fn lookup<F>(&self, segments: &[String], ns: &[String], present: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        if segments.len() > 1 {
            let absolute = segments.join("::");
            return present(&absolute).then_some(absolute);
        }
        let relative = ns_join(ns, &segments[0]);
        if present(&relative) {
            return Some(relative);
        }
        let bare = segments[0].clone();
        present(&bare).then_some(bare)
    }

    fn resolve_entity_ref(&self, segments: &[String], ns: &[String], span: Span) -> RResult<EntityTypeName> {
        if let Some(name) = self.lookup(segments, ns, |n| {
            self.entities.contains_key(n) || self.enums.contains_key(n)
        }) {
            return Ok(EntityTypeName::new(name));
        }
        Err(self.err(
            ResolveErrorKind::UndefinedType {
                name: segments.join("::"),
            },
            span,
        ))
    }

    fn resolve_type(&mut self, expr: &TypeExpr, ns: &[String]) -> RResult<Type> {
        match expr {
            TypeExpr::Set(inner) => Ok(Type::Set(Box::new(self.resolve_type(inner, ns)?))),
            TypeExpr::Record(record) => Ok(Type::Record(self.resolve_record(record, ns)?)),
            TypeExpr::Path(segments, span) => self.resolve_path_type(segments, ns, *span),
        }
    }

    fn resolve_path_type(&mut self, segments: &[String], ns: &[String], span: Span) -> RResult<Type> {
        let builtin_name: Option<&str> = match segments {
            [name] => Some(name.as_str()),
            [first, name] if first == "__cedar" => Some(name.as_str()),
            _ => None,
        };
        if let Some(name) = builtin_name {
            if PRIMITIVES.contains(&name) {
                return Ok(match name {
                    "Long" => Type::Long,
                    "String" => Type::String,
                    "Bool" => Type::Bool,
                    _ => unreachable!(),
                });
            }
            if EXTENSIONS.contains(&name) {
                return Ok(Type::Extension(name.to_string()));
            }
        }

        if let Some(qualified) = self.lookup(segments, ns, |n| self.common_types.contains_key(n)) {
            return self.resolve_common_type(&qualified, span);
        }
        if let Some(qualified) =
            self.lookup(segments, ns, |n| self.entities.contains_key(n) || self.enums.contains_key(n))
        {
            return Ok(Type::EntityRef(EntityTypeName::new(qualified)));
        }

        Err(self.err(
            ResolveErrorKind::UndefinedType {
                name: segments.join("::"),
            },
            span,
        ))
    }

    fn resolve_common_type(&mut self, qualified: &str, span: Span) -> RResult<Type> {
        if let Some(resolved) = self.resolved_common.get(qualified) {
            return Ok(resolved.clone());
        }
        if self.resolving.contains(qualified) {
            let mut path: Vec<String> = self.resolving.iter().cloned().collect();
            path.sort();
            path.push(qualified.to_string());
            return Err(self.err(
                ResolveErrorKind::CycleInCommonTypes { path },
                span,
            ));
        }
        let entry_ty = self.common_types[qualified].ty.clone();
        let entry_ns = self.common_types[qualified].ns.clone();
        self.resolving.insert(qualified.to_string());
        let resolved = self.resolve_type(&entry_ty, &entry_ns);
        self.resolving.remove(qualified);
        let resolved = resolved?;
        self.resolved_common.insert(qualified.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn resolve_record(&mut self, record: &RecordTypeExpr, ns: &[String]) -> RResult<RecordType> {
        let mut attrs = BTreeMap::new();
        for attr in &record.attrs {
            let ty = self.resolve_type(&attr.ty, ns)?;
            attrs.insert(
                attr.name.clone(),
                AttrType {
                    ty,
                    required: !attr.optional,
                },
            );
        }
        Ok(RecordType { attrs, open: false })
    }

    fn resolve_action_ref(&self, reference: &ActionRef, ns: &[String], span: Span) -> RResult<ActionUid> {
        let uid = match reference {
            ActionRef::Local(name) => ActionUid::new(ns_join(ns, ACTION_TY), name.clone()),
            ActionRef::Qualified(path, id) => ActionUid::new(path.join("::"), id.clone()),
        };
        if self.actions.contains_key(&uid) {
            Ok(uid)
        } else {
            Err(self.err(
                ResolveErrorKind::UndefinedAction {
                    reference: uid.to_string(),
                },
                span,
            ))
        }
    }

    fn build(mut self) -> RResult<ResolvedSchema> {
        let mut schema = ResolvedSchema::default();

        let entity_names: Vec<String> = self.entities.keys().cloned().collect();
        for name in entity_names {
            let entry_ns = self.entities[&name].ns.clone();
            let entry_span = self.entities[&name].span;
            let member_of = self.entities[&name].member_of.clone();
            let shape = self.entities[&name].shape.clone();
            let tags = self.entities[&name].tags.clone();

            let mut parents = Vec::new();
            for m in &member_of {
                if let TypeExpr::Path(segments, span) = m {
                    parents.push(self.resolve_entity_ref(segments, &entry_ns, *span)?);
                } else {
                    return Err(self.err(
                        ResolveErrorKind::UndefinedType {
                            name: "<non-path member-of entry>".to_string(),
                        },
                        entry_span,
                    ));
                }
            }

            let shape = match &shape {
                Some(r) => self.resolve_record(r, &entry_ns)?,
                None => RecordType::empty(),
            };
            let tags = match &tags {
                Some(t) => Some(self.resolve_type(t, &entry_ns)?),
                None => None,
            };

            schema.entity_types.insert(
                EntityTypeName::new(name),
                EntityTypeDecl {
                    parents,
                    shape,
                    tags,
                },
            );
        }

        for (name, values) in &self.enums {
            schema
                .enum_types
                .insert(EntityTypeName::new(name.clone()), values.clone());
        }

        let action_uids: Vec<ActionUid> = self.actions.keys().cloned().collect();
        for uid in action_uids {
            let entry_ns = self.actions[&uid].ns.clone();
            let entry_span = self.actions[&uid].span;
            let member_of = self.actions[&uid].member_of.clone();
            let applies_to = self.actions[&uid].applies_to.clone();

            let mut parents = BTreeSet::new();
            for m in &member_of {
                parents.insert(self.resolve_action_ref(m, &entry_ns, entry_span)?);
            }

            let applies_to = match &applies_to {
                Some(a) => {
                    let mut principals = BTreeSet::new();
                    if let Some(types) = &a.principal_types {
                        for segs in types {
                            principals
                                .insert(self.resolve_entity_ref(segs, &entry_ns, entry_span)?);
                        }
                    }
                    let mut resources = BTreeSet::new();
                    if let Some(types) = &a.resource_types {
                        for segs in types {
                            resources
                                .insert(self.resolve_entity_ref(segs, &entry_ns, entry_span)?);
                        }
                    }
                    let context = match &a.context {
                        Some(r) => self.resolve_record(r, &entry_ns)?,
                        None => RecordType::empty(),
                    };
                    Some(AppliesTo {
                        principals,
                        resources,
                        context,
                    })
                }
                None => None,
            };

            schema.actions.insert(
                uid,
                ResolvedActionDecl {
                    parents,
                    applies_to,
                },
            );
        }

        Ok(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn resolve_source(src: &str) -> RResult<ResolvedSchema> {
        let file = parse(src).unwrap();
        resolve(&file, src)
    }

    #[test]
    fn inlines_common_type_alias() {
        let schema = resolve_source(
            r#"
            type Name = String;
            entity User { name: Name };
            "#,
        )
        .unwrap();
        let decl = &schema.entity_types[&EntityTypeName::new("User")];
        assert_eq!(decl.shape.attrs["name"].ty, Type::String);
    }

    #[test]
    fn detects_cycle_in_common_types() {
        let err = resolve_source(
            r#"
            type A = B;
            type B = A;
            entity User { x: A };
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::CycleInCommonTypes { .. }));
    }

    #[test]
    fn undefined_type_reference_is_rejected() {
        let err = resolve_source("entity User { x: Nope };").unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::UndefinedType { .. }));
    }

    #[test]
    fn namespace_relative_reference_resolves_before_bare_name() {
        let schema = resolve_source(
            r#"
            entity Widget;
            namespace App {
              entity Widget;
              entity Holder { w: Widget };
            }
            "#,
        )
        .unwrap();
        let decl = &schema.entity_types[&EntityTypeName::new("App::Holder")];
        assert_eq!(
            decl.shape.attrs["w"].ty,
            Type::EntityRef(EntityTypeName::new("App::Widget"))
        );
    }

    #[test]
    fn duplicate_action_uid_is_rejected() {
        let err = resolve_source(r#"action "view"; action "view";"#).unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::DuplicateAction { .. }));
    }

    #[test]
    fn action_applies_to_resolves_principal_and_resource_types() {
        let schema = resolve_source(
            r#"
            entity User;
            entity Doc;
            action view appliesTo { principal: [User], resource: [Doc] };
            "#,
        )
        .unwrap();
        let uid = ActionUid::new("Action", "view");
        let decl = &schema.actions[&uid];
        let applies_to = decl.applies_to.as_ref().unwrap();
        assert!(applies_to.principals.contains(&EntityTypeName::new("User")));
        assert!(applies_to.resources.contains(&EntityTypeName::new("Doc")));
    }

    #[test]
    fn undefined_type_error_display() {
        let err = resolve_source("entity User { x: Nope };").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"undefined type `Nope` at 1:18");
    }

    #[test]
    fn shadowed_common_type_name_is_rejected() {
        let err = resolve_source(
            r#"
            entity Foo;
            type Foo = String;
            "#,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ResolveErrorKind::ShadowedName { .. }));
    }
}
