//! Hand-written recursive-descent parser for Cedar schema text.

use cedar_tokenizer::{line_col_at, unescape_quoted, Lexer, Span, Token, TokenKind};
use tracing::trace;

use crate::ast::*;
use crate::error::{DuplicateKind, ParseError, ParseErrorKind, ReservedNameKind, RESERVED_NAMES};
use crate::Annotations;

pub struct Parser<'src> {
    source: &'src str,
    lexer: Lexer<'src>,
    pending: Option<Token<'src>>,
    seen_namespaces: Vec<String>,
    seen_entities: Vec<String>,
    seen_actions: Vec<String>,
    seen_common_types: Vec<String>,
}

type PResult<T> = Result<T, ParseError>;

/// Parse a complete schema document.
pub fn parse(source: &str) -> PResult<SchemaFile> {
    Parser::new(source).parse_file()
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            lexer: Lexer::new(source),
            pending: None,
            seen_namespaces: Vec::new(),
            seen_entities: Vec::new(),
            seen_actions: Vec::new(),
            seen_common_types: Vec::new(),
        }
    }

    fn peek(&mut self) -> Token<'src> {
        if self.pending.is_none() {
            self.pending = Some(self.lexer.next_token());
        }
        self.pending.unwrap()
    }

    fn bump(&mut self) -> Token<'src> {
        if let Some(tok) = self.pending.take() {
            return tok;
        }
        self.lexer.next_token()
    }

    fn error(&self, kind: ParseErrorKind, span: Span) -> ParseError {
        let lc = line_col_at(self.source, span.start);
        ParseError::new(kind, span, lc.line, lc.column)
    }

    fn unexpected(&mut self, expected: &str) -> ParseError {
        let tok = self.peek();
        if tok.kind == TokenKind::Eof {
            self.error(
                ParseErrorKind::UnexpectedEof {
                    expected: expected.to_string(),
                },
                tok.span,
            )
        } else {
            self.error(
                ParseErrorKind::UnexpectedToken {
                    expected: expected.to_string(),
                    found: format!("`{}`", tok.text),
                },
                tok.span,
            )
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, what: &str) -> PResult<Token<'src>> {
        if self.peek().kind == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    /// Expect an `Ident` token with exact text `text` (a contextual
    /// keyword).
    fn expect_keyword(&mut self, text: &str) -> PResult<Token<'src>> {
        let tok = self.peek();
        if tok.kind == TokenKind::Ident && tok.text == text {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("`{text}`")))
        }
    }

    fn at_keyword(&mut self, text: &str) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Ident && tok.text == text
    }

    fn expect_ident(&mut self, what: &str) -> PResult<Token<'src>> {
        self.expect_kind(TokenKind::Ident, what)
    }

    fn expect_string(&mut self, what: &str) -> PResult<String> {
        let tok = self.expect_kind(TokenKind::String, what)?;
        unescape_quoted(tok.text).ok_or_else(|| {
            self.error(
                ParseErrorKind::UnexpectedToken {
                    expected: "a well-formed string literal".into(),
                    found: format!("`{}`", tok.text),
                },
                tok.span,
            )
        })
    }

    fn check_reserved(&self, name: &str, span: Span, kind: ReservedNameKind) -> PResult<()> {
        if RESERVED_NAMES.contains(&name) {
            Err(self.error(ParseErrorKind::ReservedName { name: name.to_string(), kind }, span))
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    fn parse_file(&mut self) -> PResult<SchemaFile> {
        let mut namespaces = Vec::new();
        let mut top_decls = Vec::new();
        let top_start = self.peek().span.start;

        while self.peek().kind != TokenKind::Eof {
            if self.at_keyword("namespace") {
                namespaces.push(self.parse_namespace()?);
            } else {
                top_decls.push(self.parse_decl()?);
            }
        }

        if !top_decls.is_empty() {
            let end = self.peek().span.start;
            namespaces.insert(
                0,
                Namespace {
                    path: Vec::new(),
                    decls: top_decls,
                    span: Span::new(top_start, end),
                },
            );
        }

        Ok(SchemaFile { namespaces })
    }

    fn parse_namespace(&mut self) -> PResult<Namespace> {
        let start = self.bump().span; // `namespace`
        let mut path = vec![self.expect_ident("a namespace path segment")?.text.to_string()];
        while self.peek().kind == TokenKind::ColonColon {
            self.bump();
            path.push(self.expect_ident("a namespace path segment")?.text.to_string());
        }
        let name = path.join("::");
        if self.seen_namespaces.iter().any(|n| n == &name) {
            return Err(self.error(
                ParseErrorKind::Duplicate {
                    kind: DuplicateKind::Namespace,
                    name,
                },
                start,
            ));
        }
        self.seen_namespaces.push(name);

        self.expect_kind(TokenKind::LBrace, "`{`")?;

        // Duplicate entity/action/common-type detection is scoped per
        // namespace body; stash the outer scope's bookkeeping while we
        // parse this one.
        let outer_entities = std::mem::take(&mut self.seen_entities);
        let outer_actions = std::mem::take(&mut self.seen_actions);
        let outer_common_types = std::mem::take(&mut self.seen_common_types);

        let mut decls = Vec::new();
        let result = (|| {
            while self.peek().kind != TokenKind::RBrace {
                if self.peek().kind == TokenKind::Eof {
                    return Err(self.unexpected("`}`"));
                }
                decls.push(self.parse_decl()?);
            }
            Ok(())
        })();

        self.seen_entities = outer_entities;
        self.seen_actions = outer_actions;
        self.seen_common_types = outer_common_types;
        result?;

        let close = self.bump().span; // `}`
        Ok(Namespace {
            path,
            decls,
            span: start.extend(close),
        })
    }

    fn parse_annotations(&mut self) -> PResult<Annotations> {
        let mut annotations = Annotations::new();
        while self.peek().kind == TokenKind::At {
            self.bump();
            let name = self.expect_ident("an annotation name")?.text.to_string();
            let value = if self.peek().kind == TokenKind::LParen {
                self.bump();
                let v = self.expect_string("an annotation value")?;
                self.expect_kind(TokenKind::RParen, "`)`")?;
                v
            } else {
                String::new()
            };
            annotations.insert(name, value);
        }
        Ok(annotations)
    }

    fn parse_decl(&mut self) -> PResult<Decl> {
        let annotations = self.parse_annotations()?;
        if self.at_keyword("entity") {
            self.parse_entity_or_enum(annotations)
        } else if self.at_keyword("action") {
            Ok(Decl::Action(self.parse_action(annotations)?))
        } else if self.at_keyword("type") {
            Ok(Decl::CommonType(self.parse_common_type(annotations)?))
        } else {
            Err(self.unexpected("`entity`, `action`, or `type`"))
        }
    }

    // ------------------------------------------------------------------
    // Identifier lists with the lenient trailing-comma-before-keyword rule
    // ------------------------------------------------------------------

    fn is_list_stopper(&mut self) -> bool {
        let tok = self.peek();
        matches!(
            tok.kind,
            TokenKind::LBrace | TokenKind::Equals | TokenKind::Semicolon
        ) || (tok.kind == TokenKind::Ident
            && matches!(tok.text, "in" | "enum" | "tags" | "appliesTo"))
    }

    fn parse_ident_list(&mut self, what: &str) -> PResult<Vec<String>> {
        let mut names = vec![self.expect_ident(what)?.text.to_string()];
        while self.peek().kind == TokenKind::Comma {
            self.bump();
            if self.is_list_stopper() {
                trace!("ident list terminated by trailing comma before keyword");
                break;
            }
            names.push(self.expect_ident(what)?.text.to_string());
        }
        Ok(names)
    }

    fn parse_action_name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.parse_action_name()?];
        while self.peek().kind == TokenKind::Comma {
            self.bump();
            if self.is_list_stopper() {
                break;
            }
            names.push(self.parse_action_name()?);
        }
        Ok(names)
    }

    fn parse_action_name(&mut self) -> PResult<String> {
        if self.peek().kind == TokenKind::String {
            self.expect_string("an action name")
        } else {
            Ok(self.expect_ident("an action name")?.text.to_string())
        }
    }

    // ------------------------------------------------------------------
    // entity / enum
    // ------------------------------------------------------------------

    fn parse_entity_or_enum(&mut self, annotations: Annotations) -> PResult<Decl> {
        let start = self.bump().span; // `entity`
        let names = self.parse_ident_list("an entity type name")?;
        for name in &names {
            self.check_reserved(name, start, ReservedNameKind::EntityType)?;
        }

        if self.at_keyword("enum") {
            self.bump();
            let mut values = vec![self.expect_string("a string literal")?];
            while self.peek().kind == TokenKind::Comma {
                self.bump();
                if self.peek().kind != TokenKind::String {
                    break;
                }
                values.push(self.expect_string("a string literal")?);
            }
            let end = self.expect_kind(TokenKind::Semicolon, "`;`")?.span;
            for name in &names {
                self.record_entity_name(name, start)?;
            }
            return Ok(Decl::Enum(EnumDecl {
                names,
                values,
                annotations,
                span: start.extend(end),
            }));
        }

        let member_of = if self.at_keyword("in") {
            self.bump();
            self.parse_type_ref_or_bracketed_list()?
        } else {
            Vec::new()
        };

        let shape = if self.peek().kind == TokenKind::Equals {
            self.bump();
            Some(self.parse_record_type()?)
        } else {
            None
        };

        let tags = if self.at_keyword("tags") {
            self.bump();
            Some(self.parse_type()?)
        } else {
            None
        };

        let end = self.expect_kind(TokenKind::Semicolon, "`;`")?.span;
        for name in &names {
            self.record_entity_name(name, start)?;
        }

        Ok(Decl::Entity(EntityDecl {
            names,
            member_of,
            shape,
            tags,
            annotations,
            span: start.extend(end),
        }))
    }

    fn record_entity_name(&mut self, name: &str, span: Span) -> PResult<()> {
        if self.seen_entities.iter().any(|n| n == name) {
            return Err(self.error(
                ParseErrorKind::Duplicate {
                    kind: DuplicateKind::EntityType,
                    name: name.to_string(),
                },
                span,
            ));
        }
        self.seen_entities.push(name.to_string());
        Ok(())
    }

    // ------------------------------------------------------------------
    // action
    // ------------------------------------------------------------------

    fn parse_action(&mut self, annotations: Annotations) -> PResult<ActionDecl> {
        let start = self.bump().span; // `action`
        let names = self.parse_action_name_list()?;

        let member_of = if self.at_keyword("in") {
            self.bump();
            self.parse_action_ref_or_bracketed_list()?
        } else {
            Vec::new()
        };

        let applies_to = if self.at_keyword("appliesTo") {
            self.bump();
            Some(self.parse_applies_to()?)
        } else {
            None
        };

        let end = self.expect_kind(TokenKind::Semicolon, "`;`")?.span;
        for name in &names {
            if self.seen_actions.iter().any(|n| n == name) {
                return Err(self.error(
                    ParseErrorKind::Duplicate {
                        kind: DuplicateKind::Action,
                        name: name.clone(),
                    },
                    start,
                ));
            }
            self.seen_actions.push(name.clone());
        }

        Ok(ActionDecl {
            names,
            member_of,
            applies_to,
            annotations,
            span: start.extend(end),
        })
    }

    fn parse_action_ref(&mut self) -> PResult<ActionRef> {
        if self.peek().kind == TokenKind::String {
            Ok(ActionRef::Local(self.expect_string("an action name")?))
        } else {
            let first = self.expect_ident("an action reference")?.text.to_string();
            let mut path = vec![first];
            while self.peek().kind == TokenKind::ColonColon {
                self.bump();
                if self.peek().kind == TokenKind::String {
                    let id = self.expect_string("an action id")?;
                    return Ok(ActionRef::Qualified(path, id));
                }
                path.push(self.expect_ident("a namespace segment or action id")?.text.to_string());
            }
            let id = path.pop().expect("non-empty path");
            if path.is_empty() {
                Ok(ActionRef::Local(id))
            } else {
                Ok(ActionRef::Qualified(path, id))
            }
        }
    }

    fn parse_action_ref_or_bracketed_list(&mut self) -> PResult<Vec<ActionRef>> {
        if self.peek().kind == TokenKind::LBracket {
            self.bump();
            let mut refs = Vec::new();
            if self.peek().kind != TokenKind::RBracket {
                refs.push(self.parse_action_ref()?);
                while self.peek().kind == TokenKind::Comma {
                    self.bump();
                    if self.peek().kind == TokenKind::RBracket {
                        break;
                    }
                    refs.push(self.parse_action_ref()?);
                }
            }
            self.expect_kind(TokenKind::RBracket, "`]`")?;
            Ok(refs)
        } else {
            Ok(vec![self.parse_action_ref()?])
        }
    }

    fn parse_applies_to(&mut self) -> PResult<AppliesToExpr> {
        self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut out = AppliesToExpr::default();
        while self.peek().kind != TokenKind::RBrace {
            if self.at_keyword("principal") {
                self.bump();
                self.expect_kind(TokenKind::Colon, "`:`")?;
                out.principal_types = Some(self.parse_path_or_bracketed_list()?);
            } else if self.at_keyword("resource") {
                self.bump();
                self.expect_kind(TokenKind::Colon, "`:`")?;
                out.resource_types = Some(self.parse_path_or_bracketed_list()?);
            } else if self.at_keyword("context") {
                self.bump();
                self.expect_kind(TokenKind::Colon, "`:`")?;
                out.context = Some(self.parse_record_type()?);
            } else {
                return Err(self.unexpected("`principal`, `resource`, or `context`"));
            }
            if self.peek().kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok(out)
    }

    fn parse_path(&mut self) -> PResult<(Vec<String>, Span)> {
        let first = self.expect_ident("an identifier")?;
        let mut span = first.span;
        let mut parts = vec![first.text.to_string()];
        while self.peek().kind == TokenKind::ColonColon {
            self.bump();
            let next = self.expect_ident("a path segment")?;
            span = span.extend(next.span);
            parts.push(next.text.to_string());
        }
        Ok((parts, span))
    }

    fn parse_path_or_bracketed_list(&mut self) -> PResult<Vec<Vec<String>>> {
        if self.peek().kind == TokenKind::LBracket {
            self.bump();
            let mut paths = Vec::new();
            if self.peek().kind != TokenKind::RBracket {
                paths.push(self.parse_path()?.0);
                while self.peek().kind == TokenKind::Comma {
                    self.bump();
                    if self.peek().kind == TokenKind::RBracket {
                        break;
                    }
                    paths.push(self.parse_path()?.0);
                }
            }
            self.expect_kind(TokenKind::RBracket, "`]`")?;
            Ok(paths)
        } else {
            Ok(vec![self.parse_path()?.0])
        }
    }

    fn parse_type_ref_or_bracketed_list(&mut self) -> PResult<Vec<TypeExpr>> {
        if self.peek().kind == TokenKind::LBracket {
            self.bump();
            let mut out = Vec::new();
            if self.peek().kind != TokenKind::RBracket {
                let (segs, span) = self.parse_path()?;
                out.push(TypeExpr::Path(segs, span));
                while self.peek().kind == TokenKind::Comma {
                    self.bump();
                    if self.peek().kind == TokenKind::RBracket {
                        break;
                    }
                    let (segs, span) = self.parse_path()?;
                    out.push(TypeExpr::Path(segs, span));
                }
            }
            self.expect_kind(TokenKind::RBracket, "`]`")?;
            Ok(out)
        } else {
            let (segs, span) = self.parse_path()?;
            Ok(vec![TypeExpr::Path(segs, span)])
        }
    }

    // ------------------------------------------------------------------
    // common types
    // ------------------------------------------------------------------

    fn parse_common_type(&mut self, annotations: Annotations) -> PResult<CommonTypeDecl> {
        let start = self.bump().span; // `type`
        let name_tok = self.expect_ident("a common type name")?;
        let name = name_tok.text.to_string();
        self.check_reserved(&name, name_tok.span, ReservedNameKind::CommonType)?;
        self.expect_kind(TokenKind::Equals, "`=`")?;
        let ty = self.parse_type()?;
        let end = self.expect_kind(TokenKind::Semicolon, "`;`")?.span;

        if self.seen_common_types.iter().any(|n| n == &name) {
            return Err(self.error(
                ParseErrorKind::Duplicate {
                    kind: DuplicateKind::CommonType,
                    name,
                },
                start,
            ));
        }
        self.seen_common_types.push(name.clone());

        Ok(CommonTypeDecl {
            name,
            ty,
            annotations,
            span: start.extend(end),
        })
    }

    // ------------------------------------------------------------------
    // types
    // ------------------------------------------------------------------

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        if self.at_keyword("Set") {
            self.bump();
            self.expect_kind(TokenKind::Lt, "`<`")?;
            let inner = self.parse_type()?;
            self.expect_kind(TokenKind::Gt, "`>`")?;
            Ok(TypeExpr::Set(Box::new(inner)))
        } else if self.peek().kind == TokenKind::LBrace {
            Ok(TypeExpr::Record(self.parse_record_type()?))
        } else {
            let (segments, span) = self.parse_path()?;
            Ok(TypeExpr::Path(segments, span))
        }
    }

    fn parse_record_type(&mut self) -> PResult<RecordTypeExpr> {
        self.expect_kind(TokenKind::LBrace, "`{`")?;
        let mut attrs = Vec::new();
        while self.peek().kind != TokenKind::RBrace {
            let annotations = self.parse_annotations()?;
            let name = if self.peek().kind == TokenKind::String {
                self.expect_string("an attribute name")?
            } else {
                self.expect_ident("an attribute name")?.text.to_string()
            };
            let optional = if self.peek().kind == TokenKind::Question {
                self.bump();
                true
            } else {
                false
            };
            self.expect_kind(TokenKind::Colon, "`:`")?;
            let ty = self.parse_type()?;
            attrs.push(AttrDecl {
                name,
                optional,
                ty,
                annotations,
            });
            if self.peek().kind == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_kind(TokenKind::RBrace, "`}`")?;
        Ok(RecordTypeExpr { attrs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_schema() {
        let schema = parse(
            r#"
            namespace App {
              entity User in [Group] { name: String, age?: Long } tags String;
              entity Group;
              action view appliesTo { principal: [User], resource: [User] };
            }
            "#,
        )
        .unwrap();
        assert_eq!(schema.namespaces.len(), 1);
        assert_eq!(schema.namespaces[0].path, vec!["App".to_string()]);
        assert_eq!(schema.namespaces[0].decls.len(), 3);
    }

    #[test]
    fn reserved_entity_name_rejected() {
        let err = parse("entity Long;").unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::ReservedName { ref name, .. } if name == "Long"
        ));
    }

    #[test]
    fn reserved_common_type_name_rejected() {
        let err = parse("type String = Long;").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::ReservedName { .. }));
    }

    #[test]
    fn duplicate_entity_rejected() {
        let err = parse("entity User; entity User;").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::Duplicate { .. }));
    }

    #[test]
    fn lenient_trailing_comma_before_in() {
        let schema = parse("entity A, in [G]; entity G;").unwrap();
        let Decl::Entity(e) = &schema.namespaces[0].decls[0] else {
            panic!("expected entity decl")
        };
        assert_eq!(e.names, vec!["A".to_string()]);
        assert_eq!(e.member_of.len(), 1);
    }

    #[test]
    fn enum_multi_declaration_desugars_to_one_decl_with_shared_values() {
        let schema = parse(r#"entity A, B enum "x", "y";"#).unwrap();
        let Decl::Enum(e) = &schema.namespaces[0].decls[0] else {
            panic!("expected enum decl")
        };
        assert_eq!(e.names, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(e.values, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn annotations_preserve_source_order() {
        let schema = parse(
            r#"
            @doc("a user")
            @since("v1")
            entity User;
            "#,
        )
        .unwrap();
        let Decl::Entity(e) = &schema.namespaces[0].decls[0] else {
            panic!("expected entity decl")
        };
        assert_eq!(e.annotations.keys().collect::<Vec<_>>(), vec!["doc", "since"]);
    }

    #[test]
    fn comments_are_ignored_everywhere() {
        let schema = parse(
            "// leading\nentity /* mid */ User; // trailing\n",
        )
        .unwrap();
        assert_eq!(schema.namespaces[0].decls.len(), 1);
    }
}
