//! Parser-level diagnostics: syntax errors, reserved names, and duplicate
//! declarations (all detectable without resolving common-type aliases).

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use cedar_tokenizer::Span;

/// Get ariadne config, respecting NO_COLOR env var.
fn ariadne_config() -> Config {
    let no_color = std::env::var("NO_COLOR").is_ok();
    if no_color {
        Config::default().with_color(false)
    } else {
        Config::default()
    }
}

/// The names entity types and common types may not use.
pub const RESERVED_NAMES: &[&str] = &[
    "Bool", "Boolean", "Entity", "Extension", "Long", "Record", "Set", "String",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservedNameKind {
    EntityType,
    CommonType,
}

impl std::fmt::Display for ReservedNameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservedNameKind::EntityType => write!(f, "entity type"),
            ReservedNameKind::CommonType => write!(f, "common type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateKind {
    Namespace,
    EntityType,
    Action,
    CommonType,
}

impl std::fmt::Display for DuplicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateKind::Namespace => write!(f, "namespace"),
            DuplicateKind::EntityType => write!(f, "entity type"),
            DuplicateKind::Action => write!(f, "action"),
            DuplicateKind::CommonType => write!(f, "common type"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedToken { expected: String, found: String },
    UnexpectedEof { expected: String },
    ReservedName { name: String, kind: ReservedNameKind },
    Duplicate { kind: DuplicateKind, name: String },
}

/// A positioned parse error. The parser is fail-fast: the first one aborts
/// the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span, line: u32, column: u32) -> Self {
        Self {
            kind,
            span,
            line,
            column,
        }
    }

    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut out = Vec::new();
        self.write_report(filename, source, &mut out);
        String::from_utf8(out).unwrap_or_else(|_| self.to_string())
    }

    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let report = self.build_report(filename);
        let _ = report
            .with_config(ariadne_config())
            .finish()
            .write((filename, Source::from(source)), writer);
    }

    fn build_report<'a>(
        &self,
        filename: &'a str,
    ) -> ariadne::ReportBuilder<'static, (&'a str, std::ops::Range<usize>)> {
        let range = std::ops::Range::<usize>::from(self.span);
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("expected {expected}, found {found}"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("unexpected token here")
                            .with_color(Color::Red),
                    )
            }
            ParseErrorKind::UnexpectedEof { expected } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("expected {expected}, found end of input"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("input ends here")
                            .with_color(Color::Red),
                    )
            }
            ParseErrorKind::ReservedName { name, kind } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("`{name}` is a reserved name and cannot be used as a {kind} name"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("reserved name used here")
                            .with_color(Color::Red),
                    )
                    .with_help(format!(
                        "rename this {kind}; {} are reserved for built-in types",
                        RESERVED_NAMES.join(", ")
                    ))
            }
            ParseErrorKind::Duplicate { kind, name } => {
                Report::build(ReportKind::Error, (filename, range.clone()))
                    .with_message(format!("duplicate {kind} `{name}`"))
                    .with_label(
                        Label::new((filename, range))
                            .with_message("duplicate declared here")
                            .with_color(Color::Red),
                    )
            }
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            ParseErrorKind::UnexpectedEof { expected } => {
                write!(f, "expected {expected}, found end of input")
            }
            ParseErrorKind::ReservedName { name, kind } => {
                write!(f, "`{name}` is a reserved name and cannot be used as a {kind} name")
            }
            ParseErrorKind::Duplicate { kind, name } => write!(f, "duplicate {kind} `{name}`"),
        }?;
        write!(f, " at {}:{}", self.line, self.column)
    }
}

impl std::error::Error for ParseError {}
