//! Cedar schema/policy/entity/request checker.
//!
//! Subcommands:
//!   cedar check-schema <file>
//!   cedar check-policy <file> --schema <file> [--strict]
//!   cedar check-entities <file> --schema <file>
//!   cedar check-request <file> --schema <file>

mod policy_json;
mod value_json;

use std::io::{self, Read as _};

use cedar_validator::{Mode, ValidationError};
use facet::Facet;
use figue as args;

// ============================================================================
// Exit codes
// ============================================================================

const EXIT_SUCCESS: i32 = 0;
const EXIT_SYNTAX_ERROR: i32 = 1;
const EXIT_VALIDATION_ERROR: i32 = 2;
const EXIT_IO_ERROR: i32 = 3;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI argument structures
// ============================================================================

#[derive(Facet, Debug)]
struct Args {
    #[facet(args::named, args::short = 'V', default)]
    version: bool,

    #[facet(args::subcommand, default)]
    command: Option<Command>,
}

#[derive(Facet, Debug)]
#[repr(u8)]
enum Command {
    /// Parse and resolve a schema file
    CheckSchema {
        /// Schema file (or "-" for stdin)
        #[facet(args::positional)]
        file: String,
    },

    /// Type-check a policy's scopes and conditions against a schema
    CheckPolicy {
        /// Policy file (JSON)
        #[facet(args::positional)]
        file: String,

        /// Schema file to check against
        #[facet(args::named)]
        schema: String,

        /// Reject entity-LUB joins between unrelated types and other
        /// permissive-mode-only relaxations
        #[facet(args::named, default)]
        strict: bool,
    },

    /// Validate an entity store against a schema
    CheckEntities {
        /// Entity store file (JSON)
        #[facet(args::positional)]
        file: String,

        /// Schema file to check against
        #[facet(args::named)]
        schema: String,
    },

    /// Validate a request against a schema
    CheckRequest {
        /// Request file (JSON)
        #[facet(args::positional)]
        file: String,

        /// Schema file to check against
        #[facet(args::named)]
        schema: String,
    },
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();

    if raw_args.is_empty() {
        print_help();
        std::process::exit(EXIT_SUCCESS);
    }

    if raw_args[0] == "--version" || raw_args[0] == "-V" {
        println!("cedar {VERSION}");
        std::process::exit(EXIT_SUCCESS);
    }

    if raw_args[0] == "--help" || raw_args[0] == "-h" {
        print_help();
        std::process::exit(EXIT_SUCCESS);
    }

    let args_strs: Vec<&str> = raw_args.iter().map(|s| s.as_str()).collect();
    let parsed: Args = match figue::from_slice(&args_strs).into_result() {
        Ok(p) => p.value,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(EXIT_SYNTAX_ERROR);
        }
    };

    let result = match parsed.command {
        Some(Command::CheckSchema { file }) => run_check_schema(&file),
        Some(Command::CheckPolicy { file, schema, strict }) => run_check_policy(&file, &schema, strict),
        Some(Command::CheckEntities { file, schema }) => run_check_entities(&file, &schema),
        Some(Command::CheckRequest { file, schema }) => run_check_request(&file, &schema),
        None => {
            print_help();
            Ok(())
        }
    };

    match result {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            match &e {
                CliError::SchemaError { error, source, filename } => {
                    eprint!("{}", error.render(filename, source));
                }
                _ => eprintln!("error: {e}"),
            }
            std::process::exit(e.exit_code());
        }
    }
}

fn print_help() {
    eprintln!("cedar {VERSION} - schema-aware Cedar policy checker\n");
    eprintln!("USAGE:");
    eprintln!("    cedar check-schema <file>");
    eprintln!("    cedar check-policy <file> --schema <file> [--strict]");
    eprintln!("    cedar check-entities <file> --schema <file>");
    eprintln!("    cedar check-request <file> --schema <file>\n");
    eprintln!("Set RUST_LOG to control log verbosity (e.g. RUST_LOG=trace).");
}

// ============================================================================
// Subcommand implementations
// ============================================================================

fn run_check_schema(file: &str) -> Result<(), CliError> {
    let source = read_input(file)?;
    match cedar_validator::parse_schema(&source) {
        Ok(schema) => {
            println!(
                "schema ok: {} entity type(s), {} enum type(s), {} action(s)",
                schema.entity_types.len(),
                schema.enum_types.len(),
                schema.actions.len()
            );
            Ok(())
        }
        Err(ValidationError::Schema(error)) => Err(CliError::SchemaError {
            error,
            source,
            filename: file.to_string(),
        }),
        Err(other) => Err(CliError::Validation(other.to_string())),
    }
}

fn load_schema(file: &str) -> Result<cedar_validator::ResolvedSchema, CliError> {
    let source = read_input(file)?;
    cedar_validator::parse_schema(&source).map_err(|e| match e {
        ValidationError::Schema(error) => CliError::SchemaError {
            error,
            source,
            filename: file.to_string(),
        },
        other => CliError::Validation(other.to_string()),
    })
}

fn read_json(file: &str) -> Result<serde_json::Value, CliError> {
    let text = read_input(file)?;
    serde_json::from_str(&text).map_err(|e| CliError::Parse(format!("{file}: {e}")))
}

fn run_check_policy(file: &str, schema_file: &str, strict: bool) -> Result<(), CliError> {
    let schema = load_schema(schema_file)?;
    let json = read_json(file)?;
    let policy = policy_json::policy_from_json(&json)?;
    let mode = if strict { Mode::Strict } else { Mode::Permissive };

    cedar_validator::validate_policy(&policy, &schema, mode)
        .map_err(|e| CliError::Validation(e.to_string()))?;
    println!("policy ok");
    Ok(())
}

fn run_check_entities(file: &str, schema_file: &str) -> Result<(), CliError> {
    let schema = load_schema(schema_file)?;
    let json = read_json(file)?;
    let entities = value_json::entities_from_json(&json)?;
    let count = entities.len();

    cedar_validator::validate_entities(&entities, &schema)
        .map_err(|e| CliError::Validation(e.to_string()))?;
    println!("{count} entities ok");
    Ok(())
}

fn run_check_request(file: &str, schema_file: &str) -> Result<(), CliError> {
    let schema = load_schema(schema_file)?;
    let json = read_json(file)?;
    let request = value_json::request_from_json(&json)?;

    cedar_validator::validate_request(&request, &schema)
        .map_err(|e| CliError::Validation(e.to_string()))?;
    println!("request ok");
    Ok(())
}

// ============================================================================
// I/O helpers
// ============================================================================

fn read_input(file: &str) -> Result<String, CliError> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(file).map_err(|e| {
            io::Error::new(e.kind(), format!("{file}: {e}"))
        })?)
    }
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug)]
pub(crate) enum CliError {
    Io(io::Error),
    Parse(String),
    SchemaError {
        error: cedar_validator::SchemaError,
        source: String,
        filename: String,
    },
    Validation(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Io(_) => EXIT_IO_ERROR,
            CliError::Parse(_) => EXIT_SYNTAX_ERROR,
            CliError::SchemaError { .. } => EXIT_SYNTAX_ERROR,
            CliError::Validation(_) => EXIT_VALIDATION_ERROR,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "{e}"),
            CliError::Parse(e) => write!(f, "{e}"),
            CliError::SchemaError { error, .. } => write!(f, "{error}"),
            CliError::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
