//! metafw CLI — parse, check, and query EDK2-style build-description files
//! (`.dsc`/`.inf`/`.dec`).

mod render;

use std::fs;
use std::io::Read as _;
use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metafw_core::{
    BelongsToFilter, BuildContext, ParseError, PostProcessor, RawParser, Record, RecordModel,
    RecordStore, ScopeTriple,
};
use metafw_diagnostics::{Diagnostic, Severity};
use metafw_spec_tables::{Dialect, PcdCategory};

use crate::render::{Format, print_summary, render_diagnostics};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "metafw",
    version,
    about = "Parser and validator for EDK2-style build-description files (DSC/INF/DEC)"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a file and print its records as JSON. For the platform
    /// dialect (`.dsc`) this is the raw, unresolved record table; module
    /// and package dialects (`.inf`/`.dec`) are already fully resolved by
    /// the single-phase parser.
    Parse {
        /// Build-description file to parse.
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Parse and (for `.dsc`) fully resolve a file, printing diagnostics.
    #[command(name = "check", visible_alias = "syntax-check")]
    Check {
        /// Build-description file to check.
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Check a file, then print resolved records matching the given filters.
    Query {
        /// Build-description file to query.
        #[arg(value_name = "FILE")]
        file: String,
        /// Record model to match (e.g. `HEADER`, `COMPONENT`, `PCD`, or
        /// `PCD:FixedAtBuild` to match one PCD category).
        #[arg(long, value_name = "MODEL")]
        model: Option<String>,
        /// Restrict to records whose arch scope is `COMMON` or this value.
        #[arg(long, value_name = "ARCH")]
        arch: Option<String>,
        /// Restrict to records whose module-type scope is `COMMON` or this value.
        #[arg(long, value_name = "TYPE")]
        module_type: Option<String>,
        /// Restrict to records whose default-store scope is `COMMON` or this value.
        #[arg(long, value_name = "STORE")]
        default_store: Option<String>,
    },

    /// Print the explanation for a diagnostic code (e.g. `MF0013`).
    Explain {
        /// Diagnostic code, e.g. `MF0013`.
        code: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    let run_result = match cli.cmd {
        Cmd::Parse { file } => cmd_parse(&file, format),
        Cmd::Check { file } => cmd_check(&file, format).map(|_| ()),
        Cmd::Query {
            file,
            model,
            arch,
            module_type,
            default_store,
        } => cmd_query(
            &file,
            model.as_deref(),
            arch.as_deref(),
            module_type.as_deref(),
            default_store.as_deref(),
            format,
        ),
        Cmd::Explain { code } => cmd_explain(&code, format),
    };

    if let Err(err) = run_result {
        emit_cli_error(format, &err);
        process::exit(1);
    }
    Ok(())
}

// ── Shared parse/check plumbing ─────────────────────────────────────────

/// The outcome of parsing (and, for dialect D, fully resolving) one file.
struct Parsed {
    dialect: Dialect,
    store: RecordStore,
    diagnostics: Vec<Diagnostic>,
}

fn dialect_for(file: &str) -> Result<Dialect> {
    let ext = Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    Dialect::from_extension(ext).ok_or_else(|| {
        anyhow::anyhow!("'{file}': unrecognized extension '{ext}' (expected .dsc/.inf/.dec)")
    })
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut input = String::new();
        std::io::stdin().read_to_string(&mut input)?;
        Ok(input)
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read '{file}'"))
    }
}

/// Parse `file`; for dialect D, also run the post-processor so the returned
/// records are fully macro-expanded, conditional-pruned, and include-spliced.
fn parse_and_resolve(file: &str) -> Result<Parsed> {
    let dialect = dialect_for(file)?;
    let input = read_input(file)?;
    let mut ctx = BuildContext::from_env();
    let global = ctx.global_macros.clone();
    let command_line = ctx.command_line_macros.clone();
    let raw_parser = RawParser::new(dialect, &global, &command_line);
    let (raw, mut diagnostics) = raw_parser
        .parse(&input, ctx.factory_mut().next_file_index())
        .map_err(parse_error_to_anyhow)?;

    if dialect != Dialect::D {
        return Ok(Parsed {
            dialect,
            store: raw,
            diagnostics,
        });
    }

    let file_index = ctx.factory_mut().next_file_index();
    let (resolved, pp_diagnostics) = PostProcessor::default()
        .run(&raw, file_index, Path::new(file), &mut ctx)
        .map_err(parse_error_to_anyhow)?;
    diagnostics.extend(pp_diagnostics);

    Ok(Parsed {
        dialect,
        store: resolved,
        diagnostics,
    })
}

fn parse_error_to_anyhow(err: ParseError) -> anyhow::Error {
    anyhow::anyhow!("{err}")
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_parse(file: &str, format: Format) -> Result<()> {
    let dialect = dialect_for(file)?;
    let input = read_input(file)?;
    let mut ctx = BuildContext::from_env();
    let global = ctx.global_macros.clone();
    let command_line = ctx.command_line_macros.clone();
    let raw_parser = RawParser::new(dialect, &global, &command_line);
    let (store, diagnostics) = raw_parser
        .parse(&input, ctx.factory_mut().next_file_index())
        .map_err(parse_error_to_anyhow)?;

    let records: Vec<&Record> = store.get_all().iter().filter(|r| !r.is_sentinel()).collect();

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "dialect": dialect.to_string(),
                "resolved": dialect != Dialect::D,
                "records": records,
                "diagnostics": diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            println!("{}", serde_json::to_string_pretty(&records)?);
            if !diagnostics.is_empty() {
                render_diagnostics(&input, file, &diagnostics, format);
                print_summary(&diagnostics);
            }
        }
    }

    exit_on_errors(&diagnostics);
    Ok(())
}

fn cmd_check(file: &str, format: Format) -> Result<Parsed> {
    let input = read_input(file)?;
    let parsed = parse_and_resolve(file)?;
    let ok = !parsed
        .diagnostics
        .iter()
        .any(|d| matches!(d.severity, Severity::Error));

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": ok,
                "dialect": parsed.dialect.to_string(),
                "diagnostics": parsed.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            render_diagnostics(&input, file, &parsed.diagnostics, format);
            print_summary(&parsed.diagnostics);
            if ok {
                eprintln!("syntax ok");
            }
        }
    }

    exit_on_errors(&parsed.diagnostics);
    Ok(parsed)
}

fn cmd_query(
    file: &str,
    model: Option<&str>,
    arch: Option<&str>,
    module_type: Option<&str>,
    default_store: Option<&str>,
    format: Format,
) -> Result<()> {
    let parsed = parse_and_resolve(file)?;

    let model_filter = model.map(parse_model_filter).transpose()?;
    let scope = if arch.is_some() || module_type.is_some() || default_store.is_some() {
        Some(ScopeTriple {
            arch: arch.unwrap_or(metafw_core::COMMON).to_string(),
            module_type: module_type.unwrap_or(metafw_core::COMMON).to_string(),
            default_store: default_store.unwrap_or(metafw_core::COMMON).to_string(),
        })
    } else {
        None
    };

    // `RecordStore::query` needs a concrete `RecordModel` (including, for
    // PCDs, a concrete category); `--model PCD` without a category matches
    // every category, so that case is filtered client-side after an
    // unfiltered-by-model query.
    let exact_model = match &model_filter {
        Some(ModelFilter::Exact(m)) => Some(m.clone()),
        Some(ModelFilter::AnyPcd) | None => None,
    };

    let matches: Vec<&Record> = parsed
        .store
        .query(exact_model.as_ref(), scope.as_ref(), BelongsToFilter::Any, None)
        .into_iter()
        .filter(|r| model_filter.as_ref().is_none_or(|f| f.matches(&r.model)))
        .collect();

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "file": file,
                "count": matches.len(),
                "records": matches,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            println!("{}", serde_json::to_string_pretty(&matches)?);
        }
    }

    Ok(())
}

fn cmd_explain(code: &str, format: Format) -> Result<()> {
    let explanation = metafw_diagnostics::explain(code);

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "code": code,
                "explanation": explanation,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => match explanation {
            Some(text) => println!("{code}: {text}"),
            None => println!("{code}: no explanation available"),
        },
    }

    Ok(())
}

// ── Model filter parsing (for `query --model`) ──────────────────────────

enum ModelFilter {
    Exact(RecordModel),
    AnyPcd,
}

impl ModelFilter {
    fn matches(&self, model: &RecordModel) -> bool {
        match self {
            ModelFilter::Exact(m) => model == m,
            ModelFilter::AnyPcd => matches!(model, RecordModel::Pcd(_)),
        }
    }
}

fn parse_model_filter(raw: &str) -> Result<ModelFilter> {
    if let Some((name, category)) = raw.split_once(':') {
        if !name.eq_ignore_ascii_case("PCD") {
            anyhow::bail!("'{raw}': category suffix is only valid for PCD");
        }
        let cat = parse_pcd_category(category)
            .ok_or_else(|| anyhow::anyhow!("unknown PCD category '{category}'"))?;
        return Ok(ModelFilter::Exact(RecordModel::Pcd(cat)));
    }

    let upper = raw.to_ascii_uppercase();
    let model = match upper.as_str() {
        "HEADER" => RecordModel::Header,
        "SKU_ID" | "SKUID" => RecordModel::SkuId,
        "DEFAULT_STORE" | "DEFAULTSTORE" => RecordModel::DefaultStore,
        "LIBRARY_CLASS" | "LIBRARYCLASS" => RecordModel::LibraryClass,
        "LIBRARY_INSTANCE" | "LIBRARYINSTANCE" => RecordModel::LibraryInstance,
        "PCD" => return Ok(ModelFilter::AnyPcd),
        "BUILD_OPTION" | "BUILDOPTION" => RecordModel::BuildOption,
        "COMPONENT" => RecordModel::Component,
        "GUID" => RecordModel::Guid,
        "PPI" => RecordModel::Ppi,
        "PROTOCOL" => RecordModel::Protocol,
        "SOURCE" => RecordModel::Source,
        "PATH" => RecordModel::Path,
        "INCLUDE" => RecordModel::Include,
        "DEFINE" => RecordModel::Define,
        "GLOBAL_DEFINE" | "GLOBALDEFINE" => RecordModel::GlobalDefine,
        "VALID_EXPRESSION" | "VALIDEXPRESSION" => RecordModel::ValidExpression,
        "COMMENT" => RecordModel::Comment,
        "HEADER_COMMENT" | "HEADERCOMMENT" => RecordModel::HeaderComment,
        "TAIL_COMMENT" | "TAILCOMMENT" => RecordModel::TailComment,
        "UNKNOWN" => RecordModel::Unknown,
        other => anyhow::bail!("unknown record model '{other}'"),
    };
    Ok(ModelFilter::Exact(model))
}

fn parse_pcd_category(name: &str) -> Option<PcdCategory> {
    let lower = name.to_ascii_lowercase();
    PcdCategory::ALL
        .iter()
        .copied()
        .find(|c| c.section_keyword().to_ascii_lowercase() == format!("pcds{lower}"))
}

// ── Output helpers ───────────────────────────────────────────────────────

/// Exit with code 1 if any diagnostic is an error. Warnings and info do not
/// cause a non-zero exit.
fn exit_on_errors(diagnostics: &[Diagnostic]) {
    if diagnostics
        .iter()
        .any(|d| matches!(d.severity, Severity::Error))
    {
        process::exit(1);
    }
}

fn emit_cli_error(format: Format, err: &anyhow::Error) {
    let message = format!("{err:#}");
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "success": false,
                "error": "command_failed",
                "message": message,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&out)
                    .expect("error envelope JSON serialization cannot fail")
            );
        }
        Format::Pretty => {
            eprintln!("error: {message}");
        }
    }
}
