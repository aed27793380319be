//! Macro replacement, conditional evaluation, and `!include` expansion.
//!
//! Dialect D only. Grounded on `DscParser.__ProcessDirective` and
//! `__GetIfListCurrentItem` in the original parser's directive-stack
//! handling: `!if`/`!ifdef`/`!ifndef` push a frame, `!elseif`/`!else`
//! mutate the frame in place (never push), and `!endif` pops it. A
//! record's visibility is the conjunction of every enclosing frame's
//! `arm_active` flag — this is `directive_eval_stack` from spec's Design
//! Notes, just folded into the frame instead of a parallel stack.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use metafw_diagnostics::{codes, Diagnostic};
use metafw_spec_tables::{Dialect, IntDatumType, PcdCategory};

use crate::error::{ParseError, ParseResult};
use crate::expr::{DefaultExpressionBridge, ExprOutcome, ExprValue, ExpressionBridge};
use crate::factory::ParserFactory;
use crate::macros::{MacroEnvironment, MacroMap, SectionMacroKey};
use crate::model::{Record, RecordModel, ScopeTriple, HEADER_SECTION_NAME};
use crate::pcd::{PcdValueAnalyzer, PcdValidation};
use crate::raw_parser::RawParser;
use crate::store::RecordStore;
use crate::text::split_value_list;

/// Owns the per-invocation mutable state threaded through parsing: the
/// parser-factory cache, the macro layers visible across every file in
/// this run, and workspace path configuration.
///
/// Created once per CLI/library invocation and dropped at the end — not a
/// process-wide `static` (spec's Design Note "Mutable shared dictionaries").
#[derive(Debug, Default)]
pub struct BuildContext {
    /// `WORKSPACE` — searched (after the including file's own directory)
    /// when resolving an `!include` target.
    pub workspace: Option<PathBuf>,
    /// `PACKAGES_PATH` entries, searched in order after `workspace`.
    pub packages_path: Vec<PathBuf>,
    /// Whether path comparisons should ignore case (`gCaseInsensitive`).
    pub case_insensitive: bool,
    /// Macros visible to every file parsed through this context; grown by
    /// `EDK_GLOBAL`/global-define records encountered during post-processing.
    pub global_macros: MacroMap,
    /// Macros supplied once at startup (e.g. command-line `-D` defines).
    pub command_line_macros: MacroMap,
    factory: ParserFactory,
}

impl BuildContext {
    /// An empty context with no workspace, packages path, or macros set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `WORKSPACE`, `PACKAGES_PATH`, and `METAFW_CASE_INSENSITIVE`
    /// from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let workspace = std::env::var_os("WORKSPACE").map(PathBuf::from);
        let packages_path = std::env::var_os("PACKAGES_PATH")
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();
        let case_insensitive = std::env::var("METAFW_CASE_INSENSITIVE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            workspace,
            packages_path,
            case_insensitive,
            global_macros: MacroMap::new(),
            command_line_macros: MacroMap::new(),
            factory: ParserFactory::new(),
        }
    }

    /// Mutable access to the shared parser-factory cache, so a top-level
    /// caller can allocate the first file index before parsing.
    pub fn factory_mut(&mut self) -> &mut ParserFactory {
        &mut self.factory
    }

    /// Resolve an `!include` target named relative to `including_file`:
    /// tried first beside `including_file`, then under `workspace`, then
    /// each `packages_path` entry in order. Returns the first candidate
    /// that exists as a file.
    #[must_use]
    pub fn resolve_include(&self, including_file: &Path, target: &str) -> Option<PathBuf> {
        let beside = including_file.parent().map(|dir| dir.join(target));
        let under_workspace = self.workspace.as_ref().map(|ws| ws.join(target));
        let under_packages = self.packages_path.iter().map(|p| p.join(target));

        beside
            .into_iter()
            .chain(under_workspace)
            .chain(under_packages)
            .find(|candidate| candidate.is_file())
    }
}

/// One level of the `!if`/`!ifdef`/`!ifndef` ... `!elseif` ... `!else` ...
/// `!endif` conditional stack.
struct Frame {
    /// Whether the scope enclosing this block was itself active when the
    /// block opened.
    parent_enabled: bool,
    /// Whether some arm of this if/elseif/else chain has already matched;
    /// once true, later `!elseif`/`!else` arms cannot activate.
    taken: bool,
    /// Whether the current arm is active: records seen while this frame
    /// (and every enclosing one) is active are kept enabled.
    arm_active: bool,
    /// Whether `!else` has already been seen at this level.
    saw_else: bool,
}

fn all_active(stack: &[Frame]) -> bool {
    stack.iter().all(|f| f.arm_active)
}

/// Insert or update `name` in the `MacroMap` keyed by `key`, appending a new
/// entry if no map for that section/scope pair exists yet.
fn upsert_section_macro(
    section_macros: &mut Vec<(SectionMacroKey, MacroMap)>,
    key: SectionMacroKey,
    name: String,
    value: String,
) {
    if let Some((_, map)) = section_macros.iter_mut().find(|(k, _)| *k == key) {
        map.insert(name, value);
    } else {
        let mut map = MacroMap::new();
        map.insert(name, value);
        section_macros.push((key, map));
    }
}

/// Resolves a raw dialect-D [`RecordStore`] into its final, macro-expanded,
/// conditional-pruned, `!include`-spliced form.
///
/// Never mutates the raw store it is given: running [`PostProcessor::run`]
/// twice over the same raw table and [`BuildContext`] state produces
/// byte-identical resolved output (spec's round-trip/idempotence property).
pub struct PostProcessor {
    bridge: Box<dyn ExpressionBridge>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(DefaultExpressionBridge)
    }
}

impl PostProcessor {
    /// A post-processor driven by `bridge` for `!if`/`!elseif` conditions
    /// and FEATURE_FLAG/FIXED_AT_BUILD PCD value expressions.
    pub fn new(bridge: impl ExpressionBridge + 'static) -> Self {
        Self {
            bridge: Box::new(bridge),
        }
    }

    /// Resolve `raw` (parsed from `file_path` under file index
    /// `file_index`) into a fresh, resolved [`RecordStore`] sharing the
    /// same id block as `raw`.
    pub fn run(
        &self,
        raw: &RecordStore,
        file_index: i64,
        file_path: &Path,
        ctx: &mut BuildContext,
    ) -> ParseResult<(RecordStore, Vec<Diagnostic>)> {
        let mut resolved = RecordStore::new(file_index);
        let mut diagnostics = Vec::new();
        let mut env = MacroEnvironment {
            global: ctx.global_macros.clone(),
            command_line: ctx.command_line_macros.clone(),
            file_local: MacroMap::new(),
            section_macros: Vec::new(),
            symbols: MacroMap::new(),
        };
        let mut stack: Vec<Frame> = Vec::new();
        let mut id_mapping: HashMap<i64, i64> = HashMap::new();

        for record in raw.get_all() {
            if record.is_sentinel() {
                continue;
            }
            let triple = ScopeTriple {
                arch: record.scope1.clone(),
                module_type: record.scope2.clone(),
                default_store: record.scope3.clone(),
            };
            let section_type = section_type_for(&record.model);

            match &record.model {
                RecordModel::ConditionalIf
                | RecordModel::ConditionalIfdef
                | RecordModel::ConditionalIfndef => {
                    self.open_block(record, &triple, &mut env, &mut stack, &mut diagnostics, file_path)?;
                }
                RecordModel::ConditionalElseif => {
                    self.elseif_block(record, &triple, &mut env, &mut stack, &mut diagnostics, file_path)?;
                }
                RecordModel::ConditionalElse => {
                    else_block(record, &mut stack, &mut diagnostics, file_path);
                }
                RecordModel::ConditionalEndif => {
                    if stack.pop().is_none() {
                        diagnostics.push(unbalanced(file_path, record.start_line, "!endif"));
                    }
                }
                RecordModel::Error => {
                    if all_active(&stack) {
                        return Err(ParseError::ErrorStatement {
                            file: file_path.to_path_buf(),
                            line: record.start_line,
                            message: record.value1.clone(),
                        });
                    }
                }
                RecordModel::Include => {
                    if all_active(&stack) {
                        self.splice_include(record, file_path, &mut env, ctx, &mut resolved)?;
                    }
                }
                RecordModel::Define => {
                    if all_active(&stack) {
                        let value =
                            env.substitute(&record.value2, &record.value3, std::slice::from_ref(&triple));
                        if record.value3 == HEADER_SECTION_NAME {
                            env.file_local.insert(record.value1.clone(), value);
                        } else {
                            let key = SectionMacroKey {
                                section_type: record.value3.clone(),
                                triples: vec![triple.clone()],
                            };
                            upsert_section_macro(&mut env.section_macros, key, record.value1.clone(), value);
                        }
                    }
                }
                RecordModel::GlobalDefine => {
                    if all_active(&stack) {
                        let value = env.substitute(&record.value2, section_type, std::slice::from_ref(&triple));
                        env.global.insert(record.value1.clone(), value);
                    }
                }
                _ => {
                    let enabled = all_active(&stack);
                    self.emit_resolved(
                        record,
                        &triple,
                        section_type,
                        enabled,
                        &mut env,
                        &mut diagnostics,
                        file_path,
                        &mut resolved,
                        &mut id_mapping,
                    );
                }
            }
        }

        if !stack.is_empty() {
            let last_line = raw.get_all().last().map_or(0, |r| r.end_line);
            diagnostics.push(unbalanced(file_path, last_line, "unterminated conditional block"));
        }

        disable_superseded_components(&mut resolved);
        resolved.set_end_flag();
        ctx.global_macros = env.global;
        Ok((resolved, diagnostics))
    }

    fn open_block(
        &self,
        record: &Record,
        triple: &ScopeTriple,
        env: &mut MacroEnvironment,
        stack: &mut Vec<Frame>,
        diagnostics: &mut Vec<Diagnostic>,
        file_path: &Path,
    ) -> ParseResult<()> {
        let parent_enabled = all_active(stack);
        let arm_true = if parent_enabled {
            self.evaluate_open(record, triple, env, diagnostics, file_path)?
        } else {
            false
        };
        stack.push(Frame {
            parent_enabled,
            taken: arm_true,
            arm_active: parent_enabled && arm_true,
            saw_else: false,
        });
        Ok(())
    }

    fn evaluate_open(
        &self,
        record: &Record,
        triple: &ScopeTriple,
        env: &MacroEnvironment,
        diagnostics: &mut Vec<Diagnostic>,
        file_path: &Path,
    ) -> ParseResult<bool> {
        match record.model {
            RecordModel::ConditionalIf => {
                self.evaluate_expr(&record.value1, triple, env, diagnostics, file_path, record.start_line)
            }
            RecordModel::ConditionalIfdef => {
                let name = bare_macro_name(&record.value1);
                Ok(env.is_defined(name, "Defines", std::slice::from_ref(triple)))
            }
            RecordModel::ConditionalIfndef => {
                let name = bare_macro_name(&record.value1);
                Ok(!env.is_defined(name, "Defines", std::slice::from_ref(triple)))
            }
            _ => unreachable!("open_block only called for !if/!ifdef/!ifndef"),
        }
    }

    fn evaluate_expr(
        &self,
        expr: &str,
        triple: &ScopeTriple,
        env: &MacroEnvironment,
        diagnostics: &mut Vec<Diagnostic>,
        file_path: &Path,
        line: u32,
    ) -> ParseResult<bool> {
        match self.bridge.eval(expr, env, "Defines", std::slice::from_ref(triple)) {
            ExprOutcome::Value(v) | ExprOutcome::Warning(v, _) => Ok(v.truthy()),
            ExprOutcome::SymbolMissing(name) => {
                diagnostics.push(
                    Diagnostic::info(
                        codes::EXPRESSION_SYMBOL_MISSING,
                        format!(
                            "{}:{line}: symbol '{name}' not found, branch treated as false",
                            file_path.display()
                        ),
                        None,
                    )
                    .with_context(BTreeMap::from([
                        ("file".to_string(), file_path.display().to_string()),
                        ("line".to_string(), line.to_string()),
                        ("symbol".to_string(), name),
                    ])),
                );
                Ok(false)
            }
            ExprOutcome::Hard(msg) => Err(ParseError::FormatInvalid {
                file: file_path.to_path_buf(),
                line,
                extra: msg,
            }),
        }
    }

    fn elseif_block(
        &self,
        record: &Record,
        triple: &ScopeTriple,
        env: &mut MacroEnvironment,
        stack: &mut [Frame],
        diagnostics: &mut Vec<Diagnostic>,
        file_path: &Path,
    ) -> ParseResult<()> {
        let Some(frame) = stack.last_mut() else {
            diagnostics.push(unbalanced(file_path, record.start_line, "!elseif"));
            return Ok(());
        };
        if frame.saw_else {
            diagnostics.push(unbalanced(file_path, record.start_line, "!elseif"));
            frame.arm_active = false;
            return Ok(());
        }
        if frame.taken || !frame.parent_enabled {
            frame.arm_active = false;
            return Ok(());
        }
        let cond = self.evaluate_expr(&record.value1, triple, env, diagnostics, file_path, record.start_line)?;
        let frame = stack.last_mut().expect("checked above");
        frame.arm_active = cond;
        frame.taken = frame.taken || cond;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_resolved(
        &self,
        record: &Record,
        triple: &ScopeTriple,
        section_type: &str,
        enabled: bool,
        env: &mut MacroEnvironment,
        diagnostics: &mut Vec<Diagnostic>,
        file_path: &Path,
        resolved: &mut RecordStore,
        id_mapping: &mut HashMap<i64, i64>,
    ) {
        let active = std::slice::from_ref(triple);
        let value1 = env.substitute(&record.value1, section_type, active);
        let value2 = env.substitute(&record.value2, section_type, active);

        let category = match &record.model {
            RecordModel::Pcd(c) => Some(*c),
            _ => None,
        };

        let value3 = match category {
            Some(c @ (PcdCategory::FeatureFlag | PcdCategory::FixedAtBuild)) => {
                let _ = c;
                match self.bridge.eval(&record.value3, env, section_type, active) {
                    ExprOutcome::Value(v) | ExprOutcome::Warning(v, _) => {
                        PcdValueAnalyzer.normalize_boolean(&expr_text(&v))
                    }
                    ExprOutcome::SymbolMissing(_) | ExprOutcome::Hard(_) => {
                        env.substitute(&record.value3, section_type, active)
                    }
                }
            }
            _ => PcdValueAnalyzer.normalize_boolean(&env.substitute(&record.value3, section_type, active)),
        };

        if let Some(category) = category {
            if enabled {
                validate_pcd(category, &value1, &value2, &value3, file_path, record.start_line, diagnostics);
            }
            if matches!(category, PcdCategory::FeatureFlag | PcdCategory::FixedAtBuild) {
                env.symbols.insert(format!("{value1}.{value2}"), value3.clone());
            }
        }

        let belongs_to = if record.belongs_to_item < 0 {
            -1
        } else {
            *id_mapping.get(&record.belongs_to_item).unwrap_or(&-1)
        };

        let new_record = Record {
            id: 0,
            model: record.model.clone(),
            value1,
            value2,
            value3,
            scope1: triple.arch.clone(),
            scope2: triple.module_type.clone(),
            scope3: triple.default_store.clone(),
            belongs_to_item: belongs_to,
            from_item: record.from_item,
            start_line: record.start_line,
            end_line: record.end_line,
            enabled,
        };
        let new_id = resolved.insert(new_record);
        id_mapping.insert(record.id, new_id);
    }

    /// Macro-expand, resolve, parse, and splice an `!include` target.
    /// Its records are appended with `from_item` set to the including
    /// `!include` record's raw id (the record itself never survives into
    /// the resolved store, so that raw id is its only remaining trace).
    fn splice_include(
        &self,
        record: &Record,
        file_path: &Path,
        env: &mut MacroEnvironment,
        ctx: &mut BuildContext,
        resolved: &mut RecordStore,
    ) -> ParseResult<()> {
        let common = ScopeTriple::common();
        let target = env.substitute(&record.value1, "Defines", std::slice::from_ref(&common));

        let resolved_path = ctx
            .resolve_include(file_path, &target)
            .ok_or_else(|| ParseError::FileNotFound(PathBuf::from(target.clone())))?;
        let canonical = resolved_path
            .canonicalize()
            .unwrap_or_else(|_| resolved_path.clone());

        if let Some(cached) = ctx.factory_mut().get(&canonical) {
            splice_records(&cached, record.id, resolved);
            return Ok(());
        }

        ctx.factory_mut().begin(&canonical)?;
        let bytes = std::fs::read(&canonical).map_err(|source| ParseError::FileReadFailure {
            file: canonical.clone(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| ParseError::Encoding(canonical.clone()))?;

        let child_index = ctx.factory_mut().next_file_index();
        let global = ctx.global_macros.clone();
        let command_line = ctx.command_line_macros.clone();
        let (child_raw, _raw_diags) =
            RawParser::new(Dialect::D, &global, &command_line).parse(&text, child_index)?;
        let (child_resolved, _post_diags) = self.run(&child_raw, child_index, &canonical, ctx)?;
        env.global = ctx.global_macros.clone();

        let child_arc = ctx.factory_mut().finish(&canonical, child_resolved);
        splice_records(&child_arc, record.id, resolved);
        Ok(())
    }
}

fn else_block(record: &Record, stack: &mut [Frame], diagnostics: &mut Vec<Diagnostic>, file_path: &Path) {
    let Some(frame) = stack.last_mut() else {
        diagnostics.push(unbalanced(file_path, record.start_line, "!else"));
        return;
    };
    if frame.saw_else {
        diagnostics.push(unbalanced(file_path, record.start_line, "!else"));
        frame.arm_active = false;
        return;
    }
    frame.saw_else = true;
    frame.arm_active = frame.parent_enabled && !frame.taken;
    frame.taken = true;
}

fn splice_records(source: &RecordStore, include_raw_id: i64, resolved: &mut RecordStore) {
    let mut local_map: HashMap<i64, i64> = HashMap::new();
    for record in source.get_all() {
        if record.is_sentinel() {
            continue;
        }
        let belongs_to = if record.belongs_to_item < 0 {
            -1
        } else {
            *local_map.get(&record.belongs_to_item).unwrap_or(&-1)
        };
        let mut cloned = record.clone();
        cloned.belongs_to_item = belongs_to;
        cloned.from_item = include_raw_id;
        let new_id = resolved.insert(cloned);
        local_map.insert(record.id, new_id);
    }
}

/// Disable every `Component` record superseded by a later declaration of
/// the same INF path under the same scope triple, keeping only the last
/// (Supplement: `DscParser.DisableOverrideComponent`).
fn disable_superseded_components(resolved: &mut RecordStore) {
    let mut latest: HashMap<(String, String, String, String), i64> = HashMap::new();
    let mut to_disable = Vec::new();
    for record in resolved.get_all() {
        if record.model != RecordModel::Component || !record.enabled {
            continue;
        }
        let key = (
            record.value1.clone(),
            record.scope1.clone(),
            record.scope2.clone(),
            record.scope3.clone(),
        );
        if let Some(&previous) = latest.get(&key) {
            to_disable.push(previous);
        }
        latest.insert(key, record.id);
    }
    for id in to_disable {
        resolved.disable_component(id);
    }
}

fn validate_pcd(
    category: PcdCategory,
    token_space: &str,
    pcd_name: &str,
    value: &str,
    file_path: &Path,
    line: u32,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let PcdValidation::FieldCountInvalid { found, allowed } = PcdValueAnalyzer.classify(category, value) {
        diagnostics.push(
            Diagnostic::error(
                codes::PCD_FIELD_COUNT_INVALID,
                format!(
                    "{}:{line}: {token_space}.{pcd_name}: {category} expects {}..={} fields, got {found}",
                    file_path.display(),
                    allowed.0,
                    allowed.1
                ),
                None,
            )
            .with_context(BTreeMap::from([
                ("file".to_string(), file_path.display().to_string()),
                ("line".to_string(), line.to_string()),
                ("token_space".to_string(), token_space.to_string()),
                ("pcd_name".to_string(), pcd_name.to_string()),
                ("category".to_string(), category.to_string()),
                ("field_count".to_string(), found.to_string()),
            ])),
        );
        return;
    }

    let fields = split_value_list(value, '|', None);
    let Some(candidate_type) = fields.get(1).map(|s| s.trim()) else {
        return;
    };
    if !is_known_datum_type(candidate_type) {
        return;
    }
    if let PcdValidation::DatumTypeMismatch { datum_type, value: bad } =
        PcdValueAnalyzer.validate_datum(candidate_type, fields[0].trim())
    {
        diagnostics.push(
            Diagnostic::error(
                codes::PCD_DATUM_TYPE_MISMATCH,
                format!(
                    "{}:{line}: {token_space}.{pcd_name}: value '{bad}' is not valid for datum type {datum_type}",
                    file_path.display()
                ),
                None,
            )
            .with_context(BTreeMap::from([
                ("file".to_string(), file_path.display().to_string()),
                ("line".to_string(), line.to_string()),
                ("token_space".to_string(), token_space.to_string()),
                ("pcd_name".to_string(), pcd_name.to_string()),
                ("datum_type".to_string(), datum_type),
                ("value".to_string(), bad),
            ])),
        );
    }
}

fn is_known_datum_type(name: &str) -> bool {
    name == "VOID*" || name == "BOOLEAN" || IntDatumType::from_name(name).is_some()
}

fn section_type_for(model: &RecordModel) -> &'static str {
    match model {
        RecordModel::Header => "Defines",
        RecordModel::SkuId => "SkuIds",
        RecordModel::DefaultStore => "DefaultStores",
        RecordModel::LibraryClass | RecordModel::LibraryInstance => "LibraryClasses",
        RecordModel::Pcd(category) => category.section_keyword(),
        RecordModel::BuildOption => "BuildOptions",
        RecordModel::Component => "Components",
        RecordModel::Guid => "Guids",
        RecordModel::Ppi => "Ppis",
        RecordModel::Protocol => "Protocols",
        RecordModel::Source => "Sources",
        RecordModel::Path => "Packages",
        _ => "Defines",
    }
}

fn bare_macro_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("$(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed)
}

fn expr_text(value: &ExprValue) -> String {
    match value {
        ExprValue::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        ExprValue::Int(i) => i.to_string(),
        ExprValue::Str(s) => s.clone(),
    }
}

fn unbalanced(file_path: &Path, line: u32, directive: &str) -> Diagnostic {
    Diagnostic::error(
        codes::DIRECTIVE_UNBALANCED,
        format!("{}:{line}: unbalanced {directive}", file_path.display()),
        None,
    )
    .with_context(BTreeMap::from([
        ("file".to_string(), file_path.display().to_string()),
        ("line".to_string(), line.to_string()),
        ("directive".to_string(), directive.to_string()),
    ]))
}
