//! The line-oriented lexical pass: source text in, unresolved [`Record`]s
//! (plus directive records, for dialect D) out.
//!
//! Grounded on the original parser's `MetaFileParser.__ParseBody`/
//! `__GetValidExpression`-adjacent line loop, restructured per spec's
//! Design Notes as a closed [`SectionKind`] enum matched exhaustively
//! rather than a dispatch-table of section handlers.

use metafw_diagnostics::{codes, Diagnostic};
use metafw_spec_tables::{is_reserved_version_key, Dialect, PcdCategory};

use crate::error::{ParseError, ParseResult};
use crate::macros::MacroMap;
use crate::model::{Record, RecordModel, ScopeTriple, COMMON, DEFAULT_STORE, HEADER_SECTION_NAME};
use crate::store::RecordStore;
use crate::text::{split_value_list, strip_comment, BlockCommentState};

/// A section kind recognized by the raw parser. `Unknown` preserves the
/// original header text so the post-processor (or the caller) can still
/// emit a diagnostic naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    /// `[Defines]`.
    Defines,
    /// `[SkuIds]`.
    SkuIds,
    /// `[DefaultStores]`.
    DefaultStores,
    /// `[LibraryClasses]` (class declaration in I/P, instance binding in D).
    LibraryClasses,
    /// `[PcdsXxx]`, tagged with its category.
    Pcds(PcdCategory),
    /// `[BuildOptions]`.
    BuildOptions,
    /// `[Components]` (D dialect only).
    Components,
    /// `[Sources]` (I dialect).
    Sources,
    /// `[Packages]` (I dialect) / `[Includes]` (P dialect): bare paths.
    Path,
    /// `[Guids]`/`[Ppis]`/`[Protocols]` (P declares, I references).
    GuidPpiProtocol(RecordModel),
    /// Anything else; the header text is preserved for diagnostics.
    Unknown(String),
}

impl SectionKind {
    fn from_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if let Some(category) = PcdCategory::from_section_keyword(name) {
            return Self::Pcds(category);
        }
        match upper.as_str() {
            "DEFINES" => Self::Defines,
            "SKUIDS" => Self::SkuIds,
            "DEFAULTSTORES" => Self::DefaultStores,
            "LIBRARYCLASSES" => Self::LibraryClasses,
            "BUILDOPTIONS" => Self::BuildOptions,
            "COMPONENTS" => Self::Components,
            "SOURCES" => Self::Sources,
            "PACKAGES" | "INCLUDES" => Self::Path,
            "GUIDS" => Self::GuidPpiProtocol(RecordModel::Guid),
            "PPIS" => Self::GuidPpiProtocol(RecordModel::Ppi),
            "PROTOCOLS" => Self::GuidPpiProtocol(RecordModel::Protocol),
            _ => Self::Unknown(name.to_string()),
        }
    }

    /// The canonical section-type name used as a [`crate::macros::SectionMacroKey`]
    /// discriminant — the same string `postprocessor::section_type_for` derives
    /// from a resolved record's model, so a `DEFINE` tagged here and a regular
    /// record emitted from the same section agree on what scope it belongs to.
    fn canonical_name(&self) -> String {
        match self {
            Self::Defines => "Defines".to_string(),
            Self::SkuIds => "SkuIds".to_string(),
            Self::DefaultStores => "DefaultStores".to_string(),
            Self::LibraryClasses => "LibraryClasses".to_string(),
            Self::Pcds(category) => category.section_keyword().to_string(),
            Self::BuildOptions => "BuildOptions".to_string(),
            Self::Components => "Components".to_string(),
            Self::Sources => "Sources".to_string(),
            Self::Path => "Packages".to_string(),
            Self::GuidPpiProtocol(RecordModel::Guid) => "Guids".to_string(),
            Self::GuidPpiProtocol(RecordModel::Ppi) => "Ppis".to_string(),
            Self::GuidPpiProtocol(RecordModel::Protocol) => "Protocols".to_string(),
            Self::GuidPpiProtocol(_) => "Unknown".to_string(),
            Self::Unknown(name) => name.clone(),
        }
    }
}

enum LineState {
    Header,
    InSection(SectionKind, String),
    /// Inside a `{ ... }` component block. The first field is the section
    /// context currently in effect for lines here — the enclosing
    /// `[Components]` kind until a `<Xxx>` override line switches it; the
    /// second is that section's name; the third is the owning component's
    /// record id.
    InSubsection(SectionKind, String, i64),
}

/// Line-oriented lexical parser. Produces a raw [`RecordStore`] plus any
/// non-fatal diagnostics collected while scanning.
pub struct RawParser<'a> {
    dialect: Dialect,
    global: &'a MacroMap,
    command_line: &'a MacroMap,
}

impl<'a> RawParser<'a> {
    /// A parser for `dialect`, with `global`/`command_line` macros available
    /// for immediate substitution in non-D dialects (D defers all macro
    /// substitution to the post-processor).
    #[must_use]
    pub fn new(dialect: Dialect, global: &'a MacroMap, command_line: &'a MacroMap) -> Self {
        Self {
            dialect,
            global,
            command_line,
        }
    }

    /// Parse `text` into a fresh [`RecordStore`] for file index `file_index`.
    pub fn parse(
        &self,
        text: &str,
        file_index: i64,
    ) -> ParseResult<(RecordStore, Vec<Diagnostic>)> {
        let folded = fold_code_values(text);
        let mut store = RecordStore::new(file_index);
        let mut diagnostics = Vec::new();

        let mut state = LineState::Header;
        let mut active_triples: Vec<ScopeTriple> = vec![ScopeTriple::common()];
        let mut file_local = MacroMap::new();
        let mut block_comment = BlockCommentState::new();
        let mut pending_comments: Vec<(String, u32)> = Vec::new();
        let mut seen_any_section = false;

        for (idx, raw_line) in folded.iter().enumerate() {
            let line_no = (idx + 1) as u32;
            let (data, comment) = strip_comment(raw_line, &mut block_comment);
            if let Some(comment_text) = comment {
                pending_comments.push((comment_text, line_no));
            }
            let trimmed = data.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let LineState::InSubsection(kind, name, parent) = &state {
                if trimmed == "}" {
                    state = LineState::InSection(kind.clone(), name.clone());
                    continue;
                }
                if let Some(inner) = trimmed.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                    let override_kind = SectionKind::from_name(inner);
                    let parent = *parent;
                    state = LineState::InSubsection(override_kind, name.clone(), parent);
                    continue;
                }
                self.emit_section_line(
                    &mut store,
                    kind,
                    trimmed,
                    &active_triples,
                    Some(*parent),
                    line_no,
                    &mut file_local,
                    &mut diagnostics,
                )?;
                let owner = store.get_all().last().cloned();
                attach_comments(&mut store, owner.as_ref(), self.dialect, &mut pending_comments);
                continue;
            }

            if trimmed.starts_with('[') {
                let header = parse_section_header(trimmed, line_no)?;
                active_triples = header.triples;
                let kind = SectionKind::from_name(&header.name);
                if matches!(kind, SectionKind::Unknown(_)) {
                    diagnostics.push(Diagnostic::warn(
                        codes::UNRECOGNIZED_SECTION,
                        format!("line {line_no}: unrecognized section [{}]", header.name),
                        None,
                    ));
                }
                flush_header_comments(
                    &mut store,
                    &mut pending_comments,
                    &mut seen_any_section,
                    line_no,
                );
                state = LineState::InSection(kind, header.name);
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('!') {
                self.emit_directive(&mut store, rest, line_no, file_index)?;
                let owner = store.get_all().last().cloned();
                attach_comments(&mut store, owner.as_ref(), self.dialect, &mut pending_comments);
                continue;
            }

            match &state {
                LineState::Header => {
                    self.emit_defines_line(
                        &mut store,
                        trimmed,
                        &active_triples,
                        line_no,
                        &mut file_local,
                        &mut diagnostics,
                    )?;
                    let owner = store.get_all().last().cloned();
                    attach_comments(&mut store, owner.as_ref(), self.dialect, &mut pending_comments);
                }
                LineState::InSection(kind, name) => {
                    if matches!(kind, SectionKind::Components)
                        && trimmed.ends_with('{')
                        && self.dialect == Dialect::D
                    {
                        let path = trimmed.trim_end_matches('{').trim();
                        let id = store.insert(new_record(
                            RecordModel::Component,
                            path,
                            "",
                            "",
                            &active_triples[0],
                            -1,
                            -1,
                            line_no,
                            line_no,
                        ));
                        for triple in &active_triples[1..] {
                            store.insert(new_record(
                                RecordModel::Component,
                                path,
                                "",
                                "",
                                triple,
                                -1,
                                -1,
                                line_no,
                                line_no,
                            ));
                        }
                        let owner = store.get_all().iter().find(|r| r.id == id).cloned();
                        attach_comments(&mut store, owner.as_ref(), self.dialect, &mut pending_comments);
                        state = LineState::InSubsection(kind.clone(), name.clone(), id);
                        continue;
                    }

                    self.emit_section_line(
                        &mut store,
                        kind,
                        trimmed,
                        &active_triples,
                        None,
                        line_no,
                        &mut file_local,
                        &mut diagnostics,
                    )?;
                    let owner = store.get_all().last().cloned();
                    attach_comments(&mut store, owner.as_ref(), self.dialect, &mut pending_comments);
                }
                LineState::InSubsection(..) => unreachable!("handled above"),
            }
        }

        for (text, line) in pending_comments.drain(..) {
            store.insert(new_record(
                RecordModel::TailComment,
                &text,
                "",
                "",
                &ScopeTriple::common(),
                -1,
                -1,
                line,
                line,
            ));
        }

        store.set_end_flag();
        Ok((store, diagnostics))
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_defines_line(
        &self,
        store: &mut RecordStore,
        line: &str,
        triples: &[ScopeTriple],
        line_no: u32,
        file_local: &mut MacroMap,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ParseResult<()> {
        if let Some((name, value)) = split_assignment(line, "DEFINE") {
            file_local.insert(name.to_string(), self.substitute_immediate(&value, file_local));
            for triple in triples {
                store.insert(new_record(
                    RecordModel::Define,
                    name,
                    &value,
                    HEADER_SECTION_NAME,
                    triple,
                    -1,
                    -1,
                    line_no,
                    line_no,
                ));
            }
            return Ok(());
        }
        if let Some((name, value)) = split_assignment(line, "EDK_GLOBAL") {
            file_local.insert(name.to_string(), self.substitute_immediate(&value, file_local));
            for triple in triples {
                store.insert(new_record(
                    RecordModel::GlobalDefine,
                    name,
                    &value,
                    HEADER_SECTION_NAME,
                    triple,
                    -1,
                    -1,
                    line_no,
                    line_no,
                ));
            }
            return Ok(());
        }
        match split_equals(line) {
            Some((name, value)) => {
                let resolved = self.substitute_immediate(&value, file_local);
                check_reserved_version_key(name, &resolved, line_no, diagnostics);
                for triple in triples {
                    store.insert(new_record(
                        RecordModel::Header,
                        name,
                        &resolved,
                        "",
                        triple,
                        -1,
                        -1,
                        line_no,
                        line_no,
                    ));
                }
                Ok(())
            }
            None => {
                diagnostics.push(Diagnostic::warn(
                    codes::DUBIOUS_CONTENT,
                    format!("line {line_no}: dubious content: {line}"),
                    None,
                ));
                store.insert(new_record(
                    RecordModel::Unknown,
                    line,
                    "",
                    "",
                    &ScopeTriple::common(),
                    -1,
                    -1,
                    line_no,
                    line_no,
                ));
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_section_line(
        &self,
        store: &mut RecordStore,
        kind: &SectionKind,
        line: &str,
        triples: &[ScopeTriple],
        belongs_to: Option<i64>,
        line_no: u32,
        file_local: &mut MacroMap,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ParseResult<()> {
        if let Some((name, value)) = split_assignment(line, "DEFINE") {
            let resolved = self.substitute_immediate(&value, file_local);
            file_local.insert(name.to_string(), resolved);
            let section_name = kind.canonical_name();
            for triple in triples {
                store.insert(new_record(
                    RecordModel::Define,
                    name,
                    &value,
                    &section_name,
                    triple,
                    belongs_to.unwrap_or(-1),
                    -1,
                    line_no,
                    line_no,
                ));
            }
            return Ok(());
        }
        if let Some((name, value)) = split_assignment(line, "EDK_GLOBAL") {
            let resolved = self.substitute_immediate(&value, file_local);
            file_local.insert(name.to_string(), resolved);
            let section_name = kind.canonical_name();
            for triple in triples {
                store.insert(new_record(
                    RecordModel::GlobalDefine,
                    name,
                    &value,
                    &section_name,
                    triple,
                    belongs_to.unwrap_or(-1),
                    -1,
                    line_no,
                    line_no,
                ));
            }
            return Ok(());
        }

        let (model, v1, v2, v3) = match kind {
            SectionKind::SkuIds | SectionKind::DefaultStores => {
                let fields = split_value_list(line, '|', None);
                if fields.len() < 2 || fields.len() > 3 {
                    diagnostics.push(Diagnostic::warn(
                        codes::DUBIOUS_CONTENT,
                        format!("line {line_no}: expected 2 or 3 fields, found {}", fields.len()),
                        None,
                    ));
                    (RecordModel::Unknown, line.to_string(), String::new(), String::new())
                } else {
                    let model = if *kind == SectionKind::SkuIds {
                        RecordModel::SkuId
                    } else {
                        RecordModel::DefaultStore
                    };
                    (
                        model,
                        fields[0].clone(),
                        fields[1].clone(),
                        fields.get(2).cloned().unwrap_or_default(),
                    )
                }
            }
            SectionKind::BuildOptions => {
                match split_equals(line) {
                    Some((key, value)) => {
                        let flag_part = key.rsplit_once(':').map_or(key, |(_, f)| f);
                        if flag_part.matches('_').count() != 4 {
                            diagnostics.push(Diagnostic::warn(
                                codes::DUBIOUS_CONTENT,
                                format!(
                                    "line {line_no}: build option key '{key}' does not have exactly 4 underscores"
                                ),
                                None,
                            ));
                        }
                        (RecordModel::BuildOption, key.to_string(), value, String::new())
                    }
                    None => (RecordModel::Unknown, line.to_string(), String::new(), String::new()),
                }
            }
            SectionKind::Pcds(category) => {
                if let Some((lhs, value)) = line.split_once('|') {
                    let (token_space, pcd_name) = lhs
                        .split_once('.')
                        .unwrap_or(("", lhs));
                    let resolved_value = if self.dialect == Dialect::D {
                        value.to_string()
                    } else {
                        self.substitute_immediate(value, file_local)
                    };
                    (
                        RecordModel::Pcd(*category),
                        token_space.trim().to_string(),
                        pcd_name.trim().to_string(),
                        resolved_value.trim().to_string(),
                    )
                } else {
                    diagnostics.push(Diagnostic::warn(
                        codes::DUBIOUS_CONTENT,
                        format!("line {line_no}: PCD entry missing '|value': {line}"),
                        None,
                    ));
                    (RecordModel::Unknown, line.to_string(), String::new(), String::new())
                }
            }
            SectionKind::LibraryClasses => {
                let fields = split_value_list(line, '|', Some(1));
                let class_name = fields[0].clone();
                let instance_path = fields.get(1).cloned().unwrap_or_default();
                let resolved = if self.dialect == Dialect::D {
                    instance_path
                } else {
                    self.substitute_immediate(&instance_path, file_local)
                };
                let model = if resolved.is_empty() {
                    RecordModel::LibraryClass
                } else {
                    RecordModel::LibraryInstance
                };
                (model, class_name, resolved, String::new())
            }
            SectionKind::Sources => {
                let resolved = self.substitute_immediate(line, file_local);
                (RecordModel::Source, resolved, String::new(), String::new())
            }
            SectionKind::Path => {
                let resolved = if self.dialect == Dialect::D {
                    line.to_string()
                } else {
                    self.substitute_immediate(line, file_local)
                };
                (RecordModel::Path, resolved, String::new(), String::new())
            }
            SectionKind::GuidPpiProtocol(model) => match line.split_once('=') {
                Some((name, structure)) => (
                    model.clone(),
                    name.trim().to_string(),
                    structure.trim().to_string(),
                    String::new(),
                ),
                None => (RecordModel::Path, line.to_string(), String::new(), String::new()),
            },
            SectionKind::Components => (RecordModel::Component, line.to_string(), String::new(), String::new()),
            SectionKind::Defines => {
                match split_equals(line) {
                    Some((name, value)) => {
                        let resolved = self.substitute_immediate(&value, file_local);
                        check_reserved_version_key(name, &resolved, line_no, diagnostics);
                        (RecordModel::Header, name.to_string(), resolved, String::new())
                    }
                    None => (RecordModel::Unknown, line.to_string(), String::new(), String::new()),
                }
            }
            SectionKind::Unknown(_) => {
                (RecordModel::Unknown, line.to_string(), String::new(), String::new())
            }
        };

        for triple in triples {
            let id = store.insert(new_record(
                model.clone(),
                &v1,
                &v2,
                &v3,
                triple,
                belongs_to.unwrap_or(-1),
                -1,
                line_no,
                line_no,
            ));
            let _ = id;
        }
        Ok(())
    }

    fn emit_directive(
        &self,
        store: &mut RecordStore,
        rest: &str,
        line_no: u32,
        _file_index: i64,
    ) -> ParseResult<()> {
        let (keyword, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let keyword = format!("!{}", keyword.trim());
        let args = args.trim().to_string();

        let model = match keyword.as_str() {
            "!if" => RecordModel::ConditionalIf,
            "!ifdef" => RecordModel::ConditionalIfdef,
            "!ifndef" => RecordModel::ConditionalIfndef,
            "!elseif" => RecordModel::ConditionalElseif,
            "!else" => RecordModel::ConditionalElse,
            "!endif" => RecordModel::ConditionalEndif,
            "!include" => RecordModel::Include,
            "!error" => RecordModel::Error,
            other => {
                return Err(ParseError::FormatInvalid {
                    file: std::path::PathBuf::new(),
                    line: line_no,
                    extra: format!("unrecognized directive {other}"),
                })
            }
        };

        store.insert(new_record(
            model,
            &args,
            "",
            "",
            &ScopeTriple::common(),
            -1,
            -1,
            line_no,
            line_no,
        ));
        Ok(())
    }

    fn substitute_immediate(&self, value: &str, file_local: &MacroMap) -> String {
        let mut out = String::with_capacity(value.len());
        let chars: Vec<char> = value.chars().collect();
        let len = chars.len();
        let mut i = 0usize;
        while i < len {
            if chars[i] == '$' && i + 1 < len && chars[i + 1] == '(' {
                if let Some(close_rel) = chars[i + 2..].iter().position(|&c| c == ')') {
                    let close = i + 2 + close_rel;
                    let name: String = chars[i + 2..close].iter().collect();
                    let resolved = file_local
                        .get(&name)
                        .or_else(|| self.command_line.get(&name))
                        .or_else(|| self.global.get(&name));
                    if let Some(v) = resolved {
                        out.push_str(v);
                    } else {
                        out.extend(&chars[i..=close]);
                    }
                    i = close + 1;
                    continue;
                }
            }
            out.push(chars[i]);
            i += 1;
        }
        out
    }
}

#[allow(clippy::too_many_arguments)]
fn new_record(
    model: RecordModel,
    v1: &str,
    v2: &str,
    v3: &str,
    triple: &ScopeTriple,
    belongs_to_item: i64,
    from_item: i64,
    start_line: u32,
    end_line: u32,
) -> Record {
    Record {
        id: 0,
        model,
        value1: v1.to_string(),
        value2: v2.to_string(),
        value3: v3.to_string(),
        scope1: triple.arch.clone(),
        scope2: triple.module_type.clone(),
        scope3: triple.default_store.clone(),
        belongs_to_item,
        from_item,
        start_line,
        end_line,
        enabled: true,
    }
}

/// Attach buffered comments to `owner`. In the P dialect, a comment that
/// reads `@ValidRange`/`@ValidList`/`@Expression` and is attached to a PCD
/// declaration is tagged `RecordModel::ValidExpression` and carries the
/// owning PCD's `(token_space, pcd_name)` in `value2`/`value3`, mirroring
/// how `GetValidExpression` recovers that pairing from the line directly
/// preceding a PCD entry.
fn attach_comments(
    store: &mut RecordStore,
    owner: Option<&Record>,
    dialect: Dialect,
    pending: &mut Vec<(String, u32)>,
) {
    let Some(owner) = owner else {
        return;
    };
    let owner_id = owner.id;
    let pcd_identity = if dialect == Dialect::P {
        match &owner.model {
            RecordModel::Pcd(_) => Some((owner.value1.clone(), owner.value2.clone())),
            _ => None,
        }
    } else {
        None
    };
    for (text, line) in pending.drain(..) {
        match &pcd_identity {
            Some((token_space, pcd_name)) if is_valid_expression_comment(&text) => {
                store.insert(new_record(
                    RecordModel::ValidExpression,
                    &text,
                    token_space,
                    pcd_name,
                    &ScopeTriple::common(),
                    owner_id,
                    -1,
                    line,
                    line,
                ));
            }
            _ => {
                store.insert(new_record(
                    RecordModel::Comment,
                    &text,
                    "",
                    "",
                    &ScopeTriple::common(),
                    owner_id,
                    -1,
                    line,
                    line,
                ));
            }
        }
    }
}

/// Whether a comment's text (with the leading `#` stripped) opens with one
/// of the three validation-constraint tags EDK2 recognizes on a PCD line.
fn is_valid_expression_comment(text: &str) -> bool {
    let trimmed = text.trim_start_matches('#').trim_start();
    trimmed.starts_with("@ValidRange")
        || trimmed.starts_with("@ValidList")
        || trimmed.starts_with("@Expression")
}

fn flush_header_comments(
    store: &mut RecordStore,
    pending: &mut Vec<(String, u32)>,
    seen_any_section: &mut bool,
    _line_no: u32,
) {
    if !*seen_any_section {
        for (text, line) in pending.drain(..) {
            store.insert(new_record(
                RecordModel::HeaderComment,
                &text,
                "",
                "",
                &ScopeTriple::common(),
                -1,
                -1,
                line,
                line,
            ));
        }
    }
    *seen_any_section = true;
}

struct SectionHeader {
    name: String,
    triples: Vec<ScopeTriple>,
}

fn parse_section_header(line: &str, line_no: u32) -> ParseResult<SectionHeader> {
    let inner = line
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| ParseError::FormatInvalid {
            file: std::path::PathBuf::new(),
            line: line_no,
            extra: format!("malformed section header: {line}"),
        })?;

    let mut name = String::new();
    let mut triples = Vec::new();
    for (i, segment) in inner.split(',').enumerate() {
        let parts: Vec<&str> = segment.trim().split('.').collect();
        if parts.is_empty() || parts[0].is_empty() {
            return Err(ParseError::FormatInvalid {
                file: std::path::PathBuf::new(),
                line: line_no,
                extra: format!("malformed section header: {line}"),
            });
        }
        if i == 0 {
            name = parts[0].to_string();
        }
        let arch = parts.get(1).map_or(COMMON, |s| if s.is_empty() { COMMON } else { s });
        let module_type = parts
            .get(2)
            .map_or(COMMON, |s| if s.is_empty() { COMMON } else { s });
        let default_store = parts
            .get(3)
            .map_or(COMMON, |s| if s.is_empty() { COMMON } else { s });
        triples.push(ScopeTriple {
            arch: arch.to_ascii_uppercase(),
            module_type: module_type.to_ascii_uppercase(),
            default_store: default_store.to_ascii_uppercase(),
        });
    }
    if triples.is_empty() {
        triples.push(ScopeTriple::common());
    }
    let _ = DEFAULT_STORE;
    Ok(SectionHeader { name, triples })
}

/// Warn when a reserved `[Defines]` key (`INF_VERSION`, `DSC_SPECIFICATION`,
/// `EDK_RELEASE_VERSION`, `PI_SPECIFICATION_VERSION`) holds a value that is
/// not a hex (`0x`-prefixed) or plain decimal version number.
fn check_reserved_version_key(name: &str, value: &str, line_no: u32, diagnostics: &mut Vec<Diagnostic>) {
    if !is_reserved_version_key(name) || looks_like_version_number(value) {
        return;
    }
    diagnostics.push(Diagnostic::warn(
        codes::RESERVED_VERSION_KEY_INVALID,
        format!("line {line_no}: {name}: '{value}' is not a valid hex or decimal version number"),
        None,
    ));
}

/// Accepts the two grammars the original parser allows for reserved version
/// keys: a hex literal (`0xMMMMmmmm`) or a decimal/dotted form (`20180529`,
/// `1.30`).
fn looks_like_version_number(value: &str) -> bool {
    let v = value.trim();
    if let Some(hex) = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    if let Some((major, minor)) = v.split_once('.') {
        return !major.is_empty()
            && !minor.is_empty()
            && major.chars().all(|c| c.is_ascii_digit())
            && minor.chars().all(|c| c.is_ascii_digit());
    }
    !v.is_empty() && v.chars().all(|c| c.is_ascii_digit())
}

fn split_equals(line: &str) -> Option<(&str, String)> {
    let (name, value) = line.split_once('=')?;
    Some((name.trim(), value.trim().to_string()))
}

fn split_assignment<'a>(line: &'a str, keyword: &str) -> Option<(&'a str, String)> {
    let rest = line.strip_prefix(keyword)?;
    let rest = rest.strip_prefix(char::is_whitespace)?;
    split_equals(rest.trim_start())
}

/// Fold any line containing an unterminated `{CODE(` through to the line
/// containing its matching `)}` into one synthetic logical line, padding
/// with blank lines so later source line numbers are unaffected.
fn fold_code_values(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i];
        if line.contains("{CODE(") && !line_closes_code(line) {
            let mut folded = line.to_string();
            let mut j = i + 1;
            while j < lines.len() && !line_closes_code(lines[j]) {
                folded.push(' ');
                folded.push_str(lines[j].trim());
                j += 1;
            }
            if j < lines.len() {
                folded.push(' ');
                folded.push_str(lines[j].trim());
            }
            out.push(folded);
            for _ in i..j {
                out.push(String::new());
            }
            i = j + 1;
            continue;
        }
        out.push(line.to_string());
        i += 1;
    }
    out
}

fn line_closes_code(line: &str) -> bool {
    line.contains(")}")
}
