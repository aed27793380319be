//! The layered macro environment and the three-tier section-scope merge.

use std::collections::HashMap;

use crate::model::{ScopeTriple, COMMON};

/// A flat name → value macro table.
pub type MacroMap = HashMap<String, String>;

/// Key for a [`MacroEnvironment`]'s `SectionMacros` index: a section type
/// name plus the set of scope triples the macro was declared under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionMacroKey {
    /// Section-type name the macro was declared in (e.g. `"Defines"`).
    pub section_type: String,
    /// The scope triples the declaring section header carried.
    pub triples: Vec<ScopeTriple>,
}

/// The five-layer macro lookup described in the platform-description grammar.
///
/// Lookup precedence, lowest (widest) to highest (narrowest): `global` <
/// `command_line` < `file_local` < applicable `section_macros` < `symbols`.
#[derive(Debug, Clone, Default)]
pub struct MacroEnvironment {
    /// Process-wide, populated only from the environment.
    pub global: MacroMap,
    /// Process-wide, set once at startup.
    pub command_line: MacroMap,
    /// Per-file, populated by `DEFINE` in the header section.
    pub file_local: MacroMap,
    /// Keyed by `(section-type, triples)`.
    pub section_macros: Vec<(SectionMacroKey, MacroMap)>,
    /// PCD name → literal value, populated during post-processing.
    pub symbols: MacroMap,
}

impl MacroEnvironment {
    /// An environment with all layers empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` against the merged environment applicable to
    /// `section_type` and `active` scope triples.
    #[must_use]
    pub fn resolve(&self, name: &str, section_type: &str, active: &[ScopeTriple]) -> Option<String> {
        if let Some(v) = self.symbols.get(name) {
            return Some(v.clone());
        }
        let merged = ScopeResolver::merge(self, section_type, active);
        if let Some(v) = merged.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.file_local.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.command_line.get(name) {
            return Some(v.clone());
        }
        self.global.get(name).cloned()
    }

    /// Whether `name` is defined in any layer applicable to this scope.
    #[must_use]
    pub fn is_defined(&self, name: &str, section_type: &str, active: &[ScopeTriple]) -> bool {
        self.resolve(name, section_type, active).is_some()
    }

    /// Substitute every `$(NAME)` occurrence in `text` using [`Self::resolve`].
    /// Unresolved references are left verbatim.
    #[must_use]
    pub fn substitute(&self, text: &str, section_type: &str, active: &[ScopeTriple]) -> String {
        let mut out = String::with_capacity(text.len());
        let bytes: Vec<char> = text.chars().collect();
        let len = bytes.len();
        let mut i = 0usize;
        while i < len {
            if bytes[i] == '$' && i + 1 < len && bytes[i + 1] == '(' {
                if let Some(close_rel) = bytes[i + 2..].iter().position(|&c| c == ')') {
                    let close = i + 2 + close_rel;
                    let name: String = bytes[i + 2..close].iter().collect();
                    if let Some(value) = self.resolve(&name, section_type, active) {
                        out.push_str(&value);
                    } else {
                        out.extend(&bytes[i..=close]);
                    }
                    i = close + 1;
                    continue;
                }
            }
            out.push(bytes[i]);
            i += 1;
        }
        out
    }
}

/// Computes the three-tier macro merge for a given section type and active
/// scope-triple set.
pub struct ScopeResolver;

impl ScopeResolver {
    /// Merge the `SectionMacros` entries applicable to `section_type`/`active`,
    /// common-common first, common-specific next, most-specific last —
    /// later layers override earlier ones.
    #[must_use]
    pub fn merge(env: &MacroEnvironment, section_type: &str, active: &[ScopeTriple]) -> MacroMap {
        let mut common_common = MacroMap::new();
        let mut common_specific = MacroMap::new();
        let mut most_specific = MacroMap::new();

        for (key, macros) in &env.section_macros {
            if key.section_type != section_type {
                continue;
            }
            match classify(&key.triples, active) {
                Specificity::MostSpecific => extend(&mut most_specific, macros),
                Specificity::CommonSpecific => extend(&mut common_specific, macros),
                Specificity::CommonCommon => extend(&mut common_common, macros),
                Specificity::NotApplicable => {}
            }
        }

        let mut merged = common_common;
        merged.extend(common_specific);
        merged.extend(most_specific);
        merged
    }
}

fn extend(dst: &mut MacroMap, src: &MacroMap) {
    for (k, v) in src {
        dst.insert(k.clone(), v.clone());
    }
}

enum Specificity {
    MostSpecific,
    CommonSpecific,
    CommonCommon,
    NotApplicable,
}

fn classify(key_triples: &[ScopeTriple], active: &[ScopeTriple]) -> Specificity {
    if active.is_empty() {
        return Specificity::NotApplicable;
    }

    let contains_exact = |t: &ScopeTriple| key_triples.contains(t);

    if active.iter().all(contains_exact) {
        return Specificity::MostSpecific;
    }

    let common_specific_ok = active.iter().all(|t| {
        contains_exact(t)
            || key_triples.iter().any(|k| {
                k.arch == COMMON && k.module_type == t.module_type && k.default_store == COMMON
            })
            || key_triples
                .iter()
                .any(|k| k.arch == t.arch && k.module_type == COMMON && k.default_store == COMMON)
    });
    if common_specific_ok {
        return Specificity::CommonSpecific;
    }

    let has_common_common = key_triples.iter().any(ScopeTriple::is_common);
    if has_common_common {
        return Specificity::CommonCommon;
    }

    Specificity::NotApplicable
}
