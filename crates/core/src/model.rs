//! The universal [`Record`] type and the closed [`RecordModel`] tag set
//! shared across the D, I, and P dialects.

use metafw_spec_tables::PcdCategory;
use serde::{Deserialize, Serialize};

/// `"COMMON"` — the wildcard value for any scope dimension.
pub const COMMON: &str = "COMMON";

/// `"DEFAULT"` — the default-store wildcard accepted alongside `COMMON` on `scope2`.
pub const DEFAULT_STORE: &str = "DEFAULT";

/// The section-type tag a `DEFINE`/`EDK_GLOBAL` record carries in `value3`
/// when it was read from the header (`[Defines]`) section, as opposed to
/// some other section name — see spec.md §4.4: header-section `DEFINE`s go
/// to `FileLocalMacros`, all others to `SectionMacros` keyed by their own
/// section type.
pub const HEADER_SECTION_NAME: &str = "Defines";

/// The closed tag identifying a record's semantic category.
///
/// Shared across dialects: not every variant is produced by every dialect,
/// but the set itself does not vary by dialect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "model", rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum RecordModel {
    /// A `[Defines]` key/value pair (`value1` = name, `value2` = value).
    Header,
    /// A `[SkuIds]` entry.
    SkuId,
    /// A `[DefaultStores]` entry.
    DefaultStore,
    /// A library class declaration (`[LibraryClasses]` in D, header in I/P).
    LibraryClass,
    /// A concrete library instance binding (D dialect `LibraryClasses` value).
    LibraryInstance,
    /// A PCD entry, tagged with its category.
    Pcd(PcdCategory),
    /// A `[BuildOptions]` entry.
    BuildOption,
    /// A `[Components]` entry (the bare module path).
    Component,
    /// A GUID declaration (P dialect) or reference (I dialect).
    Guid,
    /// A PPI declaration or reference.
    Ppi,
    /// A protocol declaration or reference.
    Protocol,
    /// A source-file entry (I dialect `[Sources]`).
    Source,
    /// A package dependency entry (I dialect `[Packages]`, or P `[Includes]`).
    Path,
    /// An `!include` directive (D only; consumed by post-processing).
    Include,
    /// `!if` (D only; consumed by post-processing).
    ConditionalIf,
    /// `!ifdef` (D only; consumed by post-processing).
    ConditionalIfdef,
    /// `!ifndef` (D only; consumed by post-processing).
    ConditionalIfndef,
    /// `!elseif` (D only; consumed by post-processing).
    ConditionalElseif,
    /// `!else` (D only; consumed by post-processing).
    ConditionalElse,
    /// `!endif` (D only; consumed by post-processing).
    ConditionalEndif,
    /// An `!error` directive (D only; consumed by post-processing).
    Error,
    /// A `DEFINE`/`EDK_GLOBAL` macro assignment.
    Define,
    /// A macro assignment visible process-wide (rare; global scope).
    GlobalDefine,
    /// A `@ValidRange`/`@ValidList`/`@Expression` comment attached to a P-dialect PCD declaration.
    ValidExpression,
    /// A regular comment, attached via `belongs_to_item` to the following record.
    Comment,
    /// A comment appearing before the first section header.
    HeaderComment,
    /// A comment appearing after the last record.
    TailComment,
    /// A line that parsed but did not match any recognized shape for its section.
    Unknown,
}

/// A single record — the universal unit stored by [`crate::store::RecordStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Monotonic id, unique within a file; negative for the end-flag sentinel.
    pub id: i64,
    /// Semantic category.
    pub model: RecordModel,
    /// First opaque value field; meaning depends on `model`.
    pub value1: String,
    /// Second opaque value field.
    #[serde(default)]
    pub value2: String,
    /// Third opaque value field.
    #[serde(default)]
    pub value3: String,
    /// Arch scope (`"COMMON"` wildcard).
    #[serde(default = "common_scope")]
    pub scope1: String,
    /// Module-type scope (`"COMMON"`/`"DEFAULT"` wildcard).
    #[serde(default = "common_scope")]
    pub scope2: String,
    /// Default-store scope; only meaningful on D-shape tables.
    #[serde(default = "common_scope")]
    pub scope3: String,
    /// Id of the parent record (component sub-section membership), or `-1`.
    #[serde(default = "minus_one")]
    pub belongs_to_item: i64,
    /// Id of the `!include` directive that pulled this record in, or `-1`.
    #[serde(default = "minus_one")]
    pub from_item: i64,
    /// 1-based first source line.
    pub start_line: u32,
    /// 1-based last source line.
    pub end_line: u32,
    /// Whether this record is visible to queries.
    #[serde(default = "true_default")]
    pub enabled: bool,
}

fn common_scope() -> String {
    COMMON.to_string()
}

fn minus_one() -> i64 {
    -1
}

fn true_default() -> bool {
    true
}

impl Record {
    /// Whether this is the end-flag sentinel appended by [`crate::store::RecordStore::set_end_flag`].
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.id < 0
    }
}

/// `(arch, module-type, default-store)`, with `"COMMON"` as the wildcard in
/// any position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeTriple {
    /// Target architecture (e.g. `"X64"`, or `"COMMON"`).
    pub arch: String,
    /// Module-type tag (e.g. `"DXE_DRIVER"`, or `"COMMON"`).
    pub module_type: String,
    /// Default-store tag, or `"COMMON"`.
    pub default_store: String,
}

impl ScopeTriple {
    /// The `(COMMON, COMMON, COMMON)` triple.
    #[must_use]
    pub fn common() -> Self {
        Self {
            arch: COMMON.to_string(),
            module_type: COMMON.to_string(),
            default_store: COMMON.to_string(),
        }
    }

    /// Whether every component of this triple is `"COMMON"`.
    #[must_use]
    pub fn is_common(&self) -> bool {
        self.arch == COMMON && self.module_type == COMMON && self.default_store == COMMON
    }
}
