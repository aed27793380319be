//! Closed tables describing record models, PCD categories, directive
//! keywords, and reserved keys shared by the dialect D/I/P parsers.
//!
//! These are small, fixed tables — unlike a command spec with hundreds of
//! opcodes, the EDK2-style grammar has a handful of section kinds and PCD
//! categories known at compile time, so they live here as plain Rust `const`
//! data rather than a JSON-driven table loaded at runtime.

use serde::{Deserialize, Serialize};

/// Current format version for the closed tables in this crate, bumped
/// whenever a table's shape changes in a way that affects callers.
pub const TABLE_FORMAT_VERSION: &str = "0.1.0";

/// Which of the three build-description dialects a file belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Dialect {
    /// Platform description (`.dsc`).
    D,
    /// Module description (`.inf`).
    I,
    /// Package description (`.dec`).
    P,
}

impl Dialect {
    /// Guess the dialect from a file extension (without the leading dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dsc" => Some(Self::D),
            "inf" => Some(Self::I),
            "dec" => Some(Self::P),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::D => write!(f, "D"),
            Self::I => write!(f, "I"),
            Self::P => write!(f, "P"),
        }
    }
}

/// PCD category, determining the accepted shape of its value expression.
///
/// Mirrors the EDK2 PCD type taxonomy: flags, build-time constants, and
/// the three dynamic storage backends (default, VPD, HII).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum PcdCategory {
    /// `PcdFeatureFlag` — a single boolean value.
    FeatureFlag,
    /// `PcdFixedAtBuild` — a compile-time constant.
    FixedAtBuild,
    /// `PcdPatchableInModule` — patchable after build, before flash.
    PatchableInModule,
    /// `PcdsDynamicDefault` — dynamic, default-store backed.
    DynamicDefault,
    /// `PcdsDynamicExDefault` — dynamic-ex, default-store backed.
    DynamicExDefault,
    /// `PcdsDynamicVpd` — dynamic, VPD-backed.
    DynamicVpd,
    /// `PcdsDynamicExVpd` — dynamic-ex, VPD-backed.
    DynamicExVpd,
    /// `PcdsDynamicHii` — dynamic, HII-variable-backed.
    DynamicHii,
    /// `PcdsDynamicExHii` — dynamic-ex, HII-variable-backed.
    DynamicExHii,
}

impl PcdCategory {
    /// Section keyword (as it appears in a `[PcdsXxx]` header) for this category.
    #[must_use]
    pub fn section_keyword(self) -> &'static str {
        match self {
            Self::FeatureFlag => "PcdsFeatureFlag",
            Self::FixedAtBuild => "PcdsFixedAtBuild",
            Self::PatchableInModule => "PcdsPatchableInModule",
            Self::DynamicDefault => "PcdsDynamicDefault",
            Self::DynamicExDefault => "PcdsDynamicExDefault",
            Self::DynamicVpd => "PcdsDynamicVpd",
            Self::DynamicExVpd => "PcdsDynamicExVpd",
            Self::DynamicHii => "PcdsDynamicHii",
            Self::DynamicExHii => "PcdsDynamicExHii",
        }
    }

    /// Inclusive `[min, max]` number of `|`-separated fields a value
    /// expression for this category may carry, beyond the leading
    /// `TokenSpace.PcdName = ` assignment.
    #[must_use]
    pub fn field_count_range(self) -> (usize, usize) {
        match self {
            Self::FeatureFlag => (1, 1),
            Self::FixedAtBuild
            | Self::PatchableInModule
            | Self::DynamicDefault
            | Self::DynamicExDefault => (1, 3),
            Self::DynamicVpd | Self::DynamicExVpd => (1, 3),
            Self::DynamicHii | Self::DynamicExHii => (3, 5),
        }
    }

    /// Whether this category is one of the `DynamicEx` variants, which
    /// additionally carry a leading GUID field identifying the PCD.
    #[must_use]
    pub fn is_dynamic_ex(self) -> bool {
        matches!(
            self,
            Self::DynamicExDefault | Self::DynamicExVpd | Self::DynamicExHii
        )
    }

    /// All category variants, in declaration order.
    pub const ALL: &[Self] = &[
        Self::FeatureFlag,
        Self::FixedAtBuild,
        Self::PatchableInModule,
        Self::DynamicDefault,
        Self::DynamicExDefault,
        Self::DynamicVpd,
        Self::DynamicExVpd,
        Self::DynamicHii,
        Self::DynamicExHii,
    ];

    /// Look up a category by its `[PcdsXxx]` section keyword, case-insensitively.
    #[must_use]
    pub fn from_section_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.section_keyword().eq_ignore_ascii_case(keyword))
    }
}

impl std::fmt::Display for PcdCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.section_keyword())
    }
}

/// A fixed-width unsigned integer PCD datum type, with its inclusive value range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum IntDatumType {
    /// `UINT8`.
    Uint8,
    /// `UINT16`.
    Uint16,
    /// `UINT32`.
    Uint32,
    /// `UINT64`.
    Uint64,
}

impl IntDatumType {
    /// Parse a datum type name (e.g. `"UINT32"`), or `None` for non-integer
    /// datum types (`VOID*`, `BOOLEAN`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "UINT8" => Some(Self::Uint8),
            "UINT16" => Some(Self::Uint16),
            "UINT32" => Some(Self::Uint32),
            "UINT64" => Some(Self::Uint64),
            _ => None,
        }
    }

    /// Maximum representable value for this datum type.
    #[must_use]
    pub fn max_value(self) -> u64 {
        match self {
            Self::Uint8 => u64::from(u8::MAX),
            Self::Uint16 => u64::from(u16::MAX),
            Self::Uint32 => u64::from(u32::MAX),
            Self::Uint64 => u64::MAX,
        }
    }
}

impl std::fmt::Display for IntDatumType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uint8 => write!(f, "UINT8"),
            Self::Uint16 => write!(f, "UINT16"),
            Self::Uint32 => write!(f, "UINT32"),
            Self::Uint64 => write!(f, "UINT64"),
        }
    }
}

/// A conditional-compilation or include directive recognized in dialect D.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Directive {
    /// `!if`
    If,
    /// `!ifdef`
    Ifdef,
    /// `!ifndef`
    Ifndef,
    /// `!elseif`
    Elseif,
    /// `!else`
    Else,
    /// `!endif`
    Endif,
    /// `!include`
    Include,
    /// `!error`
    Error,
}

impl Directive {
    /// The literal keyword as it appears in source, including the leading `!`.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::If => "!if",
            Self::Ifdef => "!ifdef",
            Self::Ifndef => "!ifndef",
            Self::Elseif => "!elseif",
            Self::Else => "!else",
            Self::Endif => "!endif",
            Self::Include => "!include",
            Self::Error => "!error",
        }
    }

    /// Whether this directive opens a new level of the conditional stack.
    #[must_use]
    pub fn opens_block(self) -> bool {
        matches!(self, Self::If | Self::Ifdef | Self::Ifndef)
    }

    /// Whether this directive closes the current level of the conditional stack.
    #[must_use]
    pub fn closes_block(self) -> bool {
        matches!(self, Self::Endif)
    }

    /// All directive variants, in no particular order (used for keyword lookup).
    pub const ALL: &[Self] = &[
        Self::If,
        Self::Ifdef,
        Self::Ifndef,
        Self::Elseif,
        Self::Else,
        Self::Endif,
        Self::Include,
        Self::Error,
    ];

    /// Recognize a directive by its leading keyword (case-sensitive — EDK2
    /// directives are conventionally lowercase, unlike section/keyword names).
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.keyword() == keyword)
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// Reserved keys in a `[Defines]` section that carry a version-number
/// grammar (`INF_VERSION`-style: hex `0xMMMMmmmm` or dotted `MM.mm`).
///
/// Supplements the single `INF_VERSION` example from the distilled spec
/// with the other reserved version keys the original parser also checks.
pub const RESERVED_VERSION_KEYS: &[&str] =
    &["INF_VERSION", "DSC_SPECIFICATION", "EDK_RELEASE_VERSION", "PI_SPECIFICATION_VERSION"];

/// Returns whether `key` is one of [`RESERVED_VERSION_KEYS`], case-insensitively.
#[must_use]
pub fn is_reserved_version_key(key: &str) -> bool {
    RESERVED_VERSION_KEYS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(key))
}
