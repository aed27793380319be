//! Parser, macro-expansion, and conditional-evaluation engine for the
//! EDK2-style firmware build-description dialects: platform description
//! (`.dsc`), module description (`.inf`), and package description (`.dec`).
//!
//! The pipeline is two-phase for dialect D (platform description):
//! [`raw_parser::RawParser`] tokenizes a file into unresolved [`model::Record`]s
//! (including directive records for `!if`/`!include`/etc.), and
//! [`postprocessor::PostProcessor`] resolves macros, evaluates conditional
//! stacks, inlines `!include`s, and validates PCD values. Dialects I and P
//! are single-phase: [`raw_parser::RawParser`] alone produces a resolved store.
//!
//! Out of scope (external collaborators): the build graph, code generation,
//! workspace/path discovery beyond `!include` resolution, and the
//! expression-evaluator's own grammar — [`expr::ExpressionBridge`] models
//! only the interface this crate needs from one.

#![warn(missing_docs)]

/// The [`model::Record`] type, [`model::RecordModel`] tag set, and [`model::ScopeTriple`].
pub mod model;
/// Comment stripping and string/paren-aware value splitting.
pub mod text;
/// In-memory, insertion-ordered storage for one file's records.
pub mod store;
/// The layered macro environment and section-scope resolution.
pub mod macros;
/// The external expression-evaluator collaborator interface.
pub mod expr;
/// PCD value-expression shape and datum-type validation.
pub mod pcd;
/// The line-oriented lexical pass.
pub mod raw_parser;
/// Macro replacement, conditional evaluation, and `!include` expansion (dialect D).
pub mod postprocessor;
/// Per-path parse cache and `!include` cycle detection.
pub mod factory;
/// Fatal parse errors.
pub mod error;

// ── Convenience re-exports ──────────────────────────────────────────────

pub use error::{ParseError, ParseResult};
pub use expr::{DefaultExpressionBridge, ExprOutcome, ExprValue, ExpressionBridge};
pub use factory::ParserFactory;
pub use macros::{MacroEnvironment, MacroMap, ScopeResolver, SectionMacroKey};
pub use model::{Record, RecordModel, ScopeTriple, COMMON, DEFAULT_STORE};
pub use pcd::{PcdValueAnalyzer, PcdValidation};
pub use postprocessor::{BuildContext, PostProcessor};
pub use raw_parser::RawParser;
pub use store::{BelongsToFilter, RecordStore, ID_BLOCK_SIZE};
