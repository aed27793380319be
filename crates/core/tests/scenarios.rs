//! End-to-end parsing scenarios and cross-cutting invariants for the
//! platform (D), module (I), and package (P) dialects.
//!
//! Each `scenario_*` test below exercises one full `RawParser` (+
//! `PostProcessor` for D) pass over a small but realistic snippet; the
//! `invariant_*`/`boundary_*` tests check properties that must hold across
//! any input, not just one sample.

use std::path::Path;

use metafw_core::{
    BelongsToFilter, BuildContext, MacroMap, PostProcessor, RawParser, Record, RecordModel,
    RecordStore, ScopeTriple,
};
use metafw_diagnostics::{codes, Diagnostic};
use metafw_spec_tables::{Dialect, PcdCategory};

fn parse_raw(dialect: Dialect, text: &str) -> (RecordStore, Vec<Diagnostic>) {
    let global = MacroMap::new();
    let command_line = MacroMap::new();
    RawParser::new(dialect, &global, &command_line)
        .parse(text, 0)
        .unwrap()
}

fn parse_resolved(text: &str) -> (RecordStore, Vec<Diagnostic>) {
    let (raw, mut diags) = parse_raw(Dialect::D, text);
    let mut ctx = BuildContext::new();
    let (resolved, pp_diags) = PostProcessor::default()
        .run(&raw, 0, Path::new("Platform.dsc"), &mut ctx)
        .unwrap();
    diags.extend(pp_diags);
    (resolved, diags)
}

fn enabled_records(store: &RecordStore) -> Vec<&Record> {
    store.get_all().iter().filter(|r| r.enabled && !r.is_sentinel()).collect()
}

// ── Scenario 1: header basics ────────────────────────────────────────────

#[test]
fn scenario_header_basics() {
    let text = "[Defines]\nPLATFORM_NAME = Sample\nPLATFORM_GUID = 12345678-1234-1234-1234-123456789abc\nDSC_SPECIFICATION = 0x00010017\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let headers: Vec<_> = enabled_records(&resolved)
        .into_iter()
        .filter(|r| r.model == RecordModel::Header)
        .collect();
    assert_eq!(headers.len(), 3);
    assert!(headers.iter().any(|r| r.value1 == "PLATFORM_NAME" && r.value2 == "Sample"));
    assert!(headers
        .iter()
        .any(|r| r.value1 == "DSC_SPECIFICATION" && r.value2 == "0x00010017"));
}

// ── Scenario 2: SKU ids ──────────────────────────────────────────────────

#[test]
fn scenario_sku_ids() {
    let text = "[SkuIds]\n0|DEFAULT\n1|Sku1|DEFAULT\n2|Sku2|Sku1\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let skus: Vec<_> = enabled_records(&resolved)
        .into_iter()
        .filter(|r| r.model == RecordModel::SkuId)
        .collect();
    assert_eq!(skus.len(), 3);
    let sku2 = skus.iter().find(|r| r.value1 == "2").unwrap();
    assert_eq!(sku2.value2, "Sku2");
    assert_eq!(sku2.value3, "Sku1");
}

// ── Scenario 3: conditional block (!if/!else/!endif) ─────────────────────

#[test]
fn scenario_conditional_block() {
    let text = "[Defines]\nDEFINE TARGET_ARCH = X64\n!if $(TARGET_ARCH) == X64\nPLATFORM_NAME = Sixty4\n!else\nPLATFORM_NAME = Other\n!endif\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let enabled: Vec<_> = enabled_records(&resolved)
        .into_iter()
        .filter(|r| r.model == RecordModel::Header && r.value1 == "PLATFORM_NAME")
        .collect();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].value2, "Sixty4");
}

// ── Scenario 4: PCD 3-field ──────────────────────────────────────────────

#[test]
fn scenario_pcd_three_field() {
    let text = "[PcdsFixedAtBuild]\ngEfiMdeModulePkgTokenSpaceGuid.PcdFoo|10|UINT32\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let pcd = enabled_records(&resolved)
        .into_iter()
        .find(|r| matches!(r.model, RecordModel::Pcd(PcdCategory::FixedAtBuild)))
        .unwrap();
    assert_eq!(pcd.value1, "gEfiMdeModulePkgTokenSpaceGuid");
    assert_eq!(pcd.value2, "PcdFoo");
    assert_eq!(pcd.value3, "10|UINT32");
}

// ── Scenario 5: PCD with `|` inside a quoted string ──────────────────────

#[test]
fn scenario_pcd_pipe_inside_string() {
    let text = "[PcdsFixedAtBuild]\ngEfiTokenSpace.PcdFoo|L\"a|b\"|VOID*|8\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let pcd = enabled_records(&resolved)
        .into_iter()
        .find(|r| matches!(r.model, RecordModel::Pcd(_)))
        .unwrap();
    assert_eq!(pcd.value3, "L\"a|b\"|VOID*|8");
}

// ── Scenario 6: multiline `{CODE(...)}` ──────────────────────────────────

#[test]
fn scenario_multiline_code_value() {
    let text = "[PcdsFixedAtBuild]\nTS.PcdFoo|{CODE(\n0x01,\n0x02\n)}\nTS.PcdBar|1\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let bar = enabled_records(&resolved).into_iter().find(|r| r.value2 == "PcdBar").unwrap();
    assert_eq!(bar.start_line, 6);
    let foo = enabled_records(&resolved).into_iter().find(|r| r.value2 == "PcdFoo").unwrap();
    assert!(foo.value3.contains("0x01") && foo.value3.contains("0x02"));
}

// ── Scenario 7: `!include` expansion ──────────────────────────────────────

#[test]
fn scenario_include_expansion() {
    let dir = std::env::temp_dir().join(format!("metafw_scenarios_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let child_path = dir.join("Common.dsc");
    std::fs::write(&child_path, "[Defines]\nSHARED_NAME = Shared\n").unwrap();

    let parent_text = format!("[Defines]\nPLATFORM_NAME = Parent\n!include {}\n", child_path.display());
    let (raw, _) = parse_raw(Dialect::D, &parent_text);
    let mut ctx = BuildContext::new();
    let (resolved, diags) = PostProcessor::default()
        .run(&raw, 0, Path::new("Parent.dsc"), &mut ctx)
        .unwrap();
    assert!(diags.is_empty(), "{diags:?}");

    let shared = enabled_records(&resolved)
        .into_iter()
        .find(|r| r.value1 == "SHARED_NAME")
        .expect("included record spliced in");
    assert_eq!(shared.value2, "Shared");
    assert!(shared.from_item >= 0, "spliced record must record its including !include id");

    std::fs::remove_dir_all(&dir).ok();
}

// ── Module (I) and package (P) dialects are single-phase ─────────────────

#[test]
fn module_dialect_is_resolved_by_raw_parser_alone() {
    let text = "[Defines]\nINF_VERSION = 0x00010005\nBASE_NAME = SampleDriver\n[LibraryClasses]\nUefiBootServicesTableLib\n[Sources]\nDriver.c\n[Packages]\nMdePkg/MdePkg.dec\n";
    let (store, diags) = parse_raw(Dialect::I, text);
    assert!(diags.is_empty(), "{diags:?}");
    let records = enabled_records(&store);
    assert!(records.iter().any(|r| r.model == RecordModel::LibraryClass && r.value1 == "UefiBootServicesTableLib"));
    assert!(records.iter().any(|r| r.model == RecordModel::Source && r.value1 == "Driver.c"));
    assert!(records.iter().any(|r| r.model == RecordModel::Path && r.value1 == "MdePkg/MdePkg.dec"));
    // No directive/conditional model should ever appear outside dialect D.
    assert!(records.iter().all(|r| !matches!(
        r.model,
        RecordModel::ConditionalIf
            | RecordModel::ConditionalIfdef
            | RecordModel::ConditionalIfndef
            | RecordModel::ConditionalElseif
            | RecordModel::ConditionalElse
            | RecordModel::ConditionalEndif
            | RecordModel::Include
    )));
}

#[test]
fn package_dialect_declares_guids_and_library_classes() {
    let text = "[Guids]\ngEfiEventReadyToBootGuid = {0x7CE88FB3, 0x4BD7, 0x4679, {0x87, 0xA8, 0xA8, 0xD8, 0xDE, 0xE5, 0x0D, 0x2B}}\n[LibraryClasses]\nDebugLib|Include/Library/DebugLib.h\n";
    let (store, diags) = parse_raw(Dialect::P, text);
    assert!(diags.is_empty(), "{diags:?}");
    let records = enabled_records(&store);
    assert!(records.iter().any(|r| r.model == RecordModel::Guid && r.value1 == "gEfiEventReadyToBootGuid"));
    assert!(records
        .iter()
        .any(|r| r.model == RecordModel::LibraryInstance && r.value1 == "DebugLib" && r.value2 == "Include/Library/DebugLib.h"));
}

// ── Invariants (spec §8) ──────────────────────────────────────────────────

#[test]
fn invariant_ids_are_monotonic_within_a_file() {
    let text = "[Defines]\nPLATFORM_NAME = A\nPLATFORM_VERSION = 1\n[SkuIds]\n0|DEFAULT\n";
    let (store, _) = parse_raw(Dialect::D, &text);
    let ids: Vec<i64> = store.get_all().iter().map(|r| r.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted, "ids must already be in non-decreasing insertion order");
    assert!(ids.windows(2).all(|w| w[1] > w[0] || w[1] < 0), "ids strictly increase except the sentinel");
}

#[test]
fn invariant_scope_propagates_one_record_per_triple() {
    let text = "[Defines.X64, Defines.IA32]\nPLATFORM_NAME = Multi\n";
    let (store, _) = parse_raw(Dialect::D, &text);
    let headers: Vec<_> = store
        .get_all()
        .iter()
        .filter(|r| r.model == RecordModel::Header && r.value1 == "PLATFORM_NAME")
        .collect();
    assert_eq!(headers.len(), 2);
    let archs: Vec<&str> = headers.iter().map(|r| r.scope1.as_str()).collect();
    assert!(archs.contains(&"X64"));
    assert!(archs.contains(&"IA32"));
}

#[test]
fn invariant_comment_attaches_to_following_record() {
    let text = "[Defines]\n# explains the next line\nPLATFORM_NAME = A\n";
    let (store, _) = parse_raw(Dialect::D, &text);
    let header = store.get_all().iter().find(|r| r.model == RecordModel::Header).unwrap();
    let comment = store.get_all().iter().find(|r| r.model == RecordModel::Comment).unwrap();
    assert_eq!(comment.belongs_to_item, header.id);
}

#[test]
fn invariant_directive_balance_is_diagnosed_both_ways() {
    let (_, unbalanced_endif) = parse_resolved("[Defines]\n!endif\nPLATFORM_NAME = A\n");
    assert!(unbalanced_endif.iter().any(|d| d.id == codes::DIRECTIVE_UNBALANCED));

    let (_, unterminated_if) = parse_resolved("[Defines]\n!if 1 == 1\nPLATFORM_NAME = A\n");
    assert!(unterminated_if.iter().any(|d| d.id == codes::DIRECTIVE_UNBALANCED));
}

#[test]
fn invariant_enable_consistency_cascades_to_sub_section_children() {
    let text = "[Components]\nMdeModulePkg/Foo.inf {\n  <LibraryClasses>\n  NULL|Lib.inf\n}\n";
    let (mut store, _) = parse_raw(Dialect::D, &text);
    let component = store.get_all().iter().find(|r| r.model == RecordModel::Component).unwrap().id;
    store.disable_component(component);
    let lib = store
        .get_all()
        .iter()
        .find(|r| matches!(r.model, RecordModel::LibraryInstance | RecordModel::LibraryClass))
        .unwrap();
    assert!(!lib.enabled, "disabling a component must cascade to its sub-section children");
}

#[test]
fn invariant_include_spliced_records_are_isolated_by_from_item() {
    let dir = std::env::temp_dir().join(format!("metafw_isolation_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let child_path = dir.join("Inc.dsc");
    std::fs::write(&child_path, "[Defines]\nINCLUDED = 1\n").unwrap();

    let parent_text = format!("[Defines]\nLOCAL = 1\n!include {}\n", child_path.display());
    let (raw, _) = parse_raw(Dialect::D, &parent_text);
    let mut ctx = BuildContext::new();
    let (resolved, _) = PostProcessor::default()
        .run(&raw, 0, Path::new("Parent.dsc"), &mut ctx)
        .unwrap();

    let local = resolved.get_all().iter().find(|r| r.value1 == "LOCAL").unwrap();
    let included = resolved.get_all().iter().find(|r| r.value1 == "INCLUDED").unwrap();
    assert_eq!(local.from_item, -1, "records from the including file are not attributed to any include");
    assert!(included.from_item >= 0, "spliced records must carry their originating !include's id");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn invariant_query_defaults_to_top_level_records() {
    let text = "[Components]\nFoo.inf {\n  <LibraryClasses>\n  NULL|Lib.inf\n}\nBar.inf\n";
    let (store, _) = parse_raw(Dialect::D, &text);
    let top_level = store.query(Some(&RecordModel::Component), None, BelongsToFilter::TopLevel, None);
    assert_eq!(top_level.len(), 2);
}

// ── Boundary behaviors (spec §8) ──────────────────────────────────────────

#[test]
fn boundary_empty_file_produces_only_the_sentinel() {
    let (store, diags) = parse_raw(Dialect::D, "");
    assert!(diags.is_empty());
    assert_eq!(store.get_all().len(), 1);
    assert!(store.get_all()[0].is_sentinel());
}

#[test]
fn boundary_comment_only_file_produces_only_header_comments_and_sentinel() {
    let (store, diags) = parse_raw(Dialect::D, "# just a comment\n# another\n");
    assert!(diags.is_empty());
    let non_sentinel: Vec<_> = store.get_all().iter().filter(|r| !r.is_sentinel()).collect();
    assert!(non_sentinel.iter().all(|r| r.model == RecordModel::HeaderComment));
}

#[test]
fn boundary_if_zero_disables_its_branch_entirely() {
    let text = "[Defines]\n!if 0\nPLATFORM_NAME = Never\n!endif\nPLATFORM_NAME = Always\n";
    let (resolved, diags) = parse_resolved(text);
    assert!(diags.is_empty(), "{diags:?}");
    let enabled: Vec<_> = enabled_records(&resolved)
        .into_iter()
        .filter(|r| r.model == RecordModel::Header)
        .collect();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].value2, "Always");
}
