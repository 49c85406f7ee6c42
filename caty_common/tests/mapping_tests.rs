//! Mapping file loading tests.
//!
//! Covers `MappingTable::load()` against real files: missing file, empty and
//! all-malformed files, mixed content, and parse determinism.

use caty_common::codec::Width;
use caty_common::config::ConfigError;
use caty_common::mapping::{Direction, MappingDirective, MappingTable};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn write_mapping(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("vars_robot.txt");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = MappingTable::load(&dir.path().join("nope.txt"));
    assert!(matches!(result, Err(ConfigError::MappingNotFound(_))));
}

#[test]
fn test_load_empty_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_mapping(&dir, "");
    assert!(matches!(
        MappingTable::load(&path),
        Err(ConfigError::EmptyMapping(p)) if p == path
    ));
}

#[test]
fn test_load_all_malformed_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_mapping(&dir, "garbage text\n\nr# missing width: DO_1\n");
    assert!(matches!(MappingTable::load(&path), Err(ConfigError::EmptyMapping(_))));
}

#[test]
fn test_load_mixed_file() {
    let dir = TempDir::new().unwrap();
    let path = write_mapping(
        &dir,
        "r# MAIN.bTrig: DI_Start[1]\r\n\
         garbage text\r\n\
         w#MAIN.fSpeed:AO_Speed[32]\r\n\
         r# GVL.nRecipe : GO_Recipe [ 8 ]\r\n",
    );

    let table = MappingTable::load(&path).expect("should load");
    assert_eq!(table.len(), 3);
    assert_eq!(table.skipped_lines(), &[2]);
    assert_eq!(
        table.directives()[0],
        MappingDirective {
            direction: Direction::SourceToTarget,
            source_path: "MAIN.bTrig".to_string(),
            target_signal: "DI_Start".to_string(),
            width: Width::Bit,
        }
    );
    assert_eq!(
        table.directives()[1],
        MappingDirective {
            direction: Direction::TargetToSource,
            source_path: "MAIN.fSpeed".to_string(),
            target_signal: "AO_Speed".to_string(),
            width: Width::DWord,
        }
    );
    assert_eq!(table.directives()[2].width, Width::Byte);
}

#[test]
fn test_reload_is_identical() {
    let dir = TempDir::new().unwrap();
    let path = write_mapping(
        &dir,
        "r# A.a: DO_1[1]\nw# A.b: AI_1[64]\nr# A.c: GO_1[16]\n",
    );
    let first = MappingTable::load(&path).unwrap();
    let second = MappingTable::load(&path).unwrap();
    assert_eq!(first, second);
}

fn well_formed_line() -> impl Strategy<Value = (String, Direction, String, String, u32)> {
    (
        prop_oneof![Just(Direction::SourceToTarget), Just(Direction::TargetToSource)],
        "[A-Za-z_][A-Za-z0-9_.]{0,24}",
        "[A-Za-z_][A-Za-z0-9_]{0,24}",
        any::<u32>(),
        " {0,3}",
        " {0,3}",
        " {0,3}",
    )
        .prop_map(|(direction, path, signal, bits, a, b, c)| {
            let marker = match direction {
                Direction::SourceToTarget => 'r',
                Direction::TargetToSource => 'w',
            };
            let line = format!("{a}{marker}#{b}{path}{a}:{c}{signal}{b}[{c}{bits}{a}]{b}");
            (line, direction, path, signal, bits)
        })
}

proptest! {
    #[test]
    fn prop_well_formed_lines_always_parse((line, direction, path, signal, bits) in well_formed_line()) {
        let parsed = MappingDirective::parse_line(&line);
        prop_assert_eq!(
            parsed,
            Some(MappingDirective {
                direction,
                source_path: path,
                target_signal: signal,
                width: Width::from_bits(bits),
            })
        );
    }

    #[test]
    fn prop_parsing_is_deterministic(lines in prop::collection::vec(well_formed_line(), 0..16), noise in "[a-z ]{0,12}") {
        let mut text = String::new();
        for (line, ..) in &lines {
            text.push_str(line);
            text.push('\n');
            text.push_str(&noise);
            text.push('\n');
        }
        let first = MappingTable::parse_str(&text);
        let second = MappingTable::parse_str(&text);
        prop_assert_eq!(first.len(), lines.len());
        prop_assert_eq!(first, second);
    }
}
