//! Integration tests for lutescribe library usage.
//!
//! These tests verify that the library can be used as a dependency
//! from external projects.

use lutescribe::{
    output_path, parse_mei, parse_mei_str, transcribe_file, write_mei, Element, KeySignature,
    MeiDocument, Mode, NotationType, ReferenceBeamClassifier, ReferenceSpeller, Settings,
    StaffStyle, TranscribeError, Transcriber,
};
use std::path::{Path, PathBuf};

fn transcribe_fixture(name: &str, settings: Settings) -> Result<MeiDocument, TranscribeError> {
    let data = std::fs::read(Path::new("test-files").join(name)).expect("Failed to read test file");
    let document = parse_mei(&data)?;
    let mut speller = ReferenceSpeller;
    let mut classifier = ReferenceBeamClassifier;
    Transcriber::new(settings, &mut speller, &mut classifier).transcribe(&document)
}

fn measures(document: &MeiDocument) -> Vec<&Element> {
    document.root.descendants_named("measure")
}

fn notehead_layer<'a>(measure: &'a Element, n: &str) -> &'a Element {
    measure
        .children_named("staff")
        .find(|staff| staff.attr("n") == Some(n))
        .and_then(|staff| staff.child("layer"))
        .expect("Missing notehead layer")
}

fn child_names(element: &Element) -> Vec<&str> {
    element.elements().map(|e| e.name.as_str()).collect()
}

/// `pname`, `oct` and `accid` of every note in a chord.
fn chord_notes(chord: &Element) -> Vec<(String, String, Option<String>)> {
    chord
        .children_named("note")
        .map(|note| {
            (
                note.attr("pname").unwrap_or_default().to_string(),
                note.attr("oct").unwrap_or_default().to_string(),
                note.attr("accid").map(str::to_string),
            )
        })
        .collect()
}

fn init_logger() {
    env_logger::builder()
        .is_test(true)
        .try_init()
        .unwrap_or_default();
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("lutescribe-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Test that all major types are accessible from the library.
#[test]
fn test_types_accessible() {
    fn _assert_types() {
        let _: fn(&[u8]) -> Result<MeiDocument, TranscribeError> = parse_mei;
        let _: fn(&MeiDocument) -> Result<String, TranscribeError> = write_mei;
        let _: fn(&Path, &Path) -> Result<PathBuf, TranscribeError> = output_path;
    }
}

/// Every well formed fixture transcribes in both staff styles.
#[test]
fn test_transcribe_all_fixtures() {
    init_logger();
    for entry in std::fs::read_dir("test-files").unwrap() {
        let path = entry.unwrap().path();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();
        if file_name == "no-staffgrp.mei" {
            continue;
        }
        for staff in [StaffStyle::Single, StaffStyle::Double] {
            let settings = Settings {
                staff,
                ..Settings::default()
            };
            let document = transcribe_fixture(&file_name, settings)
                .unwrap_or_else(|err| panic!("Failed to transcribe file: {file_name}\n{err}"));
            let text = write_mei(&document).unwrap();
            let reparsed = parse_mei_str(&text).unwrap();
            assert_eq!(reparsed, document, "File: {file_name}");
        }
    }
}

/// Single staff transcription keeping the tablature.
#[test]
fn test_single_staff_transcription() {
    let document =
        transcribe_fixture("capirola.mei", Settings::default()).expect("Failed to transcribe");
    let measures = measures(&document);
    assert_eq!(measures.len(), 3);

    // notehead staff, tablature staff, then the flags
    let first = measures[0];
    assert_eq!(child_names(first), vec!["staff", "staff", "dir", "dir", "dir"]);
    let tab_staff = first.children_named("staff").nth(1).unwrap();
    assert_eq!(tab_staff.attr("n"), Some("2"));
    assert_eq!(tab_staff.descendants_named("tabGrp").len(), 6);

    let layer = notehead_layer(first, "1");
    assert_eq!(child_names(layer), vec!["chord", "beam", "beam", "chord"]);
    let opening = layer.child("chord").unwrap();
    assert_eq!(opening.attr("dur"), Some("4"));
    assert_eq!(opening.attr("stem.visible"), Some("false"));
    assert_eq!(
        chord_notes(opening),
        vec![
            ("g".to_string(), "4".to_string(), None),
            ("a".to_string(), "3".to_string(), None),
        ]
    );

    // f#, f natural, f# again, then g
    let beamed: Vec<_> = layer
        .children_named("beam")
        .flat_map(|beam| beam.children_named("chord"))
        .map(chord_notes)
        .collect();
    assert_eq!(beamed[0], vec![("f".to_string(), "4".to_string(), Some("s".to_string()))]);
    assert_eq!(beamed[1], vec![("f".to_string(), "4".to_string(), Some("n".to_string()))]);
    assert_eq!(beamed[2], vec![("f".to_string(), "4".to_string(), Some("s".to_string()))]);
    assert_eq!(beamed[3], vec![("g".to_string(), "4".to_string(), None)]);

    let dir = first.child("dir").unwrap();
    assert_eq!(dir.attr("startid"), Some("#e1"));
    let symbol = dir.child("symbol").unwrap();
    assert_eq!(symbol.attr("glyph.auth"), Some("smufl"));
    assert_eq!(symbol.attr("glyph.name"), Some("luteDurationQuarter"));

    // dotted half with its dot glyph, then a rest
    let second = measures[1];
    let layer = notehead_layer(second, "1");
    assert_eq!(child_names(layer), vec!["chord", "rest"]);
    assert_eq!(layer.child("chord").unwrap().attr("dots"), Some("1"));
    let glyphs: Vec<_> = second
        .child("dir")
        .unwrap()
        .children_named("symbol")
        .map(|symbol| symbol.attr("glyph.name").unwrap())
        .collect();
    assert_eq!(glyphs, vec!["luteDurationHalf", "augmentationDot"]);

    // a lone rest fills the measure
    let layer = notehead_layer(measures[2], "1");
    assert_eq!(child_names(layer), vec!["mRest"]);

    // the tablature definition is rewritten
    let score_def = document.root.find_descendant("scoreDef").unwrap();
    let tab_def = score_def
        .descendants_named("staffDef")
        .into_iter()
        .find(|def| def.attr("notationtype").is_some())
        .unwrap();
    assert_eq!(tab_def.attr("n"), Some("2"));
    assert_eq!(tab_def.attr("notationtype"), Some("tab.lute.french"));
    assert_eq!(tab_def.attr("lines"), Some("6"));
}

/// Double staff transcription without the tablature.
#[test]
fn test_double_staff_transcription() {
    let settings = Settings {
        staff: StaffStyle::Double,
        keep_tab: false,
        ..Settings::default()
    };
    let document = transcribe_fixture("capirola.mei", settings).expect("Failed to transcribe");
    let first = measures(&document)[0];
    assert!(first.find_descendant("tabGrp").is_none());

    let upper = notehead_layer(first, "1");
    let lower = notehead_layer(first, "2");
    // the opening chord is split at middle c
    let opening_upper = upper.child("chord").unwrap();
    assert_eq!(chord_notes(opening_upper), vec![("g".to_string(), "4".to_string(), None)]);
    let opening_lower = lower.child("chord").unwrap();
    assert_eq!(opening_lower.attr("xml:id"), Some("e1_lwr"));
    assert_eq!(chord_notes(opening_lower), vec![("a".to_string(), "3".to_string(), None)]);

    // the closing bass chord leaves a space on the upper staff carrying the flag
    let last_upper = upper.elements().last().unwrap();
    assert_eq!(last_upper.name, "space");
    assert_eq!(last_upper.attr("xml:id"), Some("e6_spc"));
    let last_dir = first.children_named("dir").last().unwrap();
    assert_eq!(last_dir.attr("startid"), Some("#e6_spc"));

    let staff_grp = document.root.find_descendant("staffGrp").unwrap();
    let notehead_grp = staff_grp.child("staffGrp").unwrap();
    assert_eq!(notehead_grp.attr("symbol"), Some("bracket"));
    assert_eq!(staff_grp.children_named("staffDef").count(), 0);
}

/// Every identifier in the output is unique.
#[test]
fn test_identifiers_unique() {
    for staff in [StaffStyle::Single, StaffStyle::Double] {
        for fixture in ["capirola.mei", "mensural.mei"] {
            let settings = Settings {
                staff,
                ..Settings::default()
            };
            let document = transcribe_fixture(fixture, settings).expect("Failed to transcribe");
            let mut ids = Vec::new();
            collect_ids(&document.root, &mut ids);
            let total = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), total, "duplicate identifiers in {fixture}");
        }
    }
}

fn collect_ids<'a>(element: &'a Element, ids: &mut Vec<&'a str>) {
    ids.extend(element.attr("xml:id"));
    for child in element.elements() {
        collect_ids(child, ids);
    }
}

/// Meter derived from measure lengths when only a mensuration sign is given.
#[test]
fn test_mensural_meter() {
    let document =
        transcribe_fixture("mensural.mei", Settings::default()).expect("Failed to transcribe");
    let measures = measures(&document);
    // 3.5 quarters beamed by quarter beats
    let layer = notehead_layer(measures[0], "1");
    assert_eq!(child_names(layer), vec!["beam", "beam", "beam", "chord"]);

    let layer = notehead_layer(measures[1], "1");
    let breve = layer.child("chord").unwrap();
    assert_eq!(breve.attr("dur"), Some("breve"));
    let glyph = measures[1]
        .child("dir")
        .and_then(|dir| dir.child("symbol"))
        .and_then(|symbol| symbol.attr("glyph.name"));
    assert_eq!(glyph, Some("luteDurationDoubleWhole"));

    // mensuration sign copied to the notehead staff
    let score_def = document.root.find_descendant("scoreDef").unwrap();
    let notehead_def = score_def.find_descendant("staffDef").unwrap();
    assert_eq!(notehead_def.attr("n"), Some("1"));
    assert!(notehead_def.child("mensur").is_some());
    let tab_def = score_def.descendants_named("staffDef")[1];
    assert_eq!(tab_def.attr("lines"), Some("5"));
}

/// Windows-1252 input with a key signature and a shifted tuning.
#[test]
fn test_windows_1252_input() {
    let settings = Settings {
        key: KeySignature::new(-1, Mode::Major).unwrap(),
        tuning: "A".parse().unwrap(),
        notation: NotationType::Spanish,
        ..Settings::default()
    };
    let document = transcribe_fixture("windows-1252.mei", settings).expect("Failed to transcribe");
    let title = document.root.find_descendant("title").unwrap();
    assert_eq!(title.children, vec![lutescribe::Node::Text("Fantasía de Narváez".to_string())]);

    // fourth course in A is g3: fret 1 is a-flat, the open course g
    let layer = notehead_layer(measures(&document)[0], "1");
    let chords: Vec<_> = layer.children_named("chord").map(chord_notes).collect();
    assert_eq!(chords[0], vec![("a".to_string(), "3".to_string(), Some("f".to_string()))]);
    assert_eq!(chords[1], vec![("g".to_string(), "3".to_string(), None)]);

    let key_sig = document.root.find_descendant("keySig").unwrap();
    assert_eq!(key_sig.attr("sig"), Some("1f"));
}

/// Writing a transcription to disk.
#[test]
fn test_transcribe_file() {
    let output_dir = scratch_dir("write");
    let mut speller = ReferenceSpeller;
    let mut classifier = ReferenceBeamClassifier;
    let mut transcriber = Transcriber::new(Settings::default(), &mut speller, &mut classifier);
    let output = transcribe_file(Path::new("test-files/capirola.mei"), &output_dir, &mut transcriber)
        .expect("Failed to transcribe file");
    assert_eq!(output, output_dir.join("capirola-dipl.mei"));

    let text = std::fs::read_to_string(&output).expect("Failed to read output");
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("<?xml-model"));
    assert!(text.contains("xmlns=\"http://www.music-encoding.org/ns/mei\""));
    assert!(text.contains("glyph.name=\"luteDurationQuarter\""));

    // the output reads back
    let reparsed = parse_mei_str(&text).expect("Failed to parse output");
    assert_eq!(reparsed.root.descendants_named("measure").len(), 3);
    let _ = std::fs::remove_dir_all(&output_dir);
}

/// Test error handling for invalid input.
#[test]
fn test_malformed_file() {
    let output_dir = scratch_dir("malformed");
    let mut speller = ReferenceSpeller;
    let mut classifier = ReferenceBeamClassifier;
    let mut transcriber = Transcriber::new(Settings::default(), &mut speller, &mut classifier);
    let input = Path::new("test-files/no-staffgrp.mei");
    let err = transcribe_file(input, &output_dir, &mut transcriber).unwrap_err();

    match err {
        TranscribeError::InFile { file, source } => {
            assert_eq!(file, input);
            assert!(
                matches!(*source, TranscribeError::MalformedInput { ref path, .. }
                    if path == "mei/music/body/mdiv/score/scoreDef/staffGrp"),
                "unexpected error {source}"
            );
        }
        other => panic!("Should be located in the file, got {other}"),
    }
    // nothing written
    assert!(!output_dir.join("no-staffgrp-dipl.mei").exists());
}
