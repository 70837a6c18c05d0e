//! Lutescribe - diplomatic transcription of MEI lute tablature
//!
//! This library provides:
//! - Reading and writing of MEI score files
//! - Pitch mapping of tablature groups for the common lute tunings
//! - Pitch spelling with accidentals tracked per measure
//! - Notehead staves (single or double) with beams and duration flags
//!
//! # Example
//!
//! ```no_run
//! use lutescribe::{parse_mei, write_mei, ReferenceBeamClassifier, ReferenceSpeller, Settings, Transcriber};
//!
//! let data = std::fs::read("capirola.mei").unwrap();
//! let document = parse_mei(&data).unwrap();
//! let mut speller = ReferenceSpeller;
//! let mut classifier = ReferenceBeamClassifier;
//! let mut transcriber = Transcriber::new(Settings::default(), &mut speller, &mut classifier);
//! let transcribed = transcriber.transcribe(&document).unwrap();
//! println!("{}", write_mei(&transcribed).unwrap());
//! ```

pub mod error;
pub mod parser;
pub mod transcriber;

// Re-export main types for convenience
pub use error::{CollaboratorError, TranscribeError};
pub use parser::mei_tree::{parse_mei, parse_mei_str, write_mei, Element, MeiDocument, Node};
pub use transcriber::{
    beam_grouper::{
        BeamClassifier, BeamFlag, BeamInput, ProcessBeamClassifier, ReferenceBeamClassifier,
        TimeSignature,
    },
    external::split_command,
    key::{Accidental, KeySignature, Letter, Mode},
    output_path,
    settings::{NotationType, Settings, StaffStyle},
    speller::{ProcessSpeller, ReferenceSpeller, Speller, SpellingReply, SpellingRequest},
    transcribe_file,
    tuning::Tuning,
    Transcriber,
};
