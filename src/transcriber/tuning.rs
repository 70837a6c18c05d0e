use crate::parser::primitive_parser::{parse_token, parse_tuning_code};
use crate::parser::tab_parser::COURSE_COUNT;
use crate::transcriber::key::{Accidental, Letter};
use std::fmt;
use std::str::FromStr;

/// MIDI note number
pub type MidiPitch = i32;

/// Open courses of a lute in G, highest course first
pub const G_OPEN_COURSES: [MidiPitch; COURSE_COUNT as usize] = [67, 62, 57, 53, 48, 43];

/// Semitones an Abzug lowers the sixth course
pub const ABZUG_INTERVAL: MidiPitch = 2;

/// Notated course: letter, accidental and octave.
pub type CoursePitch = (Letter, Accidental, i32);

const F_COURSES: [CoursePitch; 6] = [
    (Letter::F, Accidental::None, 4),
    (Letter::C, Accidental::None, 4),
    (Letter::G, Accidental::None, 3),
    (Letter::E, Accidental::Flat, 3),
    (Letter::B, Accidental::Flat, 2),
    (Letter::F, Accidental::None, 2),
];

const G_COURSES: [CoursePitch; 6] = [
    (Letter::G, Accidental::None, 4),
    (Letter::D, Accidental::None, 4),
    (Letter::A, Accidental::None, 3),
    (Letter::F, Accidental::None, 3),
    (Letter::C, Accidental::None, 3),
    (Letter::G, Accidental::None, 2),
];

const A_COURSES: [CoursePitch; 6] = [
    (Letter::A, Accidental::None, 4),
    (Letter::E, Accidental::None, 4),
    (Letter::B, Accidental::None, 3),
    (Letter::G, Accidental::None, 3),
    (Letter::D, Accidental::None, 3),
    (Letter::A, Accidental::None, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningRoot {
    F,
    G,
    A,
}

impl TuningRoot {
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'F' => Some(TuningRoot::F),
            'G' => Some(TuningRoot::G),
            'A' => Some(TuningRoot::A),
            _ => None,
        }
    }

    /// Semitone shift relative to the G tuning
    pub const fn shift(self) -> MidiPitch {
        match self {
            TuningRoot::F => -2,
            TuningRoot::G => 0,
            TuningRoot::A => 2,
        }
    }

    const fn letter(self) -> char {
        match self {
            TuningRoot::F => 'F',
            TuningRoot::G => 'G',
            TuningRoot::A => 'A',
        }
    }
}

/// Six-course lute tuning, identified by codes such as `G` or `G-` (Abzug).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub root: TuningRoot,
    pub abzug: bool,
}

impl Default for Tuning {
    fn default() -> Self {
        Self::new(TuningRoot::G, false)
    }
}

impl Tuning {
    pub const fn new(root: TuningRoot, abzug: bool) -> Self {
        Self { root, abzug }
    }

    /// Sounding pitch of an open course; `course` is 1-based.
    pub fn open_course(&self, course: u8) -> MidiPitch {
        let index = usize::from(course.clamp(1, COURSE_COUNT) - 1);
        let mut pitch = G_OPEN_COURSES[index];
        if self.abzug && course == COURSE_COUNT {
            pitch -= ABZUG_INTERVAL;
        }
        pitch + self.root.shift()
    }

    /// Sounding pitch of `fret` stopped on `course`.
    pub fn map(&self, course: u8, fret: u16) -> MidiPitch {
        self.open_course(course) + MidiPitch::from(fret)
    }

    /// Notated open courses, highest course first
    pub fn courses(&self) -> [CoursePitch; 6] {
        let mut courses = match self.root {
            TuningRoot::F => F_COURSES,
            TuningRoot::G => G_COURSES,
            TuningRoot::A => A_COURSES,
        };
        if self.abzug {
            courses[5] = match self.root {
                TuningRoot::F => (Letter::E, Accidental::Flat, 2),
                TuningRoot::G => (Letter::F, Accidental::None, 2),
                TuningRoot::A => (Letter::G, Accidental::None, 2),
            };
        }
        courses
    }
}

impl FromStr for Tuning {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_token(parse_tuning_code, s)
            .ok_or_else(|| format!("unknown tuning '{s}', expected one of F, F-, G, G-, A, A-"))
    }
}

impl fmt::Display for Tuning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root.letter())?;
        if self.abzug {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// MIDI octave of a pitch; MIDI 60 (C4) is in octave 4.
pub const fn octave(pitch: MidiPitch) -> i32 {
    pitch.div_euclid(12) - 1
}
