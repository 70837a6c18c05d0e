use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widest key signature, in accidentals
pub const MAX_KEY_ACCIDENTALS: i8 = 7;

/// Letters in the order sharps are added to a key signature
const SHARP_ORDER: [Letter; 7] = [
    Letter::F,
    Letter::C,
    Letter::G,
    Letter::D,
    Letter::A,
    Letter::E,
    Letter::B,
];

/// Major tonics along the circle of fifths, sharp side
const SHARP_TONICS: [Letter; 8] = [
    Letter::C,
    Letter::G,
    Letter::D,
    Letter::A,
    Letter::E,
    Letter::B,
    Letter::F,
    Letter::C,
];

/// Major tonics along the circle of fifths, flat side
const FLAT_TONICS: [Letter; 8] = [
    Letter::C,
    Letter::F,
    Letter::B,
    Letter::E,
    Letter::A,
    Letter::D,
    Letter::G,
    Letter::C,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    pub const fn index(self) -> usize {
        match self {
            Letter::C => 0,
            Letter::D => 1,
            Letter::E => 2,
            Letter::F => 3,
            Letter::G => 4,
            Letter::A => 5,
            Letter::B => 6,
        }
    }

    /// Pitch class of the unaltered letter
    pub const fn natural_pitch_class(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    /// Letter `steps` diatonic steps above (wrapping)
    pub const fn step(self, steps: usize) -> Self {
        Self::ALL[(self.index() + steps) % 7]
    }

    /// MEI `@pname`
    pub const fn name(self) -> &'static str {
        match self {
            Letter::C => "c",
            Letter::D => "d",
            Letter::E => "e",
            Letter::F => "f",
            Letter::G => "g",
            Letter::A => "a",
            Letter::B => "b",
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Written accidental; serialized with MEI `@accid` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Accidental {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "f")]
    Flat,
    #[serde(rename = "s")]
    Sharp,
    #[serde(rename = "n")]
    Natural,
}

impl Accidental {
    /// Written sign restating an absolute alteration of -1, 0 or +1 semitone
    pub const fn for_alteration(alteration: i32) -> Option<Self> {
        match alteration {
            -1 => Some(Accidental::Flat),
            0 => Some(Accidental::Natural),
            1 => Some(Accidental::Sharp),
            _ => None,
        }
    }

    /// MEI `@accid`, `None` when nothing is written
    pub const fn mei(self) -> Option<&'static str> {
        match self {
            Accidental::None => None,
            Accidental::Flat => Some("f"),
            Accidental::Sharp => Some("s"),
            Accidental::Natural => Some("n"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

impl Mode {
    pub const fn name(self) -> &'static str {
        match self {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" | "0" => Ok(Mode::Major),
            "minor" | "1" => Ok(Mode::Minor),
            other => Err(format!("unknown mode '{other}', expected major or minor")),
        }
    }
}

/// Key signature as a signed count of accidentals (negative for flats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySignature {
    pub accidentals: i8,
    pub mode: Mode,
}

impl KeySignature {
    pub fn new(accidentals: i8, mode: Mode) -> Result<Self, String> {
        if accidentals.unsigned_abs() > MAX_KEY_ACCIDENTALS.unsigned_abs() {
            return Err(format!(
                "key signature {accidentals} outside -{MAX_KEY_ACCIDENTALS}..={MAX_KEY_ACCIDENTALS}"
            ));
        }
        Ok(Self { accidentals, mode })
    }

    /// MEI `keySig@sig`: `2s`, `3f` or `0`
    pub fn mei_sig(&self) -> String {
        match self.accidentals {
            0 => "0".to_string(),
            n if n > 0 => format!("{n}s"),
            n => format!("{}f", n.unsigned_abs()),
        }
    }

    /// Alteration the signature applies to `letter`
    pub fn alteration(&self, letter: Letter) -> i32 {
        let count = usize::from(self.accidentals.unsigned_abs());
        if self.accidentals > 0 && SHARP_ORDER[..count].contains(&letter) {
            1
        } else if self.accidentals < 0 && SHARP_ORDER[7 - count..].contains(&letter) {
            -1
        } else {
            0
        }
    }

    pub fn tonic(&self) -> Letter {
        let count = usize::from(self.accidentals.unsigned_abs());
        let major = if self.accidentals >= 0 {
            SHARP_TONICS[count]
        } else {
            FLAT_TONICS[count]
        };
        match self.mode {
            Mode::Major => major,
            // relative minor, a third below
            Mode::Minor => major.step(5),
        }
    }

    /// Diatonic grids ordered from the tonic.
    pub fn grids(&self) -> KeyGrids {
        let tonic = self.tonic();
        let mut grids = KeyGrids::default();
        for degree in 0..7 {
            let letter = tonic.step(degree);
            let alteration = self.alteration(letter);
            grids.pc_grid[degree] = letter;
            grids.alt_grid[degree] = alteration;
            grids.mpc_grid[degree] = (letter.natural_pitch_class() + alteration).rem_euclid(12);
        }
        grids
    }
}

/// Diatonic pitch classes of a key with their letters and alterations, one
/// entry per scale degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGrids {
    pub mpc_grid: [i32; 7],
    pub alt_grid: [i32; 7],
    pub pc_grid: [Letter; 7],
}

impl Default for KeyGrids {
    fn default() -> Self {
        Self {
            mpc_grid: [0, 2, 4, 5, 7, 9, 11],
            alt_grid: [0; 7],
            pc_grid: Letter::ALL,
        }
    }
}

impl KeyGrids {
    /// Scale degree of a pitch class, `None` when chromatic
    pub fn degree_of(&self, pitch_class: i32) -> Option<usize> {
        let pitch_class = pitch_class.rem_euclid(12);
        self.mpc_grid.iter().position(|pc| *pc == pitch_class)
    }

    pub fn is_diatonic(&self, pitch_class: i32) -> bool {
        self.degree_of(pitch_class).is_some()
    }

    /// Alteration the key applies to `letter`
    pub fn alteration_of(&self, letter: Letter) -> i32 {
        self.pc_grid
            .iter()
            .position(|l| *l == letter)
            .map_or(0, |degree| self.alt_grid[degree])
    }

    /// The five pitch classes outside the key, ascending
    pub fn chromatic_pitch_classes(&self) -> impl Iterator<Item = i32> + '_ {
        (0..12).filter(|pc| !self.mpc_grid.contains(pc))
    }
}
