use crate::transcriber::key::KeySignature;
use crate::transcriber::tuning::Tuning;
use std::fmt;
use std::str::FromStr;

/// Number of notehead staves written above the tablature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StaffStyle {
    /// One treble staff sounding an octave lower
    #[default]
    Single,
    /// Treble and bass staves split at middle C
    Double,
}

impl StaffStyle {
    pub const fn staff_count(self) -> usize {
        match self {
            StaffStyle::Single => 1,
            StaffStyle::Double => 2,
        }
    }
}

impl FromStr for StaffStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" | "s" => Ok(StaffStyle::Single),
            "double" | "d" => Ok(StaffStyle::Double),
            other => Err(format!("unknown staff style '{other}', expected single or double")),
        }
    }
}

/// Tablature notation subtype written on the retained tablature staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotationType {
    #[default]
    French,
    Italian,
    Spanish,
    German,
}

impl NotationType {
    const ALL: [NotationType; 4] = [
        NotationType::French,
        NotationType::Italian,
        NotationType::Spanish,
        NotationType::German,
    ];

    pub const fn code(self) -> &'static str {
        match self {
            NotationType::French => "FLT",
            NotationType::Italian => "ILT",
            NotationType::Spanish => "SLT",
            NotationType::German => "GLT",
        }
    }

    /// MEI `staffDef@notationtype`
    pub const fn mei_value(self) -> &'static str {
        match self {
            NotationType::French => "tab.lute.french",
            NotationType::Italian => "tab.lute.italian",
            NotationType::Spanish => "tab.lute.spanish",
            NotationType::German => "tab.lute.german",
        }
    }
}

impl FromStr for NotationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tablature type '{s}', expected FLT, ILT, SLT or GLT"))
    }
}

impl fmt::Display for NotationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Options of one transcription, fixed for the whole score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub tuning: Tuning,
    pub key: KeySignature,
    pub staff: StaffStyle,
    /// Keep the tablature staff below the noteheads
    pub keep_tab: bool,
    pub notation: NotationType,
    /// Group short notes into beams
    pub beams: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            key: KeySignature::default(),
            staff: StaffStyle::default(),
            keep_tab: true,
            notation: NotationType::default(),
            beams: true,
        }
    }
}

impl Settings {
    /// Amount added to the tablature staff number
    pub const fn tab_staff_shift(&self) -> usize {
        self.staff.staff_count()
    }
}
