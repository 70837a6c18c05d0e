use crate::parser::mei_tree::Element;
use crate::parser::primitive_parser::{parse_duration, parse_token, parse_unsigned};
use crate::TranscribeError;
use num_rational::Ratio;
use std::fmt;

/// Number of courses a tuning defines
pub const COURSE_COUNT: u8 = 6;

/// Shortest supported denominator
pub const MAX_DENOMINATOR: u32 = 128;

/// Most augmentation dots a group may carry
pub const MAX_DOTS: u8 = 4;

/// Exact duration counted in quarter notes
pub type QuarterLength = Ratio<u32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabDuration {
    Long,
    Breve,
    /// Power-of-two denominator: 1 whole, 2 half, 4 quarter...
    Value(u16),
}

impl TabDuration {
    pub fn from_denominator(denominator: u32) -> Option<Self> {
        if denominator.is_power_of_two() && denominator <= MAX_DENOMINATOR {
            u16::try_from(denominator).ok().map(TabDuration::Value)
        } else {
            None
        }
    }

    /// Undotted length in quarter notes.
    pub fn base_length(&self) -> QuarterLength {
        match self {
            TabDuration::Long => Ratio::from_integer(16),
            TabDuration::Breve => Ratio::from_integer(8),
            TabDuration::Value(d) => Ratio::new(4, u32::from(*d)),
        }
    }

    /// Length in quarter notes with `dots` augmentation dots.
    pub fn quarter_length(&self, dots: u8) -> QuarterLength {
        let base = self.base_length();
        // each dot adds half of the previous addition
        let scale = 1u32 << dots;
        base * Ratio::new(2 * scale - 1, scale)
    }

    /// Value of the MEI `@dur` attribute
    pub fn token(&self) -> String {
        match self {
            TabDuration::Long => "long".to_string(),
            TabDuration::Breve => "breve".to_string(),
            TabDuration::Value(d) => d.to_string(),
        }
    }
}

/// Event identifier drawn from the document-wide counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u32);

impl EventId {
    /// Identifier of the event's counterpart on the lower notehead staff
    pub fn lower(&self) -> String {
        format!("{self}_lwr")
    }

    /// Identifier of a space filling in for the event
    pub fn space(&self) -> String {
        format!("{self}_spc")
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Monotonic event counter, never reset between measures.
#[derive(Debug)]
pub struct EventCounter {
    next: u32,
}

impl Default for EventCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl EventCounter {
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoursePosition {
    pub course: u8,
    /// not bounded by any instrument fret count
    pub fret: u16,
}

impl CoursePosition {
    pub const fn new(course: u8, fret: u16) -> Self {
        Self { course, fret }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEventKind {
    Chord(Vec<CoursePosition>),
    Rest,
}

/// One tablature group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabEvent {
    pub id: EventId,
    pub duration: TabDuration,
    pub dots: u8,
    pub kind: TabEventKind,
    /// whether the group carries a tablature duration sign
    pub flagged: bool,
}

impl TabEvent {
    pub fn quarter_length(&self) -> QuarterLength {
        self.duration.quarter_length(self.dots)
    }
}

/// Read the tablature groups of a tablature `<layer>`, in document order.
pub fn parse_tab_layer(
    layer: &Element,
    counter: &mut EventCounter,
    measure: usize,
    path: &str,
) -> Result<Vec<TabEvent>, TranscribeError> {
    let groups = layer.descendants_named("tabGrp");
    log::debug!("Parsing {} tab groups in measure {measure}", groups.len());
    groups
        .into_iter()
        .map(|group| parse_tab_group(group, counter.next_id(), measure, path))
        .collect()
}

fn parse_tab_group(
    group: &Element,
    id: EventId,
    measure: usize,
    path: &str,
) -> Result<TabEvent, TranscribeError> {
    let path = format!("{path}/tabGrp[{id}]");
    let token = group
        .attr("dur")
        .ok_or_else(|| TranscribeError::malformed(&path, "missing @dur"))?;
    let duration = parse_token(parse_duration, token).ok_or_else(|| {
        TranscribeError::UnsupportedDuration {
            measure,
            event: id.to_string(),
            token: token.to_string(),
        }
    })?;
    let dots = match group.attr("dots") {
        Some(dots) => parse_number::<u8>(dots, &path, "dots")?,
        None => 0,
    };
    if dots > MAX_DOTS {
        return Err(TranscribeError::malformed(
            &path,
            format!("{dots} dots exceed {MAX_DOTS}"),
        ));
    }
    let flagged = group.child("tabDurSym").is_some();
    let positions = group
        .children_named("note")
        .map(|note| parse_course_position(note, &path))
        .collect::<Result<Vec<_>, _>>()?;
    let kind = if positions.is_empty() {
        TabEventKind::Rest
    } else {
        TabEventKind::Chord(positions)
    };
    Ok(TabEvent {
        id,
        duration,
        dots,
        kind,
        flagged,
    })
}

fn parse_course_position(note: &Element, path: &str) -> Result<CoursePosition, TranscribeError> {
    let path = format!("{path}/note");
    let course = note
        .attr("tab.course")
        .ok_or_else(|| TranscribeError::malformed(&path, "missing @tab.course"))?;
    let course: u8 = parse_number(course, &path, "tab.course")?;
    if !(1..=COURSE_COUNT).contains(&course) {
        return Err(TranscribeError::malformed(
            &path,
            format!("course {course} outside 1..={COURSE_COUNT}"),
        ));
    }
    let fret = note
        .attr("tab.fret")
        .ok_or_else(|| TranscribeError::malformed(&path, "missing @tab.fret"))?;
    let fret: u16 = parse_number(fret, &path, "tab.fret")?;
    Ok(CoursePosition::new(course, fret))
}

fn parse_number<T: TryFrom<u32>>(
    value: &str,
    path: &str,
    attribute: &str,
) -> Result<T, TranscribeError> {
    parse_token(parse_unsigned, value)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| {
            TranscribeError::malformed(path, format!("invalid @{attribute} '{value}'"))
        })
}
