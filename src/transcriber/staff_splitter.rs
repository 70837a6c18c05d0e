use crate::parser::tab_parser::{
    CoursePosition, EventId, QuarterLength, TabDuration, TabEvent, TabEventKind,
};
use crate::transcriber::accidentals::AccidentalState;
use crate::transcriber::settings::StaffStyle;
use crate::transcriber::speller::{PitchSpelling, SpellingClient};
use crate::transcriber::tuning::{MidiPitch, Tuning};
use crate::TranscribeError;

/// Lowest pitch written on the upper of two staves
pub const MIDDLE_C: MidiPitch = 60;

/// SMuFL glyph written once per augmentation dot
pub const AUGMENTATION_DOT_GLYPH: &str = "augmentationDot";

/// SMuFL glyph of a tablature duration flag
pub const fn duration_glyph(duration: TabDuration) -> Option<&'static str> {
    match duration {
        TabDuration::Breve => Some("luteDurationDoubleWhole"),
        TabDuration::Value(1) => Some("luteDurationWhole"),
        TabDuration::Value(2) => Some("luteDurationHalf"),
        TabDuration::Value(4) => Some("luteDurationQuarter"),
        TabDuration::Value(8) => Some("luteDuration8th"),
        TabDuration::Value(16) => Some("luteDuration16th"),
        TabDuration::Value(32) => Some("luteDuration32nd"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotatedNote {
    pub pitch: MidiPitch,
    pub spelling: PitchSpelling,
}

/// Entry of a notehead staff, one per tablature group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotatedEvent {
    Chord {
        id: String,
        duration: TabDuration,
        dots: u8,
        notes: Vec<NotatedNote>,
    },
    Rest {
        id: String,
        duration: TabDuration,
        dots: u8,
    },
    /// Invisible filler for a group whose notes all sit on the other staff
    Space {
        id: String,
        duration: TabDuration,
        dots: u8,
    },
}

impl NotatedEvent {
    pub fn id(&self) -> &str {
        match self {
            NotatedEvent::Chord { id, .. }
            | NotatedEvent::Rest { id, .. }
            | NotatedEvent::Space { id, .. } => id,
        }
    }

    pub const fn duration(&self) -> TabDuration {
        match self {
            NotatedEvent::Chord { duration, .. }
            | NotatedEvent::Rest { duration, .. }
            | NotatedEvent::Space { duration, .. } => *duration,
        }
    }

    pub const fn dots(&self) -> u8 {
        match self {
            NotatedEvent::Chord { dots, .. }
            | NotatedEvent::Rest { dots, .. }
            | NotatedEvent::Space { dots, .. } => *dots,
        }
    }

    pub fn quarter_length(&self) -> QuarterLength {
        self.duration().quarter_length(self.dots())
    }

    pub const fn is_note(&self) -> bool {
        matches!(self, NotatedEvent::Chord { .. })
    }
}

/// Duration flag printed above the notehead staves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Identifier of the anchoring event, without `#`
    pub start_id: String,
    pub glyphs: Vec<&'static str>,
}

/// Notehead content of one measure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotatedMeasure {
    pub upper: Vec<NotatedEvent>,
    /// Present only for double staves
    pub lower: Option<Vec<NotatedEvent>>,
    pub directives: Vec<Directive>,
}

impl NotatedMeasure {
    /// Staves from top to bottom
    pub fn staves(&self) -> impl Iterator<Item = &Vec<NotatedEvent>> {
        std::iter::once(&self.upper).chain(self.lower.as_ref())
    }
}

/// Converts tablature groups into notehead staves.
#[derive(Debug, Clone, Copy)]
pub struct StaffSplitter {
    tuning: Tuning,
    style: StaffStyle,
}

impl StaffSplitter {
    pub const fn new(tuning: Tuning, style: StaffStyle) -> Self {
        Self { tuning, style }
    }

    /// Transcribe the groups of one measure.
    ///
    /// A fresh accidental state is used for the measure and shared by both
    /// staves.
    pub fn split(
        &self,
        events: &[TabEvent],
        client: &mut SpellingClient,
        measure: usize,
    ) -> Result<NotatedMeasure, TranscribeError> {
        let mut state = AccidentalState::new_for_measure();
        let mut notated = NotatedMeasure {
            lower: match self.style {
                StaffStyle::Single => None,
                StaffStyle::Double => Some(Vec::with_capacity(events.len())),
            },
            ..Default::default()
        };
        for event in events {
            let mut directive = flag_directive(event, measure)?;
            let (upper, lower) = match &event.kind {
                TabEventKind::Rest => (
                    rest(event, event.id.to_string()),
                    Some(rest(event, event.id.lower())),
                ),
                TabEventKind::Chord(positions) => {
                    let notes = self.spell_chord(positions, event.id, client, &mut state, measure)?;
                    match self.style {
                        StaffStyle::Single => (chord(event, event.id.to_string(), notes), None),
                        StaffStyle::Double => {
                            let (high, low): (Vec<_>, Vec<_>) =
                                notes.into_iter().partition(|note| note.pitch >= MIDDLE_C);
                            let upper = if high.is_empty() {
                                if let Some(directive) = directive.as_mut() {
                                    directive.start_id = event.id.space();
                                }
                                space(event)
                            } else {
                                chord(event, event.id.to_string(), high)
                            };
                            let lower = if low.is_empty() {
                                space(event)
                            } else {
                                chord(event, event.id.lower(), low)
                            };
                            (upper, Some(lower))
                        }
                    }
                }
            };
            notated.upper.push(upper);
            if let (Some(staff), Some(lower)) = (notated.lower.as_mut(), lower) {
                staff.push(lower);
            }
            notated.directives.extend(directive);
        }
        log::debug!(
            "Measure {measure}: {} events, {} directives",
            notated.upper.len(),
            notated.directives.len()
        );
        Ok(notated)
    }

    fn spell_chord(
        &self,
        positions: &[CoursePosition],
        id: EventId,
        client: &mut SpellingClient,
        state: &mut AccidentalState,
        measure: usize,
    ) -> Result<Vec<NotatedNote>, TranscribeError> {
        positions
            .iter()
            .map(|position| {
                let pitch = self.tuning.map(position.course, position.fret);
                let spelling = client.spell(pitch, state).map_err(|e| {
                    TranscribeError::SpellingUnavailable {
                        measure,
                        event: id.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(NotatedNote { pitch, spelling })
            })
            .collect()
    }
}

fn flag_directive(event: &TabEvent, measure: usize) -> Result<Option<Directive>, TranscribeError> {
    if !event.flagged {
        return Ok(None);
    }
    let glyph = duration_glyph(event.duration).ok_or_else(|| {
        TranscribeError::UnsupportedDuration {
            measure,
            event: event.id.to_string(),
            token: event.duration.token(),
        }
    })?;
    let mut glyphs = vec![glyph];
    glyphs.extend(std::iter::repeat(AUGMENTATION_DOT_GLYPH).take(usize::from(event.dots)));
    Ok(Some(Directive {
        start_id: event.id.to_string(),
        glyphs,
    }))
}

fn chord(event: &TabEvent, id: String, notes: Vec<NotatedNote>) -> NotatedEvent {
    NotatedEvent::Chord {
        id,
        duration: event.duration,
        dots: event.dots,
        notes,
    }
}

fn rest(event: &TabEvent, id: String) -> NotatedEvent {
    NotatedEvent::Rest {
        id,
        duration: event.duration,
        dots: event.dots,
    }
}

fn space(event: &TabEvent) -> NotatedEvent {
    NotatedEvent::Space {
        id: event.id.space(),
        duration: event.duration,
        dots: event.dots,
    }
}
