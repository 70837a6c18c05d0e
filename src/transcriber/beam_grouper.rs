use crate::error::CollaboratorError;
use crate::parser::tab_parser::QuarterLength;
use crate::transcriber::external::call_json_line;
use crate::transcriber::staff_splitter::NotatedEvent;
use crate::TranscribeError;
use num_rational::Ratio;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Meter used to find beat groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub count: u32,
    pub unit: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl TimeSignature {
    pub const fn new(count: u32, unit: u32) -> Self {
        Self { count, unit }
    }

    /// Meter whose measure spans `length`, over 4 or a finer power of two:
    /// 3 quarters give 3/4, 3.5 quarters give 7/8.
    pub fn from_measure_length(length: QuarterLength) -> Option<Self> {
        if *length.numer() == 0 {
            return None;
        }
        let count = *length.numer();
        let unit = length.denom().checked_mul(4)?;
        Some(Self::new(count, unit))
    }

    pub fn beat_length(&self) -> QuarterLength {
        Ratio::new(4, self.unit.max(1))
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.count, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamFlag {
    None,
    Start,
    Continue,
    Stop,
}

impl BeamFlag {
    const fn name(self) -> &'static str {
        match self {
            BeamFlag::None => "none",
            BeamFlag::Start => "start",
            BeamFlag::Continue => "continue",
            BeamFlag::Stop => "stop",
        }
    }
}

impl fmt::Display for BeamFlag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One entry handed to a beam classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamInput {
    pub duration: QuarterLength,
    pub rest: bool,
}

/// Classifies note durations into beam flags, one flag per non-rest entry.
pub trait BeamClassifier {
    fn classify(
        &mut self,
        meter: TimeSignature,
        entries: &[BeamInput],
    ) -> Result<Vec<BeamFlag>, CollaboratorError>;
}

/// In-process beam classifier.
///
/// Notes shorter than a quarter are beamed with their neighbours while they
/// stay inside the same beat group; rests break runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceBeamClassifier;

impl ReferenceBeamClassifier {
    /// Length of a beat group in quarter notes
    pub fn group_length(meter: TimeSignature) -> QuarterLength {
        let beat = meter.beat_length();
        match (meter.count, meter.unit) {
            (4, 4) => Ratio::from_integer(2),
            // compound meters and 3/8 group by three beats
            (count, unit) if unit >= 8 && count % 3 == 0 => beat * 3,
            (_, unit) if unit >= 8 => Ratio::from_integer(1),
            _ => beat,
        }
    }
}

impl BeamClassifier for ReferenceBeamClassifier {
    fn classify(
        &mut self,
        meter: TimeSignature,
        entries: &[BeamInput],
    ) -> Result<Vec<BeamFlag>, CollaboratorError> {
        let group_length = Self::group_length(meter);
        let quarter = Ratio::from_integer(1);
        let mut flags = Vec::with_capacity(entries.len());
        let mut run: Vec<usize> = Vec::new();
        let mut run_group = None;
        let mut position = Ratio::from_integer(0);

        for entry in entries {
            let start = position;
            position += entry.duration;
            if entry.rest {
                close_run(&mut flags, &mut run);
                continue;
            }
            let group = (start / group_length).to_integer();
            let inside = position <= group_length * (group + 1);
            flags.push(BeamFlag::None);
            if entry.duration < quarter && inside {
                if run_group != Some(group) {
                    close_run(&mut flags, &mut run);
                }
                run.push(flags.len() - 1);
                run_group = Some(group);
            } else {
                close_run(&mut flags, &mut run);
            }
        }
        close_run(&mut flags, &mut run);
        Ok(flags)
    }
}

fn close_run(flags: &mut [BeamFlag], run: &mut Vec<usize>) {
    if let [first, middle @ .., last] = run.as_slice() {
        flags[*first] = BeamFlag::Start;
        for index in middle {
            flags[*index] = BeamFlag::Continue;
        }
        flags[*last] = BeamFlag::Stop;
    }
    run.clear();
}

#[derive(Debug, Serialize)]
struct BeamRequest {
    meter: [u32; 2],
    events: Vec<BeamRequestEvent>,
}

#[derive(Debug, Serialize)]
struct BeamRequestEvent {
    duration: [u32; 2],
    rest: bool,
}

#[derive(Debug, Deserialize)]
struct BeamReply {
    beams: Vec<BeamFlag>,
}

impl BeamRequest {
    fn new(meter: TimeSignature, entries: &[BeamInput]) -> Self {
        Self {
            meter: [meter.count, meter.unit],
            events: entries
                .iter()
                .map(|entry| BeamRequestEvent {
                    duration: [*entry.duration.numer(), *entry.duration.denom()],
                    rest: entry.rest,
                })
                .collect(),
        }
    }
}

/// Beam classifier running as an external process, one JSON line per call.
#[derive(Debug, Clone)]
pub struct ProcessBeamClassifier {
    command: Vec<String>,
}

impl ProcessBeamClassifier {
    pub const fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl BeamClassifier for ProcessBeamClassifier {
    fn classify(
        &mut self,
        meter: TimeSignature,
        entries: &[BeamInput],
    ) -> Result<Vec<BeamFlag>, CollaboratorError> {
        let reply: BeamReply = call_json_line(&self.command, &BeamRequest::new(meter, entries))?;
        Ok(reply.beams)
    }
}

/// Content of a notehead layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerItem {
    Event(NotatedEvent),
    Beam(Vec<NotatedEvent>),
    /// Whole-measure rest replacing the staff's only rest
    MeasureRest { id: String },
}

/// Groups the events of a notehead staff into beams.
pub struct BeamGrouper<'a> {
    classifier: &'a mut dyn BeamClassifier,
    enabled: bool,
}

impl<'a> BeamGrouper<'a> {
    pub fn new(classifier: &'a mut dyn BeamClassifier, enabled: bool) -> Self {
        Self {
            classifier,
            enabled,
        }
    }

    pub fn group(
        &mut self,
        events: Vec<NotatedEvent>,
        meter: TimeSignature,
        measure: usize,
    ) -> Result<Vec<LayerItem>, TranscribeError> {
        if let [NotatedEvent::Rest { id, .. }] = events.as_slice() {
            return Ok(vec![LayerItem::MeasureRest { id: id.clone() }]);
        }
        let note_count = events.iter().filter(|e| e.is_note()).count();
        if !self.enabled || note_count == 0 {
            return Ok(events.into_iter().map(LayerItem::Event).collect());
        }

        let entries: Vec<BeamInput> = events
            .iter()
            .map(|event| BeamInput {
                duration: event.quarter_length(),
                rest: !event.is_note(),
            })
            .collect();
        let flags = self
            .classifier
            .classify(meter, &entries)
            .map_err(|e| TranscribeError::BeamingUnavailable {
                measure,
                reason: e.to_string(),
            })?;
        if flags.len() != note_count {
            return Err(TranscribeError::BeamAlignmentMismatch {
                measure,
                reason: format!("{} flags for {note_count} notes", flags.len()),
            });
        }
        thread_flags(events, flags, measure)
    }
}

/// Re-attach flags to the notes they were computed for, by position.
fn thread_flags(
    events: Vec<NotatedEvent>,
    flags: Vec<BeamFlag>,
    measure: usize,
) -> Result<Vec<LayerItem>, TranscribeError> {
    let mut flags = flags.into_iter();
    let mut items = Vec::with_capacity(events.len());
    let mut open: Option<Vec<NotatedEvent>> = None;
    for event in events {
        if !event.is_note() {
            match open.as_mut() {
                Some(beam) => beam.push(event),
                None => items.push(LayerItem::Event(event)),
            }
            continue;
        }
        let Some(flag) = flags.next() else {
            return Err(mismatch(measure, "ran out of flags"));
        };
        match (flag, open.take()) {
            (BeamFlag::None, None) => items.push(LayerItem::Event(event)),
            (BeamFlag::Start, None) => open = Some(vec![event]),
            (BeamFlag::Continue, Some(mut beam)) => {
                beam.push(event);
                open = Some(beam);
            }
            (BeamFlag::Stop, Some(mut beam)) => {
                beam.push(event);
                items.push(LayerItem::Beam(beam));
            }
            (flag, _) => {
                return Err(mismatch(
                    measure,
                    format!("unexpected '{flag}' at {}", event.id()),
                ))
            }
        }
    }
    if open.is_some() {
        return Err(mismatch(measure, "beam not closed"));
    }
    Ok(items)
}

fn mismatch(measure: usize, reason: impl Into<String>) -> TranscribeError {
    TranscribeError::BeamAlignmentMismatch {
        measure,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tab_parser::TabDuration;
    use BeamFlag::{Continue, None as NoBeam, Start, Stop};

    fn entries(lengths: &[(u32, u32, bool)]) -> Vec<BeamInput> {
        lengths
            .iter()
            .map(|(n, d, rest)| BeamInput {
                duration: Ratio::new(*n, *d),
                rest: *rest,
            })
            .collect()
    }

    fn classify(meter: TimeSignature, lengths: &[(u32, u32, bool)]) -> Vec<BeamFlag> {
        ReferenceBeamClassifier
            .classify(meter, &entries(lengths))
            .unwrap()
    }

    fn chord(id: &str, denominator: u16) -> NotatedEvent {
        NotatedEvent::Chord {
            id: id.to_string(),
            duration: TabDuration::Value(denominator),
            dots: 0,
            notes: vec![],
        }
    }

    fn rest(id: &str, denominator: u16) -> NotatedEvent {
        NotatedEvent::Rest {
            id: id.to_string(),
            duration: TabDuration::Value(denominator),
            dots: 0,
        }
    }

    /// Classifier replying with a fixed answer.
    struct Scripted(Result<Vec<BeamFlag>, ()>);

    impl BeamClassifier for Scripted {
        fn classify(
            &mut self,
            _meter: TimeSignature,
            _entries: &[BeamInput],
        ) -> Result<Vec<BeamFlag>, CollaboratorError> {
            self.0
                .clone()
                .map_err(|()| CollaboratorError::Reply("no beams today".to_string()))
        }
    }

    #[test]
    fn test_four_eighths_in_one_group() {
        let flags = classify(TimeSignature::new(2, 4), &[(1, 2, false); 4]);
        assert_eq!(flags, vec![Start, Stop, Start, Stop]);
        let flags = classify(TimeSignature::new(4, 4), &[(1, 2, false); 4]);
        assert_eq!(flags, vec![Start, Continue, Continue, Stop]);
    }

    #[test]
    fn test_common_time_quarters_unbeamed() {
        let flags = classify(
            TimeSignature::new(4, 4),
            &[
                (1, 2, false),
                (1, 2, false),
                (1, 2, false),
                (1, 2, false),
                (1, 1, false),
                (1, 1, false),
            ],
        );
        assert_eq!(flags, vec![Start, Continue, Continue, Stop, NoBeam, NoBeam]);
    }

    #[test]
    fn test_lone_eighth_between_rests() {
        let flags = classify(
            TimeSignature::new(3, 4),
            &[(1, 2, true), (1, 2, false), (1, 2, true), (1, 1, false)],
        );
        assert_eq!(flags, vec![NoBeam, NoBeam]);
    }

    #[test]
    fn test_compound_meter_groups() {
        assert_eq!(
            ReferenceBeamClassifier::group_length(TimeSignature::new(6, 8)),
            Ratio::new(3, 2)
        );
        assert_eq!(
            ReferenceBeamClassifier::group_length(TimeSignature::new(3, 8)),
            Ratio::new(3, 2)
        );
        assert_eq!(
            ReferenceBeamClassifier::group_length(TimeSignature::new(7, 8)),
            Ratio::from_integer(1)
        );
        assert_eq!(
            ReferenceBeamClassifier::group_length(TimeSignature::new(3, 2)),
            Ratio::from_integer(2)
        );
        let flags = classify(TimeSignature::new(6, 8), &[(1, 2, false); 6]);
        assert_eq!(flags, vec![Start, Continue, Stop, Start, Continue, Stop]);
    }

    #[test]
    fn test_note_across_group_boundary() {
        // the dotted eighth crosses the beat
        let flags = classify(
            TimeSignature::new(2, 4),
            &[(1, 2, false), (3, 4, false), (1, 4, false), (1, 2, false)],
        );
        assert_eq!(flags, vec![NoBeam, NoBeam, Start, Stop]);
    }

    #[test]
    fn test_time_signature_from_length() {
        assert_eq!(
            TimeSignature::from_measure_length(Ratio::new(7, 2)),
            Some(TimeSignature::new(7, 8))
        );
        assert_eq!(
            TimeSignature::from_measure_length(Ratio::from_integer(3)),
            Some(TimeSignature::new(3, 4))
        );
        assert_eq!(
            TimeSignature::from_measure_length(Ratio::new(9, 4)),
            Some(TimeSignature::new(9, 16))
        );
        assert_eq!(TimeSignature::from_measure_length(Ratio::from_integer(0)), None);
    }

    #[test]
    fn test_measure_rest_bypasses_classifier() {
        let mut classifier = Scripted(Err(()));
        let mut grouper = BeamGrouper::new(&mut classifier, true);
        let items = grouper
            .group(vec![rest("e5", 2)], TimeSignature::default(), 3)
            .unwrap();
        assert_eq!(items, vec![LayerItem::MeasureRest { id: "e5".to_string() }]);
    }

    #[test]
    fn test_group_threads_flags() {
        let mut classifier = ReferenceBeamClassifier;
        let mut grouper = BeamGrouper::new(&mut classifier, true);
        let events = vec![
            chord("e1", 8),
            chord("e2", 8),
            chord("e3", 4),
            rest("e4", 4),
            chord("e5", 4),
        ];
        let items = grouper
            .group(events.clone(), TimeSignature::new(4, 4), 1)
            .unwrap();
        assert_eq!(
            items,
            vec![
                LayerItem::Beam(vec![events[0].clone(), events[1].clone()]),
                LayerItem::Event(events[2].clone()),
                LayerItem::Event(events[3].clone()),
                LayerItem::Event(events[4].clone()),
            ]
        );
    }

    #[test]
    fn test_disabled_grouper_keeps_events() {
        let mut classifier = Scripted(Err(()));
        let mut grouper = BeamGrouper::new(&mut classifier, false);
        let events = vec![chord("e1", 8), chord("e2", 8)];
        let items = grouper
            .group(events.clone(), TimeSignature::default(), 1)
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], LayerItem::Event(events[0].clone()));
    }

    #[test]
    fn test_rest_inside_beam() {
        let mut classifier = Scripted(Ok(vec![Start, Stop]));
        let mut grouper = BeamGrouper::new(&mut classifier, true);
        let events = vec![chord("e1", 16), rest("e2", 16), chord("e3", 16)];
        let items = grouper
            .group(events.clone(), TimeSignature::default(), 1)
            .unwrap();
        assert_eq!(items, vec![LayerItem::Beam(events)]);
    }

    #[test]
    fn test_alignment_mismatch() {
        let events = vec![chord("e1", 8), chord("e2", 8)];
        for reply in [vec![Start], vec![Stop, Start], vec![Start, Continue], vec![Start, NoBeam]] {
            let mut classifier = Scripted(Ok(reply));
            let mut grouper = BeamGrouper::new(&mut classifier, true);
            let err = grouper
                .group(events.clone(), TimeSignature::default(), 6)
                .unwrap_err();
            assert!(matches!(
                err,
                TranscribeError::BeamAlignmentMismatch { measure: 6, .. }
            ));
        }
    }

    #[test]
    fn test_classifier_failure() {
        let mut classifier = Scripted(Err(()));
        let mut grouper = BeamGrouper::new(&mut classifier, true);
        let err = grouper
            .group(vec![chord("e1", 8)], TimeSignature::default(), 2)
            .unwrap_err();
        assert!(matches!(err, TranscribeError::BeamingUnavailable { measure: 2, .. }));
    }

    #[test]
    fn test_request_wire_format() {
        let request = BeamRequest::new(TimeSignature::new(3, 4), &entries(&[(3, 4, false), (1, 1, true)]));
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"meter":[3,4],"events":[{"duration":[3,4],"rest":false},{"duration":[1,1],"rest":true}]}"#
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_process_classifier() {
        let mut classifier = ProcessBeamClassifier::new(vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"read -r line; echo '{"beams":["start","stop"]}'"#.to_string(),
        ]);
        let flags = classifier
            .classify(TimeSignature::default(), &entries(&[(1, 2, false), (1, 2, false)]))
            .unwrap();
        assert_eq!(flags, vec![Start, Stop]);
    }
}
