use crate::error::CollaboratorError;
use crate::transcriber::accidentals::{AccidentalState, AlteredLetter};
use crate::transcriber::external::call_json_line;
use crate::transcriber::key::{Accidental, KeyGrids, KeySignature, Letter};
use crate::transcriber::tuning::{octave, MidiPitch};
use serde::{Deserialize, Serialize};

/// Pitch classes spelled flat rather than sharp in a key without accidentals
const FLAT_IN_C: [i32; 2] = [3, 10];

/// Request sent to a spelling oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellingRequest {
    pub pitch: MidiPitch,
    pub key: i8,
    pub mpc_grid: [i32; 7],
    pub alt_grid: [i32; 7],
    pub pc_grid: [Letter; 7],
    pub accids_in_effect: AccidentalState,
}

impl SpellingRequest {
    pub fn new(
        pitch: MidiPitch,
        key: &KeySignature,
        grids: &KeyGrids,
        state: AccidentalState,
    ) -> Self {
        Self {
            pitch,
            key: key.accidentals,
            mpc_grid: grids.mpc_grid,
            alt_grid: grids.alt_grid,
            pc_grid: grids.pc_grid,
            accids_in_effect: state,
        }
    }

    pub const fn grids(&self) -> KeyGrids {
        KeyGrids {
            mpc_grid: self.mpc_grid,
            alt_grid: self.alt_grid,
            pc_grid: self.pc_grid,
        }
    }
}

/// Oracle reply, adopted verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellingReply {
    pub pname: Letter,
    pub accid: Accidental,
    pub accids_in_effect: AccidentalState,
}

/// Enharmonic pitch-name resolution.
pub trait Speller {
    fn spell(&mut self, request: &SpellingRequest) -> Result<SpellingReply, CollaboratorError>;
}

/// In-process spelling oracle.
///
/// Diatonic pitches take their scale letter, restating the key's accidental
/// when an earlier alteration of the same letter is still in effect.
/// Chromatic pitches reuse a spelling already in effect, otherwise prefer a
/// natural sign, then sharps in sharp keys and flats in flat keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceSpeller;

impl Speller for ReferenceSpeller {
    fn spell(&mut self, request: &SpellingRequest) -> Result<SpellingReply, CollaboratorError> {
        let grids = request.grids();
        let mut state = request.accids_in_effect;
        let pitch_class = request.pitch.rem_euclid(12);

        let (pname, accid) = if let Some(degree) = grids.degree_of(pitch_class) {
            let letter = grids.pc_grid[degree];
            if state.clear_letter(letter) {
                let restated = Accidental::for_alteration(grids.alt_grid[degree])
                    .ok_or_else(|| CollaboratorError::Reply("key alteration out of range".into()))?;
                (letter, restated)
            } else {
                (letter, Accidental::None)
            }
        } else {
            let slot = AccidentalState::slot_for(pitch_class, &grids).ok_or_else(|| {
                CollaboratorError::Reply(format!("no accidental slot for pitch class {pitch_class}"))
            })?;
            if let Some(held) = state.get(slot) {
                (held.letter, Accidental::None)
            } else {
                let altered = chromatic_spelling(pitch_class, request.key, &grids)?;
                state.clear_letter(altered.letter);
                state.set(slot, altered);
                (altered.letter, altered.accidental)
            }
        };
        Ok(SpellingReply {
            pname,
            accid,
            accids_in_effect: state,
        })
    }
}

/// Spell a pitch class outside the key by altering one of its diatonic neighbours.
fn chromatic_spelling(
    pitch_class: i32,
    key: i8,
    grids: &KeyGrids,
) -> Result<AlteredLetter, CollaboratorError> {
    // (letter, resulting absolute alteration)
    let neighbour = |offset: i32| {
        grids.degree_of(pitch_class + offset).and_then(|degree| {
            let alteration = grids.alt_grid[degree] - offset;
            Accidental::for_alteration(alteration)
                .map(|accidental| (AlteredLetter::new(grids.pc_grid[degree], accidental), alteration))
        })
    };
    let raised = neighbour(-1);
    let lowered = neighbour(1);
    let natural = [raised, lowered]
        .into_iter()
        .flatten()
        .find(|(_, alteration)| *alteration == 0);
    let prefer_flat = key < 0 || (key == 0 && FLAT_IN_C.contains(&pitch_class));
    let preferred = if prefer_flat {
        lowered.or(raised)
    } else {
        raised.or(lowered)
    };
    natural
        .or(preferred)
        .map(|(altered, _)| altered)
        .ok_or_else(|| CollaboratorError::Reply(format!("cannot spell pitch class {pitch_class}")))
}

/// Spelling oracle running as an external process, one JSON line per call.
#[derive(Debug, Clone)]
pub struct ProcessSpeller {
    command: Vec<String>,
}

impl ProcessSpeller {
    pub const fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl Speller for ProcessSpeller {
    fn spell(&mut self, request: &SpellingRequest) -> Result<SpellingReply, CollaboratorError> {
        call_json_line(&self.command, request)
    }
}

/// Notated pitch of one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchSpelling {
    pub letter: Letter,
    pub accidental: Accidental,
    pub octave: i32,
}

/// Front of the spelling oracle for one key.
///
/// Pitches of the key are spelled directly while no accidental is in effect;
/// everything else goes through the oracle.
pub struct SpellingClient<'a> {
    speller: &'a mut dyn Speller,
    key: KeySignature,
    grids: KeyGrids,
}

impl<'a> SpellingClient<'a> {
    pub fn new(speller: &'a mut dyn Speller, key: KeySignature) -> Self {
        Self {
            speller,
            key,
            grids: key.grids(),
        }
    }

    pub const fn grids(&self) -> &KeyGrids {
        &self.grids
    }

    /// Spell `pitch`, updating the measure's accidental `state` in place.
    pub fn spell(
        &mut self,
        pitch: MidiPitch,
        state: &mut AccidentalState,
    ) -> Result<PitchSpelling, CollaboratorError> {
        let octave = octave(pitch);
        if state.is_clear() {
            if let Some(degree) = self.grids.degree_of(pitch) {
                return Ok(PitchSpelling {
                    letter: self.grids.pc_grid[degree],
                    accidental: Accidental::None,
                    octave,
                });
            }
        }
        let request = SpellingRequest::new(pitch, &self.key, &self.grids, *state);
        let reply = self.speller.spell(&request)?;
        log::debug!(
            "Spelled {pitch} as {}{:?} by oracle",
            reply.pname,
            reply.accid
        );
        *state = reply.accids_in_effect;
        Ok(PitchSpelling {
            letter: reply.pname,
            accidental: reply.accid,
            octave,
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::transcriber::key::Mode;

    /// Reference oracle counting its calls.
    #[derive(Default)]
    pub struct CountingSpeller {
        pub calls: usize,
    }

    impl Speller for CountingSpeller {
        fn spell(&mut self, request: &SpellingRequest) -> Result<SpellingReply, CollaboratorError> {
            self.calls += 1;
            ReferenceSpeller.spell(request)
        }
    }

    /// Oracle that always fails.
    pub struct BrokenSpeller;

    impl Speller for BrokenSpeller {
        fn spell(&mut self, _request: &SpellingRequest) -> Result<SpellingReply, CollaboratorError> {
            Err(CollaboratorError::Reply("oracle offline".to_string()))
        }
    }

    fn key(accidentals: i8) -> KeySignature {
        KeySignature::new(accidentals, Mode::Major).unwrap()
    }

    fn spell_all(pitches: &[MidiPitch], key: KeySignature) -> Vec<(Letter, Accidental)> {
        let mut speller = ReferenceSpeller;
        let mut client = SpellingClient::new(&mut speller, key);
        let mut state = AccidentalState::new_for_measure();
        pitches
            .iter()
            .map(|pitch| {
                let spelling = client.spell(*pitch, &mut state).unwrap();
                (spelling.letter, spelling.accidental)
            })
            .collect()
    }

    #[test]
    fn test_fast_path_skips_oracle() {
        let mut speller = CountingSpeller::default();
        let mut client = SpellingClient::new(&mut speller, key(0));
        let mut state = AccidentalState::new_for_measure();
        let spelling = client.spell(67, &mut state).unwrap();
        assert_eq!(spelling.letter, Letter::G);
        assert_eq!(spelling.accidental, Accidental::None);
        assert_eq!(spelling.octave, 4);
        let spelling = client.spell(57, &mut state).unwrap();
        assert_eq!(spelling.letter, Letter::A);
        assert_eq!(spelling.octave, 3);
        assert_eq!(speller.calls, 0);
    }

    #[test]
    fn test_chromatic_goes_through_oracle() {
        let mut speller = CountingSpeller::default();
        let mut client = SpellingClient::new(&mut speller, key(0));
        let mut state = AccidentalState::new_for_measure();
        let spelling = client.spell(66, &mut state).unwrap();
        assert_eq!((spelling.letter, spelling.accidental), (Letter::F, Accidental::Sharp));
        assert!(!state.is_clear());
        // diatonic note while an accidental is in effect also asks the oracle
        client.spell(67, &mut state).unwrap();
        assert_eq!(speller.calls, 2);
    }

    #[test]
    fn test_fast_path_matches_oracle() {
        for accidentals in -7..=7 {
            let key = key(accidentals);
            let grids = key.grids();
            for pitch in 36..84 {
                if !grids.is_diatonic(pitch) {
                    continue;
                }
                let mut oracle = ReferenceSpeller;
                let request =
                    SpellingRequest::new(pitch, &key, &grids, AccidentalState::new_for_measure());
                let reply = oracle.spell(&request).unwrap();
                let mut client = SpellingClient::new(&mut oracle, key);
                let mut state = AccidentalState::new_for_measure();
                let fast = client.spell(pitch, &mut state).unwrap();
                assert_eq!((fast.letter, fast.accidental), (reply.pname, reply.accid));
                assert_eq!(state, reply.accids_in_effect);
            }
        }
    }

    #[test]
    fn test_accidental_stays_in_effect() {
        // F# F# F G in C major
        let spelled = spell_all(&[66, 66, 65, 67], key(0));
        assert_eq!(
            spelled,
            vec![
                (Letter::F, Accidental::Sharp),
                (Letter::F, Accidental::None),
                (Letter::F, Accidental::Natural),
                (Letter::G, Accidental::None),
            ]
        );
    }

    #[test]
    fn test_key_preferences() {
        // C major: C#, Bb, Eb, G#
        assert_eq!(
            spell_all(&[61, 70, 63, 68], key(0)),
            vec![
                (Letter::C, Accidental::Sharp),
                (Letter::B, Accidental::Flat),
                (Letter::E, Accidental::Flat),
                (Letter::G, Accidental::Sharp),
            ]
        );
        // F major: B natural is preferred over C flat
        assert_eq!(spell_all(&[71], key(-1)), vec![(Letter::B, Accidental::Natural)]);
        // D major: F natural, then F# restated
        assert_eq!(
            spell_all(&[65, 66], key(2)),
            vec![(Letter::F, Accidental::Natural), (Letter::F, Accidental::Sharp)]
        );
        // B flat major: D# is spelled E flat
        assert_eq!(spell_all(&[63 + 12], key(-2)), vec![(Letter::E, Accidental::None)]);
        assert_eq!(spell_all(&[61], key(-2)), vec![(Letter::D, Accidental::Flat)]);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let mut speller = BrokenSpeller;
        let mut client = SpellingClient::new(&mut speller, key(0));
        let mut state = AccidentalState::new_for_measure();
        assert!(client.spell(60, &mut state).is_ok());
        assert!(client.spell(61, &mut state).is_err());
    }
}
