use crate::transcriber::key::{Accidental, KeyGrids, Letter};
use serde::{Deserialize, Serialize};

/// Spelling held by an accidental slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlteredLetter {
    pub letter: Letter,
    pub accidental: Accidental,
}

impl AlteredLetter {
    pub const fn new(letter: Letter, accidental: Accidental) -> Self {
        Self { letter, accidental }
    }
}

/// Accidentals in effect within one measure.
///
/// One slot per pitch class outside the key (there are always five), in
/// ascending pitch-class order. A slot holds the spelling last written for
/// that pitch class in the measure. A fresh state is created for every
/// measure and never carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccidentalState {
    slots: [Option<AlteredLetter>; AccidentalState::SLOTS],
}

impl AccidentalState {
    pub const SLOTS: usize = 5;

    pub fn new_for_measure() -> Self {
        Self::default()
    }

    /// Slot of a pitch class, `None` for pitch classes of the key.
    pub fn slot_for(pitch_class: i32, grids: &KeyGrids) -> Option<usize> {
        let pitch_class = pitch_class.rem_euclid(12);
        grids
            .chromatic_pitch_classes()
            .position(|pc| pc == pitch_class)
    }

    pub fn is_clear(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn get(&self, slot: usize) -> Option<AlteredLetter> {
        self.slots.get(slot).copied().flatten()
    }

    pub fn set(&mut self, slot: usize, altered: AlteredLetter) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(altered);
        }
    }

    /// Clear every slot holding an alteration of `letter`; true if one was held.
    pub fn clear_letter(&mut self, letter: Letter) -> bool {
        let mut cleared = false;
        for entry in &mut self.slots {
            if entry.is_some_and(|held| held.letter == letter) {
                *entry = None;
                cleared = true;
            }
        }
        cleared
    }
}
