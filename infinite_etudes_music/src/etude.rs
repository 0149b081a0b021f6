// Etude composition: the generator behind the cache.
//
// `Generator` is the seam the server depends on. It takes a validated
// `EtudeParams` plus the instrument's profile and returns finished artifact
// bytes. It never touches storage; the caller owns persistence.
//
// `EtudeGenerator` is the real implementation:
// 1. `pattern::sequences` picks and shuffles the pitch sequences.
// 2. Each sequence is placed by a random walk: transposed by whole octaves so
//    its first note is as close as possible to the previous sequence's last
//    note while every note stays inside the instrument range. The very first
//    sequence lands on a random octave. A sequence wider than the range
//    cannot move as a block; its notes fold back into the range one by one.
// 3. The form is laid out bar by bar: a count-in bar of clicks, then each
//    sequence heard `1 + repeats` times, one bar per hearing. A bar holds the
//    sequence's notes on consecutive beats followed by one rest beat, so
//    three-note patterns are in 4/4 and four-note patterns in 5/4. Muted
//    repeats keep their bar (and metronome) but drop the notes.
// 4. `midi::etude_to_bytes` encodes the result.
//
// Randomness comes from a base seed mixed with a per-call counter, so every
// regeneration of a stale artifact presents a fresh ordering while a fixed
// seed keeps tests reproducible.

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::catalog::{InstrumentProfile, Metronome};
use crate::midi;
use crate::params::EtudeParams;
use crate::pattern;
use crate::rng::{EtudeRng, mix_seed};

/// Produces artifact bytes for a validated request.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        params: &EtudeParams,
        profile: &InstrumentProfile,
    ) -> Result<Vec<u8>, GenerateError>;
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("MIDI encoding failed: {0}")]
    Midi(#[from] std::io::Error),
}

/// One sounding note, one beat long.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub beat: u32,
    pub pitch: u8,
}

/// One metronome click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Click {
    pub beat: u32,
    pub accent: bool,
}

/// A composed etude, ready for MIDI encoding.
#[derive(Clone, Debug)]
pub struct Etude {
    pub tempo_bpm: u16,
    pub beats_per_bar: u8,
    pub program: u8,
    pub instrument_name: &'static str,
    pub notes: Vec<Note>,
    pub clicks: Vec<Click>,
    pub total_beats: u32,
}

/// MIDI etude generator.
pub struct EtudeGenerator {
    seed: u64,
    calls: AtomicU64,
}

impl EtudeGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            calls: AtomicU64::new(0),
        }
    }

    /// Compose an etude from an explicit seed. Same inputs, same etude.
    pub fn compose(params: &EtudeParams, profile: &InstrumentProfile, seed: u64) -> Etude {
        let mut rng = EtudeRng::new(seed);
        let sequences = pattern::sequences(params, &mut rng);
        let notes_per_bar = sequences.iter().map(Vec::len).max().unwrap_or(0);
        let beats_per_bar = notes_per_bar as u32 + 1;

        let mut notes = Vec::new();
        let mut clicks = Vec::new();

        // Count-in: the metronome always clicks through the first bar.
        for beat in 0..beats_per_bar {
            clicks.push(Click {
                beat,
                accent: beat == 0,
            });
        }

        let mut bar = 1u32;
        let mut previous: Option<u8> = None;
        for sequence in &sequences {
            let placed = place(sequence, previous, profile, &mut rng);
            for hearing in 0..=params.repeats() {
                let start = bar * beats_per_bar;
                if !params.is_silent(hearing) {
                    notes.extend(
                        placed
                            .iter()
                            .zip(start..)
                            .map(|(&pitch, beat)| Note { beat, pitch }),
                    );
                }
                let clicked_beats = match params.metronome() {
                    Metronome::On => beats_per_bar,
                    Metronome::Downbeat => 1,
                    Metronome::Off => 0,
                };
                clicks.extend((0..clicked_beats).map(|b| Click {
                    beat: start + b,
                    accent: b == 0,
                }));
                bar += 1;
            }
            previous = placed.last().copied();
        }

        Etude {
            tempo_bpm: params.tempo(),
            beats_per_bar: beats_per_bar as u8,
            program: profile.program,
            instrument_name: profile.display_name,
            notes,
            clicks,
            total_beats: bar * beats_per_bar,
        }
    }
}

impl Generator for EtudeGenerator {
    fn generate(
        &self,
        params: &EtudeParams,
        profile: &InstrumentProfile,
    ) -> Result<Vec<u8>, GenerateError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let etude = Self::compose(params, profile, mix_seed(self.seed, call));
        Ok(midi::etude_to_bytes(&etude)?)
    }
}

/// Put `sequence` inside the instrument range.
///
/// A sequence that fits moves as a block by whole octaves. One wider than the
/// range is anchored near the walk and each out-of-range note folds back by
/// octaves, so placement never fails. Every catalog range spans at least an
/// octave, which keeps the fold inside the range.
fn place(
    sequence: &[i16],
    previous: Option<u8>,
    profile: &InstrumentProfile,
    rng: &mut EtudeRng,
) -> Vec<u8> {
    let low = sequence.iter().copied().min().unwrap_or(0);
    let high = sequence.iter().copied().max().unwrap_or(0);
    let lowest = i16::from(profile.lowest);
    let highest = i16::from(profile.highest);
    let first = sequence.first().copied().unwrap_or(0);

    // Octave shifts k with lowest <= low + 12k and high + 12k <= highest.
    let k_min = (lowest - low + 11).div_euclid(12);
    let k_max = (highest - high).div_euclid(12);
    let k = if k_min <= k_max {
        match previous {
            None => k_min + rng.range_usize(0, (k_max - k_min + 1) as usize) as i16,
            Some(prev) => (k_min..=k_max)
                .min_by_key(|k| (first + 12 * k - i16::from(prev)).abs())
                .unwrap_or(k_min),
        }
    } else {
        let target = match previous {
            Some(prev) => i16::from(prev),
            None => lowest + rng.range_usize(0, usize::from(profile.span()) + 1) as i16,
        };
        (target - first + 6).div_euclid(12)
    };
    sequence
        .iter()
        .map(|&p| fold_into(p + 12 * k, lowest, highest))
        .collect()
}

fn fold_into(mut pitch: i16, lowest: i16, highest: i16) -> u8 {
    while pitch < lowest {
        pitch += 12;
    }
    while pitch > highest {
        pitch -= 12;
    }
    pitch as u8
}
