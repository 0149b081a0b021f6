// Request validation: ten path segments in, one well-formed `EtudeParams` out.
//
// Validation and construction are the same step. `EtudeParams` has private
// fields and exactly one public constructor, `from_segments`, so any value of
// the type has already passed every check below:
//
// - exactly ten segments: tonic / pattern / interval1 / interval2 /
//   interval3 / instrument / metronome / tempo / repeats / silence;
// - every enumerated field is an exact catalog member (`none` is accepted in
//   the tonic and interval slots);
// - tempo, repeats and silence are plain decimal digits within their ranges;
// - the pattern gets what it needs: a real tonic for tonic patterns, real
//   intervals in the first N slots for the interval patterns.
//
// Construction canonicalizes: a slot the pattern does not use is stored as
// `None` whatever the request said, so two requests that differ only in
// ignored fields build equal values and share one cached artifact.
//
// No I/O happens here.

use thiserror::Error;

use crate::catalog::{
    Instrument, Interval, Metronome, Pattern, REPEATS_MAX, SILENCE_MAX, TEMPO_MAX, TEMPO_MIN,
    Tonic, UNUSED,
};

/// Number of positional segments in an etude path.
pub const SEGMENT_COUNT: usize = 10;

/// Field names in path order, used in error messages.
pub const FIELD_NAMES: [&str; SEGMENT_COUNT] = [
    "tonic",
    "pattern",
    "interval1",
    "interval2",
    "interval3",
    "instrument",
    "metronome",
    "tempo",
    "repeats",
    "silence",
];

/// Why a request path was rejected. Always the client's fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected 10 path segments, got {0}")]
    SegmentCount(usize),

    #[error("unknown {field} '{value}'")]
    UnknownValue { field: &'static str, value: String },

    #[error("{field} '{value}' is not a number")]
    NotANumber { field: &'static str, value: String },

    #[error("{field} {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("pattern '{0}' requires a tonic")]
    MissingTonic(Pattern),

    #[error("pattern '{pattern}' requires interval{slot}")]
    MissingInterval { pattern: Pattern, slot: usize },
}

/// A validated, canonical etude request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EtudeParams {
    tonic: Option<Tonic>,
    pattern: Pattern,
    intervals: [Option<Interval>; 3],
    instrument: Instrument,
    metronome: Metronome,
    tempo: u16,
    repeats: u8,
    silence: u8,
}

impl EtudeParams {
    /// Validate raw path segments (already split on `/`, prefix removed).
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Result<Self, ValidationError> {
        if segments.len() != SEGMENT_COUNT {
            return Err(ValidationError::SegmentCount(segments.len()));
        }
        let seg = |i: usize| segments[i].as_ref();

        let tonic = optional(FIELD_NAMES[0], seg(0), Tonic::from_name)?;
        let pattern = required(FIELD_NAMES[1], seg(1), Pattern::from_name)?;
        let mut intervals = [None; 3];
        for (slot, interval) in intervals.iter_mut().enumerate() {
            *interval = optional(FIELD_NAMES[2 + slot], seg(2 + slot), Interval::from_name)?;
        }
        let instrument = required(FIELD_NAMES[5], seg(5), Instrument::from_name)?;
        let metronome = required(FIELD_NAMES[6], seg(6), Metronome::from_name)?;
        let tempo = number(FIELD_NAMES[7], seg(7), TEMPO_MIN.into(), TEMPO_MAX.into())?;
        let repeats = number(FIELD_NAMES[8], seg(8), 0, REPEATS_MAX.into())?;
        let silence = number(FIELD_NAMES[9], seg(9), 0, SILENCE_MAX.into())?;

        // Pattern requirements, then drop whatever the pattern ignores.
        let needed = pattern.required_intervals();
        let tonic = if pattern.uses_tonic() {
            Some(tonic.ok_or(ValidationError::MissingTonic(pattern))?)
        } else {
            None
        };
        for (slot, interval) in intervals.iter_mut().enumerate() {
            if slot < needed {
                if interval.is_none() {
                    return Err(ValidationError::MissingInterval {
                        pattern,
                        slot: slot + 1,
                    });
                }
            } else {
                *interval = None;
            }
        }

        // The range checks above bound these, so the narrowing is lossless.
        Ok(Self {
            tonic,
            pattern,
            intervals,
            instrument,
            metronome,
            tempo: tempo as u16,
            repeats: repeats as u8,
            silence: silence as u8,
        })
    }

    /// `None` for interval patterns.
    pub fn tonic(&self) -> Option<Tonic> {
        self.tonic
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// All three slots; unused ones are `None`.
    pub fn intervals(&self) -> [Option<Interval>; 3] {
        self.intervals
    }

    /// Only the intervals the pattern uses, in slot order.
    pub fn used_intervals(&self) -> Vec<Interval> {
        self.intervals.iter().flatten().copied().collect()
    }

    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn metronome(&self) -> Metronome {
        self.metronome
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn repeats(&self) -> u8 {
        self.repeats
    }

    pub fn silence(&self) -> u8 {
        self.silence
    }

    /// Whether repeat `repeat` (1-based, after the first hearing) is muted.
    ///
    /// Bit 2 mutes the first repeat, bit 1 the second, bit 0 the third,
    /// matching the left-to-right muting menu.
    pub fn is_silent(&self, repeat: u8) -> bool {
        (1..=REPEATS_MAX).contains(&repeat) && self.silence & (1 << (REPEATS_MAX - repeat)) != 0
    }

    /// Canonical path segments, `none` for unused slots. Feeding these back to
    /// `from_segments` rebuilds an equal value.
    pub fn segments(&self) -> [String; SEGMENT_COUNT] {
        let interval = |i: Option<Interval>| i.map_or(UNUSED, Interval::name).to_string();
        [
            self.tonic.map_or(UNUSED, Tonic::name).to_string(),
            self.pattern.name().to_string(),
            interval(self.intervals[0]),
            interval(self.intervals[1]),
            interval(self.intervals[2]),
            self.instrument.name().to_string(),
            self.metronome.name().to_string(),
            self.tempo.to_string(),
            self.repeats.to_string(),
            self.silence.to_string(),
        ]
    }
}

fn required<T>(
    field: &'static str,
    value: &str,
    lookup: fn(&str) -> Option<T>,
) -> Result<T, ValidationError> {
    lookup(value).ok_or_else(|| ValidationError::UnknownValue {
        field,
        value: value.to_string(),
    })
}

fn optional<T>(
    field: &'static str,
    value: &str,
    lookup: fn(&str) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    if value == UNUSED {
        Ok(None)
    } else {
        required(field, value, lookup).map(Some)
    }
}

/// Digits only: `u64::from_str` would also accept a leading `+`.
fn number(field: &'static str, value: &str, min: u64, max: u64) -> Result<u64, ValidationError> {
    let not_a_number = || ValidationError::NotANumber {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_number());
    }
    let n: u64 = value.parse().map_err(|_| not_a_number())?;
    if !(min..=max).contains(&n) {
        return Err(ValidationError::OutOfRange {
            field,
            value: n,
            min,
            max,
        });
    }
    Ok(n)
}
