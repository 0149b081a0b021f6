// Parameter catalog: every legal value for each etude dimension.
//
// An etude is addressed by ten positional fields (see `params.rs`). Six of
// them are drawn from the closed enumerations defined here: tonic, pattern,
// the three interval selectors, instrument, and metronome mode. The remaining
// three are small integers whose bounds also live here so the validator, the
// generator and the `/catalog` endpoint agree on them.
//
// Each enumeration is generated by `catalog_enum!`, which gives it:
// - `ALL`: every variant in menu order,
// - `name()` / `from_name()`: the exact URL vocabulary (lowercase, no spaces),
// - `Display` and `Serialize` that both emit the URL name.
//
// Instrument profiles (program number and playable range) are a static table
// kept in the same order as `Instrument::ALL`; `Instrument::profile()` indexes
// into it. Nothing here is mutable after startup.

use std::fmt;

use serde::{Serialize, Serializer};

/// Inclusive tempo bounds in beats per minute.
pub const TEMPO_MIN: u16 = 60;
pub const TEMPO_MAX: u16 = 480;

/// Maximum number of repeats after the first hearing of a sequence.
pub const REPEATS_MAX: u8 = 3;

/// Largest silence mask (one bit per possible repeat).
pub const SILENCE_MAX: u8 = 7;

/// The sentinel accepted in the tonic and interval slots when the chosen
/// pattern does not use them.
pub const UNUSED: &str = "none";

macro_rules! catalog_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in menu order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The URL-vocabulary name of this value.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Exact-match lookup by URL name. No case folding.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }
    };
}

catalog_enum!(
    /// One of the twelve pitch classes, spelled the way the URL spells them.
    Tonic {
        C => "c",
        DFlat => "dflat",
        D => "d",
        EFlat => "eflat",
        E => "e",
        F => "f",
        GFlat => "gflat",
        G => "g",
        AFlat => "aflat",
        A => "a",
        BFlat => "bflat",
        B => "b",
    }
);

impl Tonic {
    /// Pitch class, 0 = C through 11 = B.
    pub fn pitch_class(self) -> u8 {
        self as u8
    }
}

catalog_enum!(
    /// Sequence pattern. The first six are built around a tonic; the last
    /// three are built from one, two or three interval selectors.
    Pattern {
        Pentatonic => "pentatonic",
        Major => "major",
        HarmonicMinor => "harmonicminor",
        MelodicMinor => "melodicminor",
        Final => "final",
        AllIntervals => "allintervals",
        Interval => "interval",
        IntervalPair => "intervalpair",
        IntervalTriple => "intervaltriple",
    }
);

impl Pattern {
    /// Number of interval selectors this pattern consumes (0 for tonic patterns).
    pub fn required_intervals(self) -> usize {
        match self {
            Pattern::Interval => 1,
            Pattern::IntervalPair => 2,
            Pattern::IntervalTriple => 3,
            _ => 0,
        }
    }

    pub fn uses_tonic(self) -> bool {
        self.required_intervals() == 0
    }

    /// Scale degrees in semitones above the tonic, for the scale patterns.
    pub fn scale_degrees(self) -> Option<&'static [u8]> {
        match self {
            Pattern::Pentatonic => Some(&[0, 2, 4, 7, 9]),
            Pattern::Major => Some(&[0, 2, 4, 5, 7, 9, 11]),
            Pattern::HarmonicMinor => Some(&[0, 2, 3, 5, 7, 8, 11]),
            Pattern::MelodicMinor => Some(&[0, 2, 3, 5, 7, 9, 11]),
            _ => None,
        }
    }

    /// Menu label.
    pub fn display_name(self) -> &'static str {
        match self {
            Pattern::Pentatonic => "Pentatonic",
            Pattern::Major => "Major",
            Pattern::HarmonicMinor => "Harmonic Minor",
            Pattern::MelodicMinor => "Melodic Minor",
            Pattern::Final => "Chromatic Final",
            Pattern::AllIntervals => "Tonic Intervals",
            Pattern::Interval => "One Interval",
            Pattern::IntervalPair => "Two Intervals",
            Pattern::IntervalTriple => "Three Intervals",
        }
    }
}

catalog_enum!(
    /// Interval selector, from a minor second up to an octave.
    Interval {
        Minor2 => "minor2",
        Major2 => "major2",
        Minor3 => "minor3",
        Major3 => "major3",
        Perfect4 => "perfect4",
        Tritone => "tritone",
        Perfect5 => "perfect5",
        Minor6 => "minor6",
        Major6 => "major6",
        Minor7 => "minor7",
        Major7 => "major7",
        Octave => "octave",
    }
);

impl Interval {
    /// Size in half steps (1..=12).
    pub fn semitones(self) -> u8 {
        self as u8 + 1
    }
}

catalog_enum!(
    /// Metronome behavior after the one-bar count-in.
    Metronome {
        On => "on",
        Downbeat => "downbeat",
        Off => "off",
    }
);

catalog_enum!(
    /// Instrument sound. Also determines the playable pitch range.
    Instrument {
        AcousticGrandPiano => "acoustic_grand_piano",
        AcousticGuitarNylon => "acoustic_guitar_nylon",
        AcousticBass => "acoustic_bass",
        ElectricBassFinger => "electric_bass_finger",
        Violin => "violin",
        Viola => "viola",
        Cello => "cello",
        Contrabass => "contrabass",
        Trumpet => "trumpet",
        Trombone => "trombone",
        Tuba => "tuba",
        FrenchHorn => "french_horn",
        SopranoSax => "soprano_sax",
        AltoSax => "alto_sax",
        TenorSax => "tenor_sax",
        BaritoneSax => "baritone_sax",
        Oboe => "oboe",
        Bassoon => "bassoon",
        Clarinet => "clarinet",
        Flute => "flute",
        Vibraphone => "vibraphone",
        Marimba => "marimba",
        SopranoVoice => "soprano_voice",
        AltoVoice => "alto_voice",
        TenorVoice => "tenor_voice",
        BassVoice => "bass_voice",
    }
);

impl Instrument {
    pub fn profile(self) -> &'static InstrumentProfile {
        &PROFILES[self as usize]
    }
}

/// Static description of an instrument sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct InstrumentProfile {
    pub name: &'static str,
    pub display_name: &'static str,
    /// General MIDI program number, 0-based.
    pub program: u8,
    /// Lowest commonly playable MIDI pitch.
    pub lowest: u8,
    /// Highest commonly playable MIDI pitch.
    pub highest: u8,
}

impl InstrumentProfile {
    const fn new(
        name: &'static str,
        display_name: &'static str,
        program: u8,
        lowest: u8,
        highest: u8,
    ) -> Self {
        Self {
            name,
            display_name,
            program,
            lowest,
            highest,
        }
    }

    /// Width of the playable range in semitones.
    pub fn span(&self) -> u8 {
        self.highest - self.lowest
    }
}

// Same order as `Instrument::ALL`. The four voices all use GM "Choir Aahs".
static PROFILES: [InstrumentProfile; 26] = [
    InstrumentProfile::new("acoustic_grand_piano", "Piano", 0, 21, 108),
    InstrumentProfile::new("acoustic_guitar_nylon", "Guitar", 24, 40, 84),
    InstrumentProfile::new("acoustic_bass", "Acoustic Bass", 32, 28, 55),
    InstrumentProfile::new("electric_bass_finger", "Electric Bass", 33, 28, 67),
    InstrumentProfile::new("violin", "Violin", 40, 55, 103),
    InstrumentProfile::new("viola", "Viola", 41, 48, 91),
    InstrumentProfile::new("cello", "Cello", 42, 36, 76),
    InstrumentProfile::new("contrabass", "Contrabass", 43, 28, 67),
    InstrumentProfile::new("trumpet", "Trumpet", 56, 55, 82),
    InstrumentProfile::new("trombone", "Trombone", 57, 40, 72),
    InstrumentProfile::new("tuba", "Tuba", 58, 28, 58),
    InstrumentProfile::new("french_horn", "French Horn", 60, 34, 77),
    InstrumentProfile::new("soprano_sax", "Soprano Sax", 64, 56, 87),
    InstrumentProfile::new("alto_sax", "Alto Sax", 65, 49, 80),
    InstrumentProfile::new("tenor_sax", "Tenor Sax", 66, 44, 75),
    InstrumentProfile::new("baritone_sax", "Baritone Sax", 67, 36, 68),
    InstrumentProfile::new("oboe", "Oboe", 68, 58, 91),
    InstrumentProfile::new("bassoon", "Bassoon", 70, 34, 75),
    InstrumentProfile::new("clarinet", "Clarinet", 71, 50, 91),
    InstrumentProfile::new("flute", "Flute", 73, 60, 96),
    InstrumentProfile::new("vibraphone", "Vibraphone", 11, 53, 89),
    InstrumentProfile::new("marimba", "Marimba", 12, 45, 96),
    InstrumentProfile::new("soprano_voice", "Soprano Voice", 52, 60, 81),
    InstrumentProfile::new("alto_voice", "Alto Voice", 52, 53, 74),
    InstrumentProfile::new("tenor_voice", "Tenor Voice", 52, 48, 69),
    InstrumentProfile::new("bass_voice", "Bass Voice", 52, 40, 64),
];

// ---------------------------------------------------------------------------
// Catalog summary (what `/catalog` serves)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PatternSummary {
    pub name: Pattern,
    pub display_name: &'static str,
    pub intervals: usize,
    pub uses_tonic: bool,
}

#[derive(Debug, Serialize)]
pub struct IntervalSummary {
    pub name: Interval,
    pub semitones: u8,
}

#[derive(Debug, Serialize)]
pub struct RangeSummary {
    pub min: u16,
    pub max: u16,
}

/// Everything a client needs to build a valid etude path.
#[derive(Debug, Serialize)]
pub struct CatalogSummary {
    pub tonics: &'static [Tonic],
    pub patterns: Vec<PatternSummary>,
    pub intervals: Vec<IntervalSummary>,
    pub instruments: &'static [InstrumentProfile],
    pub metronome: &'static [Metronome],
    pub unused: &'static str,
    pub tempo: RangeSummary,
    pub repeats: RangeSummary,
    pub silence: RangeSummary,
}

pub fn summary() -> CatalogSummary {
    CatalogSummary {
        tonics: Tonic::ALL,
        patterns: Pattern::ALL
            .iter()
            .map(|&p| PatternSummary {
                name: p,
                display_name: p.display_name(),
                intervals: p.required_intervals(),
                uses_tonic: p.uses_tonic(),
            })
            .collect(),
        intervals: Interval::ALL
            .iter()
            .map(|&i| IntervalSummary {
                name: i,
                semitones: i.semitones(),
            })
            .collect(),
        instruments: &PROFILES,
        metronome: Metronome::ALL,
        unused: UNUSED,
        tempo: RangeSummary {
            min: TEMPO_MIN,
            max: TEMPO_MAX,
        },
        repeats: RangeSummary {
            min: 0,
            max: u16::from(REPEATS_MAX),
        },
        silence: RangeSummary {
            min: 0,
            max: u16::from(SILENCE_MAX),
        },
    }
}
