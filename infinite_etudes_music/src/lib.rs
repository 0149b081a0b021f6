// Infinite Etudes music crate
//
// Everything that knows about music: the closed vocabulary an etude request
// may use, validation of a request into a typed parameter set, and the
// generator that turns that parameter set into a Standard MIDI File. An etude
// is a series of short pitch sequences (three or four notes), each played and
// then repeated so the listener can answer it on their instrument.
//
// Architecture:
// - catalog.rs: Tonics, patterns, intervals, instruments (with playable
//   ranges and GM programs), metronome modes, numeric bounds
// - params.rs: `EtudeParams`, built only by validating the ten path segments
// - pattern.rs: Pattern expansion into unplaced pitch sequences
// - etude.rs: `Generator` trait, `EtudeGenerator` (range walk + bar layout)
// - midi.rs: SMF encoding via `midly`
// - rng.rs: Deterministic xoshiro256++ for sequence order and placement
//
// The crate does no I/O apart from the `generate` binary writing its output
// file. Caching, staleness and concurrency live in `infinite_etudes_server`.

pub mod catalog;
pub mod etude;
pub mod midi;
pub mod params;
pub mod pattern;
pub mod rng;

pub use catalog::InstrumentProfile;
pub use etude::{EtudeGenerator, GenerateError, Generator};
pub use params::{EtudeParams, ValidationError};
pub use rng::seed_or_clock;
