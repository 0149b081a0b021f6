// MIDI output for composed etudes.
//
// Converts an `Etude` into Standard MIDI File bytes. The server caches these
// bytes verbatim, so this is the artifact format clients download.
//
// Uses the `midly` crate. Output is SMF Format 1 (multi-track):
// - track 0: tempo and time signature,
// - track 1: the instrument (program change, then one note per beat),
// - track 2: the metronome on the General MIDI percussion channel.
//
// Each beat is a quarter note. Events are collected with absolute tick times,
// stably sorted, then converted to delta times, so a note-off always precedes
// a note-on that lands on the same tick.

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

use crate::etude::Etude;

/// Ticks per quarter note (one beat).
pub const TICKS_PER_BEAT: u16 = 480;

/// Metronome clicks are short: a 32nd note.
const CLICK_TICKS: u32 = TICKS_PER_BEAT as u32 / 8;

const INSTRUMENT_CHANNEL: u8 = 0;
const PERCUSSION_CHANNEL: u8 = 9;

/// GM percussion keys: high wood block on the downbeat, low elsewhere.
const CLICK_ACCENT_KEY: u8 = 76;
const CLICK_KEY: u8 = 77;

/// Encode an etude as SMF bytes.
pub fn etude_to_bytes(etude: &Etude) -> std::io::Result<Vec<u8>> {
    let smf = etude_to_smf(etude);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

fn etude_to_smf(etude: &Etude) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_BEAT)),
    ));

    // Track 0: tempo and meter
    let tempo_microseconds = 60_000_000 / u32::from(etude.tempo_bpm);
    smf.tracks.push(finish_track(vec![
        (0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds)))),
        (
            0,
            TrackEventKind::Meta(MetaMessage::TimeSignature(etude.beats_per_bar, 2, 24, 8)),
        ),
    ]));

    // Track 1: instrument
    let channel = u4::new(INSTRUMENT_CHANNEL);
    let mut events = vec![
        (
            0,
            TrackEventKind::Meta(MetaMessage::TrackName(etude.instrument_name.as_bytes())),
        ),
        (
            0,
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(etude.program),
                },
            },
        ),
    ];
    for note in &etude.notes {
        let start = note.beat * u32::from(TICKS_PER_BEAT);
        events.push((start, note_on(channel, note.pitch, 96)));
        events.push((start + u32::from(TICKS_PER_BEAT), note_off(channel, note.pitch)));
    }
    smf.tracks.push(finish_track(events));

    // Track 2: metronome
    let channel = u4::new(PERCUSSION_CHANNEL);
    let mut events = vec![(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Metronome")))];
    for click in &etude.clicks {
        let start = click.beat * u32::from(TICKS_PER_BEAT);
        let (key, vel) = if click.accent {
            (CLICK_ACCENT_KEY, 110)
        } else {
            (CLICK_KEY, 80)
        };
        events.push((start, note_on(channel, key, vel)));
        events.push((start + CLICK_TICKS, note_off(channel, key)));
    }
    smf.tracks.push(finish_track(events));

    smf
}

fn note_on(channel: u4, key: u8, vel: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel,
        message: MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    }
}

fn note_off(channel: u4, key: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel,
        message: MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        },
    }
}

/// Sort absolute-time events, convert to deltas, and append EndOfTrack.
fn finish_track(mut events: Vec<(u32, TrackEventKind<'static>)>) -> Track<'static> {
    events.sort_by_key(|&(tick, _)| tick);
    let mut track: Track<'static> = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etude::{Click, Note};

    fn tiny_etude() -> Etude {
        Etude {
            tempo_bpm: 120,
            beats_per_bar: 4,
            program: 56,
            instrument_name: "Trumpet",
            notes: vec![
                Note { beat: 4, pitch: 60 },
                Note { beat: 5, pitch: 60 },
                Note { beat: 6, pitch: 67 },
            ],
            clicks: (0..4)
                .map(|beat| Click {
                    beat,
                    accent: beat == 0,
                })
                .collect(),
            total_beats: 8,
        }
    }

    #[test]
    fn writes_three_tracks_with_tempo_and_program() {
        let bytes = etude_to_bytes(&tiny_etude()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 3);

        assert!(smf.tracks[0].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
        )));
        assert!(smf.tracks[1].iter().any(|e| matches!(
            e.kind,
            TrackEventKind::Midi { message: MidiMessage::ProgramChange { program }, .. }
                if program.as_int() == 56
        )));
    }

    #[test]
    fn repeated_pitch_turns_off_before_turning_on_again() {
        let smf = etude_to_smf(&tiny_etude());
        let mut tick = 0u32;
        let mut sounding = false;
        for event in &smf.tracks[1] {
            tick += event.delta.as_int();
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, .. },
                    ..
                } if key.as_int() == 60 => {
                    assert!(!sounding, "overlapping C at tick {tick}");
                    sounding = true;
                }
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOff { key, .. },
                    ..
                } if key.as_int() == 60 => sounding = false,
                _ => {}
            }
        }
        assert!(!sounding);
        // The last note ends on the rest beat.
        assert_eq!(tick, 7 * u32::from(TICKS_PER_BEAT));
    }

    #[test]
    fn metronome_uses_percussion_channel() {
        let smf = etude_to_smf(&tiny_etude());
        let clicks: Vec<u8> = smf.tracks[2]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn { key, .. },
                } => {
                    assert_eq!(channel.as_int(), PERCUSSION_CHANNEL);
                    Some(key.as_int())
                }
                _ => None,
            })
            .collect();
        assert_eq!(clicks, vec![CLICK_ACCENT_KEY, CLICK_KEY, CLICK_KEY, CLICK_KEY]);
    }
}
