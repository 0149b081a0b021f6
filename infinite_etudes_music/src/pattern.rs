// Pattern expansion: which pitch sequences an etude presents.
//
// A sequence is a short list of unplaced pitches: integers in semitones whose
// value mod 12 is the pitch class and whose differences are the melodic
// intervals. `etude.rs` later transposes each sequence by whole octaves into
// the instrument's range, so only the relative layout matters here.
//
// Per pattern:
// - scale patterns: 12 three-note sequences of distinct scale degrees; the
//   starting degree cycles through the scale so every degree leads at least
//   once. Each note sits as close as possible to the one before it.
// - `final`: 12 three-note sequences that resolve to the tonic, the first two
//   notes being distinct non-tonic pitch classes.
// - `allintervals`: the 13 intervals from unison to octave, each as
//   tonic, tonic+n, tonic.
// - `interval`: one stacked interval pair p, p+i, p+2i per starting pitch class.
// - `intervalpair`: all 6 orderings of p, p+i1, p+i1+i2, each twice, on 12
//   different starting pitch classes.
// - `intervaltriple`: all 24 orderings of the four-note stack, each once.
//
// The returned list is shuffled, so consecutive etudes present the same
// material in a different order.

use crate::catalog::Pattern;
use crate::params::EtudeParams;
use crate::rng::EtudeRng;

/// Unplaced pitches of one sequence.
pub type Sequence = Vec<i16>;

/// Sequences for a typical etude (scale, final and interval patterns).
const SEQUENCES_PER_ETUDE: usize = 12;

pub fn sequences(params: &EtudeParams, rng: &mut EtudeRng) -> Vec<Sequence> {
    let tonic = params.tonic().map_or(0, |t| i16::from(t.pitch_class()));
    let intervals: Vec<i16> = params
        .used_intervals()
        .iter()
        .map(|i| i16::from(i.semitones()))
        .collect();

    let mut seqs = if let Some(degrees) = params.pattern().scale_degrees() {
        scale_sequences(tonic, degrees, rng)
    } else {
        match params.pattern() {
            Pattern::Final => final_sequences(tonic, rng),
            Pattern::AllIntervals => (0..=12).map(|n| vec![tonic, tonic + n, tonic]).collect(),
            Pattern::Interval => {
                let i = intervals[0];
                (0..12).map(|p| vec![p, p + i, p + 2 * i]).collect()
            }
            _ => stacked_sequences(&intervals, rng),
        }
    };
    rng.shuffle(&mut seqs);
    seqs
}

/// The pitch congruent to `pc` (mod 12) nearest to `to`, preferring the lower
/// one on a tritone tie.
fn nearest(pc: i16, to: i16) -> i16 {
    let up = (pc - to).rem_euclid(12);
    if up < 6 { to + up } else { to + up - 12 }
}

fn scale_sequences(tonic: i16, degrees: &[u8], rng: &mut EtudeRng) -> Vec<Sequence> {
    let pcs: Vec<i16> = degrees.iter().map(|&d| tonic + i16::from(d)).collect();
    (0..SEQUENCES_PER_ETUDE)
        .map(|i| {
            let first = pcs[i % pcs.len()];
            let mut rest: Vec<i16> = pcs.iter().copied().filter(|&p| p != first).collect();
            rng.shuffle(&mut rest);
            let second = nearest(rest[0], first);
            let third = nearest(rest[1], second);
            vec![first, second, third]
        })
        .collect()
}

fn final_sequences(tonic: i16, rng: &mut EtudeRng) -> Vec<Sequence> {
    let others: Vec<i16> = (1..12).map(|n| tonic + n).collect();
    (0..SEQUENCES_PER_ETUDE)
        .map(|i| {
            let first = others[i % others.len()];
            let candidates: Vec<i16> = others.iter().copied().filter(|&p| p != first).collect();
            let second = candidates[rng.range_usize(0, candidates.len())];
            let second = nearest(second, first);
            vec![first, second, nearest(tonic, second)]
        })
        .collect()
}

/// Orderings of a stacked chord built from `intervals`, each on a distinct
/// (or, past 12, evenly reused) starting pitch class.
fn stacked_sequences(intervals: &[i16], rng: &mut EtudeRng) -> Vec<Sequence> {
    let mut chord = vec![0i16];
    for &i in intervals {
        let top = chord[chord.len() - 1];
        chord.push(top + i);
    }
    let orderings = permutations(&chord);
    // Three notes have 6 orderings: present each twice to fill 12 sequences.
    let repeats = SEQUENCES_PER_ETUDE.div_ceil(orderings.len()).max(1);

    let count = orderings.len() * repeats;
    let mut roots: Vec<i16> = Vec::with_capacity(count);
    while roots.len() < count {
        let mut octave: Vec<i16> = (0..12).collect();
        rng.shuffle(&mut octave);
        roots.extend(octave);
    }

    orderings
        .iter()
        .cycle()
        .take(count)
        .zip(roots)
        .map(|(ordering, root)| ordering.iter().map(|&p| p + root).collect())
        .collect()
}

/// All orderings of `items` (Heap's algorithm).
fn permutations(items: &[i16]) -> Vec<Vec<i16>> {
    fn heap(k: usize, items: &mut [i16], out: &mut Vec<Vec<i16>>) {
        if k <= 1 {
            out.push(items.to_vec());
            return;
        }
        for i in 0..k - 1 {
            heap(k - 1, items, out);
            if k % 2 == 0 {
                items.swap(i, k - 1);
            } else {
                items.swap(0, k - 1);
            }
        }
        heap(k - 1, items, out);
    }

    let mut work = items.to_vec();
    let mut out = Vec::new();
    heap(work.len(), &mut work, &mut out);
    out
}
