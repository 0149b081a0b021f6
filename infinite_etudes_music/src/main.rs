// Infinite Etudes generator: CLI entry point.
//
// Composes one etude offline and writes it as a MIDI file, using the same
// ten fields the server's `/etude/...` path takes.
//
// Usage:
//   cargo run -p infinite_etudes_music --bin generate -- \
//     c pentatonic none none none acoustic_grand_piano on 120 3 0 \
//     [--out etude.midi] [--seed N]

use std::path::PathBuf;

use clap::Parser;

use infinite_etudes_music::{EtudeGenerator, EtudeParams, Generator, seed_or_clock};

#[derive(Parser, Debug)]
#[command(version, about = "Write one Infinite Etudes MIDI file")]
struct Args {
    /// tonic pattern interval1 interval2 interval3 instrument metronome tempo repeats silence
    #[arg(num_args = 10, value_name = "FIELD", required = true)]
    fields: Vec<String>,

    /// Output path.
    #[arg(long, default_value = "etude.midi")]
    out: PathBuf,

    /// Seed for sequence order and placement (defaults to the clock).
    #[arg(long)]
    seed: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let params = match EtudeParams::from_segments(&args.fields) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid etude: {e}");
            std::process::exit(2);
        }
    };
    let seed = seed_or_clock(args.seed);

    let profile = params.instrument().profile();
    println!("Pattern: {}", params.pattern().display_name());
    println!(
        "Instrument: {} (MIDI {}..={})",
        profile.display_name, profile.lowest, profile.highest
    );
    println!("Tempo: {} BPM", params.tempo());
    println!("Seed: {seed}");

    let bytes = match EtudeGenerator::new(seed).generate(&params, profile) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Generation failed: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(&args.out, &bytes) {
        eprintln!("Error writing {}: {e}", args.out.display());
        std::process::exit(1);
    }
    println!("Wrote {} bytes to {}", bytes.len(), args.out.display());
}
