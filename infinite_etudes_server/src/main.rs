// CLI entry point for the Infinite Etudes server.
//
// Builds a `ServerConfig` from the command line, installs the tracing
// subscriber, and runs `start_server` until the process is killed. See
// `server.rs` for the request path and `orchestrator.rs` for caching and
// single-flight generation.
//
// Usage:
//   etude-server [OPTIONS]
//     --bind <ADDR>              Listen address (default: 127.0.0.1)
//     --port <PORT>              Listen port (default: 8080)
//     --dir <DIR>                Artifact directory (default: etudes)
//     --max-age-secs <N>         Regenerate artifacts this old (default: 3600)
//     --wait-timeout-secs <N>    Max wait on another request's generation
//     --workers <N>              Worker threads (default: 4)
//     --no-stale-fallback        Return 500 instead of a stale artifact
//     --index <FILE>             Page served at / (default: index.html)
//     --seed <N>                 Generator base seed (default: clock)
//     --log-json                 JSON log lines instead of plain text
//
// Log filtering follows `RUST_LOG` (default `info`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use infinite_etudes_music::{EtudeGenerator, seed_or_clock};
use infinite_etudes_server::{ServerConfig, start_server};

#[derive(Parser, Debug)]
#[command(version, about = "Serve Infinite Etudes MIDI files over HTTP")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Directory holding generated etudes.
    #[arg(long, default_value = "etudes")]
    dir: PathBuf,

    /// Artifacts at least this many seconds old are regenerated.
    #[arg(long, default_value_t = 3600)]
    max_age_secs: u64,

    /// How long a request waits on another request's generation.
    #[arg(long, default_value_t = 30)]
    wait_timeout_secs: u64,

    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Fail requests whose regeneration fails instead of serving the
    /// previous artifact.
    #[arg(long)]
    no_stale_fallback: bool,

    /// Page served at `/`.
    #[arg(long, default_value = "index.html")]
    index: PathBuf,

    /// Generator base seed (defaults to the clock).
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            port: self.port,
            artifact_dir: self.dir,
            max_age: Duration::from_secs(self.max_age_secs),
            wait_timeout: Duration::from_secs(self.wait_timeout_secs),
            workers: self.workers,
            serve_stale_on_failure: !self.no_stale_fallback,
            index_file: Some(self.index),
            seed: self.seed,
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("Failed to install log subscriber: {e}");
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.log_json);
    let config = args.into_config();

    let seed = seed_or_clock(config.seed);
    tracing::info!(seed, "generator seeded");
    let generator = Arc::new(EtudeGenerator::new(seed));

    let (handle, addr) = match start_server(config, generator) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            std::process::exit(1);
        }
    };

    println!("Serving etudes on http://{addr}/");
    println!("Press Ctrl+C to stop.");
    handle.wait();
}
