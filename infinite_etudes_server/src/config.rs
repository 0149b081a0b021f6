// Server configuration.
//
// Everything the server needs is passed in as a `ServerConfig` value; nothing
// is read from or written to the environment. The `etude-server` binary
// builds one from its command line (see `main.rs`).

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::OrchestratorConfig;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind: IpAddr,
    /// Listen port. 0 lets the OS pick one (tests).
    pub port: u16,
    /// Flat directory holding one `.midi` file per artifact key.
    pub artifact_dir: PathBuf,
    /// Artifacts this old or older are regenerated on the next request.
    pub max_age: Duration,
    /// How long a request waits on another request's generation.
    pub wait_timeout: Duration,
    pub workers: usize,
    pub serve_stale_on_failure: bool,
    /// Page served at `/`. `None` (or a missing file) gives 404.
    pub index_file: Option<PathBuf>,
    /// Base seed for the generator. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            artifact_dir: PathBuf::from("etudes"),
            max_age: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(30),
            workers: 4,
            serve_stale_on_failure: true,
            index_file: Some(PathBuf::from("index.html")),
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_age: self.max_age,
            wait_timeout: self.wait_timeout,
            serve_stale_on_failure: self.serve_stale_on_failure,
        }
    }
}
