// HTTP front end: a fixed pool of worker threads over one `tiny_http::Server`.
//
// Architecture: thread-per-worker, no event loop.
//
// - `start_server` binds the listener, opens the artifact directory, builds
//   the `Orchestrator`, and spawns `config.workers` threads.
// - Each worker pulls requests from the shared `Server` with `recv_timeout`,
//   handles one request to completion (including any generation it leads or
//   waits on), and goes back for the next. A worker blocked on a slow
//   generation only holds up its own connection.
// - All cross-request state lives in the `Orchestrator`; workers share it
//   through an `Arc<Context>`.
//
// Routing:
//   GET /etude/<10 fields>[/]   → MIDI (400 / 500 / 504 on failure)
//   GET /catalog                → JSON parameter catalog
//   GET /status                 → JSON orchestrator counters
//   GET /                       → index file, or 404
//   anything else               → 404; non-GET → 405
// Query strings are ignored.
//
// Shutdown: `ServerHandle::stop` clears `keep_running`; each worker notices
// within one poll interval and exits.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use infinite_etudes_music::{EtudeParams, Generator, catalog};

use crate::config::ServerConfig;
use crate::error::EtudeError;
use crate::key::ArtifactKey;
use crate::orchestrator::Orchestrator;
use crate::store::FsStore;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const ETUDE_PREFIX: &str = "/etude/";

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
    orchestrator: Arc<Orchestrator>,
}

impl ServerHandle {
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Signal the workers to stop and wait for them to exit.
    pub fn stop(self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.wait();
    }

    /// Block until every worker has exited.
    pub fn wait(self) {
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

struct Context {
    orchestrator: Arc<Orchestrator>,
    catalog_json: String,
    index_file: Option<PathBuf>,
}

/// Start the server on background worker threads. Returns a handle for
/// stopping it and the actual bound address (useful when port 0 is used
/// to let the OS pick a free port).
pub fn start_server(
    config: ServerConfig,
    generator: Arc<dyn Generator>,
) -> io::Result<(ServerHandle, SocketAddr)> {
    let store = FsStore::new(&config.artifact_dir).map_err(io::Error::other)?;
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(store),
        generator,
        config.orchestrator(),
    ));

    let server =
        Server::http(SocketAddr::new(config.bind, config.port)).map_err(io::Error::other)?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| io::Error::other("listener has no IP address"))?;
    let server = Arc::new(server);

    let ctx = Arc::new(Context {
        orchestrator: Arc::clone(&orchestrator),
        catalog_json: serde_json::to_string(&catalog::summary())?,
        index_file: config.index_file.clone(),
    });
    let keep_running = Arc::new(AtomicBool::new(true));

    let mut workers = Vec::with_capacity(config.workers.max(1));
    for i in 0..config.workers.max(1) {
        let server = Arc::clone(&server);
        let ctx = Arc::clone(&ctx);
        let keep_running = Arc::clone(&keep_running);
        let worker = thread::Builder::new()
            .name(format!("etude-worker-{i}"))
            .spawn(move || run_worker(&server, &ctx, &keep_running))?;
        workers.push(worker);
    }

    tracing::info!(
        %addr,
        dir = %config.artifact_dir.display(),
        max_age_secs = config.max_age.as_secs(),
        workers = workers.len(),
        "etude server listening"
    );

    Ok((
        ServerHandle {
            keep_running,
            workers,
            orchestrator,
        },
        addr,
    ))
}

fn run_worker(server: &Server, ctx: &Context, keep_running: &AtomicBool) {
    while keep_running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => handle_request(ctx, request),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to receive request");
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Where a request path leads.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Etude(Vec<&'a str>),
    Catalog,
    Status,
    Index,
    NotFound,
}

fn route(url: &str) -> Route<'_> {
    let path = url.split_once('?').map_or(url, |(path, _)| path);
    if let Some(rest) = path.strip_prefix(ETUDE_PREFIX) {
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Route::Etude(Vec::new());
        }
        return Route::Etude(rest.split('/').collect());
    }
    match path {
        "/" | "/index.html" => Route::Index,
        "/etude" => Route::Etude(Vec::new()),
        "/catalog" | "/catalog/" => Route::Catalog,
        "/status" | "/status/" => Route::Status,
        _ => Route::NotFound,
    }
}

fn handle_request(ctx: &Context, request: Request) {
    let started = Instant::now();
    let method = request.method().clone();
    let url = request.url().to_string();

    let status = if method != Method::Get {
        send_text(request, 405, "method not allowed\n")
    } else {
        match route(&url) {
            Route::Etude(segments) => serve_etude(ctx, request, &segments),
            Route::Catalog => send_json(request, ctx.catalog_json.clone()),
            Route::Status => match serde_json::to_string(&ctx.orchestrator.stats()) {
                Ok(json) => send_json(request, json),
                Err(e) => send_text(request, 500, &format!("{e}\n")),
            },
            Route::Index => serve_index(ctx, request),
            Route::NotFound => send_text(request, 404, "not found\n"),
        }
    };

    tracing::info!(
        %method,
        path = %url,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
}

fn serve_etude(ctx: &Context, request: Request, segments: &[&str]) -> u16 {
    let params = match EtudeParams::from_segments(segments) {
        Ok(params) => params,
        Err(e) => return send_text(request, 400, &format!("invalid etude request: {e}\n")),
    };
    let key = ArtifactKey::derive(&params);

    let artifact = ctx
        .orchestrator
        .resolve(&params)
        .and_then(|resolution| {
            tracing::debug!(key = %key, ?resolution, "resolved");
            ctx.orchestrator.open(&key)
        });
    let artifact = match artifact {
        Ok(artifact) => artifact,
        Err(e) => {
            let status = match &e {
                EtudeError::Timeout { .. } => 504,
                EtudeError::Generation(_)
                | EtudeError::Storage(_)
                | EtudeError::InvariantViolation(_) => 500,
            };
            return send_text(request, status, &format!("{e}\n"));
        }
    };

    let disposition = format!("attachment; filename=\"{key}\"");
    let len = usize::try_from(artifact.len).ok();
    send(
        request,
        200,
        &[("Content-Type", "audio/midi"), ("Content-Disposition", disposition.as_str())],
        artifact.reader,
        len,
    )
}

fn serve_index(ctx: &Context, request: Request) -> u16 {
    let file = ctx.index_file.as_ref().and_then(|path| File::open(path).ok());
    let Some(file) = file else {
        return send_text(request, 404, "not found\n");
    };
    let len = file
        .metadata()
        .ok()
        .and_then(|m| usize::try_from(m.len()).ok());
    send(
        request,
        200,
        &[("Content-Type", "text/html; charset=utf-8")],
        file,
        len,
    )
}

fn send_text(request: Request, status: u16, body: &str) -> u16 {
    let bytes = body.as_bytes().to_vec();
    let len = bytes.len();
    send(
        request,
        status,
        &[("Content-Type", "text/plain; charset=utf-8")],
        Cursor::new(bytes),
        Some(len),
    )
}

fn send_json(request: Request, json: String) -> u16 {
    let len = json.len();
    send(
        request,
        200,
        &[("Content-Type", "application/json")],
        Cursor::new(json.into_bytes()),
        Some(len),
    )
}

/// Write one response. Returns `status` for the access log.
fn send<R: Read>(
    request: Request,
    status: u16,
    headers: &[(&str, &str)],
    body: R,
    len: Option<usize>,
) -> u16 {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
        .collect();
    let response = Response::new(StatusCode(status), headers, body, len, None);
    if let Err(e) = request.respond(response) {
        tracing::debug!(error = %e, "client went away before the response was sent");
    }
    status
}
