// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the registry protocol.
//!
//! Accepts TCP connections and handles each in a spawned task. A
//! connection serves requests until the client closes it; when the master
//! demands an auth token, the first request must be a Hello carrying it.
//! Workflow runs race against client disconnect: a caller that goes away
//! takes its run down with it.

use crate::handlers;
use crate::registry::Registry;
use crate::Config;
use sloth_core::SystemClock;
use sloth_engine::Runner;
use sloth_storage::Store;
use sloth_wire::{
    read_frame, write_frame, ProtocolError, Request, RequestErrorKind, Response,
    DEFAULT_IPC_TIMEOUT, PROTOCOL_VERSION,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shared daemon context for all request handlers.
pub struct MasterCtx {
    pub store: Arc<Store>,
    pub registry: Registry<SystemClock>,
    pub runner: Runner<SystemClock>,
    pub config: Config,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    /// Cancels in-flight runs on daemon shutdown.
    pub run_cancel: CancellationToken,
}

/// Listener task accepting registry connections.
pub struct Listener {
    tcp: TcpListener,
    ctx: Arc<MasterCtx>,
}

impl Listener {
    pub fn new(tcp: TcpListener, ctx: Arc<MasterCtx>) -> Self {
        Self { tcp, ctx }
    }

    /// Run the accept loop until the process shuts down.
    pub async fn run(self) {
        loop {
            match self.tcp.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection");
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        ProtocolError::Timeout => debug!("connection timeout"),
        other => error!("connection error: {}", other),
    }
}

/// Serve one connection: requests until EOF.
async fn handle_connection(stream: TcpStream, ctx: &MasterCtx) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    let mut authenticated = ctx.config.auth_token.is_none();

    loop {
        let request: Request = match read_frame(&mut reader, handshake_timeout()).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };

        // Token-guarded masters demand a Hello first.
        if !authenticated {
            match &request {
                Request::Hello { token, .. } => {
                    if token.as_deref() == ctx.config.auth_token.as_deref() {
                        authenticated = true;
                    } else {
                        let response =
                            Response::error(RequestErrorKind::Unauthorized, "unauthorized");
                        write_frame(&mut writer, &response, DEFAULT_IPC_TIMEOUT).await?;
                        return Ok(());
                    }
                }
                _ => {
                    let response = Response::error(
                        RequestErrorKind::Unauthorized,
                        "connections must start with Hello",
                    );
                    write_frame(&mut writer, &response, DEFAULT_IPC_TIMEOUT).await?;
                    return Ok(());
                }
            }
        }

        // Queries and heartbeats are frequent; log them at debug only.
        match &request {
            Request::AgentHeartbeat { .. } | Request::Ping | Request::Hello { .. } => {
                debug!(request = ?request, "received request")
            }
            _ => info!(request = ?request, "received request"),
        }

        // RunWorkflow is long-running and consumes the connection: the
        // read half becomes a disconnect watch that cancels the run.
        if let Request::RunWorkflow { stack, source, format, workflow, params, base_dir, force } =
            request
        {
            let cancel = ctx.run_cancel.child_token();
            let watch = cancel.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1];
                let _ = reader.read(&mut buf).await;
                watch.cancel();
            });

            let response = handlers::run::handle(
                ctx,
                handlers::run::RunParams { stack, source, format, workflow, params, base_dir, force },
                cancel,
            )
            .await;
            // Long timeout: the report can be large and the client slow.
            write_frame(&mut writer, &response, DEFAULT_IPC_TIMEOUT).await?;
            return Ok(());
        }

        let response = handle_request(request, ctx).await;
        debug!(response = ?response, "sending response");
        write_frame(&mut writer, &response, DEFAULT_IPC_TIMEOUT).await?;
    }
}

/// First-frame read timeout: generous enough for slow dials, small enough
/// to shed dead connections.
fn handshake_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(30)
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, ctx: &MasterCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { .. } => Response::Hello { version: PROTOCOL_VERSION.to_string() },

        Request::AgentRegister { name, address, version, system_info } => {
            handlers::agents::register(ctx, &name, &address, &version, system_info)
        }

        Request::AgentHeartbeat { name } => handlers::agents::heartbeat(ctx, &name),

        Request::AgentList { status } => handlers::agents::list(ctx, status.as_deref()),

        Request::AgentResolve { name } => handlers::agents::resolve(ctx, &name),

        Request::AgentMarkInactive { name, reason } => {
            handlers::agents::mark_inactive(ctx, &name, &reason)
        }

        Request::AgentRemove { name } => handlers::agents::remove(ctx, &name),

        Request::AgentStop { name } => handlers::agents::stop(ctx, &name).await,

        Request::AgentUpdate { name, target_version } => {
            handlers::agents::update(ctx, &name, &target_version).await
        }

        Request::StackList => handlers::stacks::list(ctx),

        Request::StackShow { stack } => handlers::stacks::show(ctx, &stack),

        Request::StackDelete { stack } => handlers::stacks::delete(ctx, &stack),

        Request::StateVersions { stack } => handlers::stacks::versions(ctx, &stack),

        Request::StateRollback { stack, version, force } => {
            handlers::stacks::rollback(ctx, &stack, version, force)
        }

        Request::StateDrift { stack, observed } => {
            handlers::stacks::drift(ctx, &stack, &observed)
        }

        Request::Status => handlers::status(ctx),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        // Intercepted in handle_connection before reaching here.
        Request::RunWorkflow { .. } => {
            Response::error(RequestErrorKind::Internal, "unroutable request")
        }
    }
}

#[cfg(test)]
pub(crate) async fn spawn_test_master(dir: &std::path::Path) -> (Arc<MasterCtx>, String) {
    use sloth_core::NullScriptRuntime;
    use sloth_engine::{RunnerDeps, StackManager, StoreResolver, TcpAgentChannel};

    let mut config = Config::at(dir.to_path_buf());
    config.auth_token = None;
    let store = Arc::new(Store::open(&config.state_dir).unwrap());
    let clock = SystemClock;
    let deps = RunnerDeps {
        script: Arc::new(NullScriptRuntime::new()),
        resolver: Arc::new(StoreResolver::new(Arc::clone(&store))),
        channel: Arc::new(TcpAgentChannel::new()),
    };
    let runner =
        Runner::new(StackManager::new(Arc::clone(&store), clock.clone()), deps, clock.clone());

    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = tcp.local_addr().unwrap().to_string();
    config.listen_addr = address.clone();

    let ctx = Arc::new(MasterCtx {
        registry: Registry::new(Arc::clone(&store), clock),
        store,
        runner,
        config,
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
        run_cancel: CancellationToken::new(),
    });
    tokio::spawn(Listener::new(tcp, Arc::clone(&ctx)).run());
    (ctx, address)
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
