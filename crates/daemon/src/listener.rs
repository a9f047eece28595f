// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! them without blocking anything else. Ordinary requests are one
//! request/one response; `Subscribe` turns the connection into a long-lived
//! frame stream fed from the trace bus.

use std::sync::Arc;

use crate::lifecycle::DaemonSupervisor;
use crate::protocol::{self, ClientFrame, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use pf_core::ProjectId;
use pf_engine::{Frame, TraceBus};
use pf_sandbox::SandboxManager;
use pf_storage::SnapshotStore;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, warn};

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub supervisor: Arc<DaemonSupervisor>,
    pub sandbox: SandboxManager,
    pub snapshots: SnapshotStore,
    pub bus: TraceBus,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run the listener loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;
    debug!(request = ?request, "received request");

    if let Request::Subscribe { project_id } = request {
        return handle_subscribe(reader, writer, ctx, project_id).await;
    }

    let response = handle_request(request, ctx);
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

fn handle_request(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::StartRun {
            project_id,
            pack_id,
        } => match ctx.supervisor.start_run(&project_id, &pack_id) {
            Ok(run_id) => Response::RunStarted { run_id },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::StopRun { project_id } => Response::RunStopped {
            stopped: ctx.supervisor.stop_run(&project_id),
        },

        Request::GetTrace { project_id } => Response::Trace {
            tree: ctx.bus.tree(&project_id).map(Box::new),
        },

        Request::PreviewStatus { project_id } => Response::Preview {
            info: ctx.sandbox.current_status(&project_id),
        },

        Request::PreviewStop { project_id } => {
            ctx.sandbox.stop_current(&project_id);
            Response::Ok
        }

        Request::HistoricalStart {
            project_id,
            iteration,
        } => start_historical(ctx, &project_id, iteration),

        Request::HistoricalStatus {
            project_id,
            iteration,
        } => Response::Preview {
            info: ctx.sandbox.historical_status(&project_id, iteration),
        },

        Request::HistoricalStop {
            project_id,
            iteration,
        } => {
            ctx.sandbox.stop_historical(&project_id, iteration);
            Response::Ok
        }

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        // Subscribe is intercepted before this point.
        Request::Subscribe { .. } => Response::Error {
            message: "subscribe must be the connection's only request".to_string(),
        },
    }
}

/// Extract the iteration's snapshot (idempotent) and serve it.
fn start_historical(ctx: &ListenCtx, project: &ProjectId, iteration: u32) -> Response {
    let runtime_ws = match ctx.snapshots.extract(project, iteration) {
        Ok(dir) => dir,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };
    match ctx.sandbox.start_historical(project, iteration, &runtime_ws) {
        Ok(info) => Response::Preview { info },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

/// Long-lived subscriber stream: replayed history, then live frames.
/// Inbound `ping` frames are answered with an error-kind `pong`.
async fn handle_subscribe(
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    ctx: &ListenCtx,
    project: ProjectId,
) -> Result<(), ConnectionError> {
    let mut frames = ctx.bus.subscribe(&project);
    let mut inbound = spawn_inbound_reader(reader);

    loop {
        tokio::select! {
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else { break };
                let data = protocol::encode(&frame)?;
                protocol::write_message(&mut writer, &data).await?;
            }
            maybe_client = inbound.recv() => {
                match maybe_client {
                    Some(ClientFrame::Ping) => {
                        let pong = Frame::Error {
                            message: "pong".to_string(),
                        };
                        let data = protocol::encode(&pong)?;
                        protocol::write_message(&mut writer, &data).await?;
                    }
                    None => break, // client went away
                }
            }
        }
    }
    Ok(())
}

/// Read client frames on a dedicated task so stream writes never race a
/// partially-read message.
fn spawn_inbound_reader(mut reader: OwnedReadHalf) -> mpsc::Receiver<ClientFrame> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            match protocol::read_message(&mut reader).await {
                Ok(bytes) => match protocol::decode::<ClientFrame>(&bytes) {
                    Ok(frame) => {
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!(error = %e, "ignoring unparseable client frame"),
                },
                Err(_) => break,
            }
        }
    });
    rx
}
