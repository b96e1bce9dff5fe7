//! IO task that owns the transport and runs the protocol engine.
//!
//! All protocol state lives here: the frame encoder with its sequence
//! counter, the byte-wise response decoder, and the command queue. Callers
//! talk to the task over an mpsc channel and get their reply back on a
//! oneshot, so nothing in this module needs a lock.
//!
//! Stream faults (a framing violation, exhausted retries, a failed write or
//! read) end the task. The request on the wire receives the fault itself,
//! everything queued behind it receives [`Error::ConnectionLost`], and later
//! requests fail with [`Error::NotConnected`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use ecrlib_core::error::{Error, Result};
use ecrlib_core::transport::Transport;

use crate::decoder::{Event, FrameDecoder};
use crate::frame::FrameEncoder;
use crate::queue::{CommandQueue, Response};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Configuration for the IO task.
#[derive(Debug, Clone)]
pub(crate) struct IoConfig {
    /// NAKs tolerated for one frame before the connection is abandoned.
    pub max_retries: u32,
    /// Reject responses whose checksum does not match.
    pub verify_checksum: bool,
    /// How long a single transport read waits before the loop checks for
    /// new requests again.
    pub poll_interval: Duration,
}

type Waiter = oneshot::Sender<Result<Response>>;

/// A request sent from the device handle to the IO task.
pub(crate) enum Request {
    /// Frame and send a command, reply with its settled response.
    Command {
        command: u8,
        data: Vec<u8>,
        reply: Waiter,
    },
    /// Graceful shutdown; returns the transport.
    Shutdown {
        reply: oneshot::Sender<Box<dyn Transport>>,
    },
}

/// Handle to the IO task. Stored inside `Dp25`.
pub(crate) struct DeviceIo {
    pub cmd_tx: mpsc::Sender<Request>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl DeviceIo {
    /// Queue a command and wait for its settled response.
    ///
    /// A `timeout` only bounds this wait. The command stays queued, so the
    /// next reply is still paired with it.
    pub async fn command(
        &self,
        command: u8,
        data: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Command {
                command,
                data,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Error::NotConnected)?;

        let reply = match timeout {
            Some(limit) => tokio::time::timeout(limit, reply_rx)
                .await
                .map_err(|_| Error::Timeout)?,
            None => reply_rx.await,
        };
        reply.map_err(|_| Error::NotConnected)?
    }

    /// Stop the IO task and recover the transport.
    pub async fn shutdown(&mut self) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Request::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| Error::NotConnected)?;
        let transport = reply_rx.await.map_err(|_| Error::NotConnected)?;
        let _ = (&mut self.task).await;
        Ok(transport)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Spawn the IO task. Returns the handle for sending commands.
pub(crate) fn spawn_io_task(transport: Box<dyn Transport>, config: IoConfig) -> DeviceIo {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Request>(32);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let task = tokio::spawn(io_loop(transport, config, cmd_rx, cancel_clone));

    DeviceIo {
        cmd_tx,
        cancel,
        task,
    }
}

// ---------------------------------------------------------------------------
// IO loop
// ---------------------------------------------------------------------------

/// Pause after an empty read so a transport that times out instantly does
/// not spin the loop.
const IDLE_BACKOFF: Duration = Duration::from_millis(5);

/// What woke the loop up.
enum Wake {
    Cancelled,
    Request(Option<Request>),
    Read(Result<usize>),
}

/// The main IO loop. Runs as a spawned Tokio task.
///
/// Uses `tokio::select! { biased; }` to prioritize:
/// 1. Cancellation
/// 2. Incoming requests
/// 3. Reading the device
///
/// Received bytes are handled after the select has finished, so decoding a
/// chunk is never interrupted half way.
async fn io_loop(
    mut transport: Box<dyn Transport>,
    config: IoConfig,
    mut cmd_rx: mpsc::Receiver<Request>,
    cancel: CancellationToken,
) {
    let mut encoder = FrameEncoder::new();
    let mut decoder = if config.verify_checksum {
        FrameDecoder::with_checksum_verification()
    } else {
        FrameDecoder::new()
    };
    let mut queue: CommandQueue<Waiter> = CommandQueue::with_max_retries(config.max_retries);
    let mut buf = [0u8; 256];

    debug!(
        max_retries = config.max_retries,
        verify_checksum = config.verify_checksum,
        "IO task started"
    );

    loop {
        let wake = tokio::select! {
            biased;

            _ = cancel.cancelled() => Wake::Cancelled,
            request = cmd_rx.recv() => Wake::Request(request),
            read = transport.receive(&mut buf, config.poll_interval) => Wake::Read(read),
        };

        let outcome = match wake {
            Wake::Cancelled => {
                debug!("IO task cancelled");
                abandon(&mut queue);
                return;
            }
            Wake::Request(None) => {
                debug!("all command senders dropped, exiting IO task");
                abandon(&mut queue);
                return;
            }
            Wake::Request(Some(Request::Shutdown { reply })) => {
                debug!("IO task shutdown requested");
                abandon(&mut queue);
                let _ = reply.send(transport);
                return;
            }
            Wake::Request(Some(Request::Command {
                command,
                data,
                reply,
            })) => match encoder.build(command, &data) {
                Ok(frame) => match queue.enqueue(frame, reply) {
                    Some(frame) => write_frame(&mut *transport, &frame).await,
                    None => Ok(()),
                },
                Err(e) => {
                    let _ = reply.send(Err(e));
                    Ok(())
                }
            },
            Wake::Read(Ok(n)) => handle_bytes(&mut *transport, &mut decoder, &mut queue, &buf[..n]).await,
            Wake::Read(Err(Error::Timeout)) => {
                tokio::time::sleep(IDLE_BACKOFF).await;
                Ok(())
            }
            Wake::Read(Err(e)) => Err(e),
        };

        if let Err(fault) = outcome {
            tracing::error!(error = %fault, "fatal stream fault, closing connection");
            fail_all(&mut queue, fault);
            cmd_rx.close();
            while let Ok(request) = cmd_rx.try_recv() {
                if let Request::Command { reply, .. } = request {
                    let _ = reply.send(Err(Error::ConnectionLost));
                }
            }
            if let Err(e) = transport.close().await {
                tracing::warn!(error = %e, "failed to close transport after fault");
            }
            return;
        }
    }
}

/// Feed a chunk of received bytes through the decoder, one byte at a time,
/// and act on every event. An `Err` is a stream fault.
async fn handle_bytes(
    transport: &mut dyn Transport,
    decoder: &mut FrameDecoder,
    queue: &mut CommandQueue<Waiter>,
    bytes: &[u8],
) -> Result<()> {
    for &byte in bytes {
        let event = match decoder.push(byte)? {
            Some(event) => event,
            None => continue,
        };

        let next = match event {
            Event::Syn => {
                debug!("device busy (SYN)");
                None
            }
            Event::Nak => queue.on_nak()?,
            Event::Frame(frame) => queue.on_frame(frame).and_then(|settled| {
                let _ = settled.waiter.send(settled.outcome);
                settled.next
            }),
        };

        if let Some(frame) = next {
            write_frame(transport, &frame).await?;
        }
    }
    Ok(())
}

async fn write_frame(transport: &mut dyn Transport, frame: &[u8]) -> Result<()> {
    tracing::trace!(bytes = frame.len(), data = ?frame, "writing frame");
    transport.send(frame).await
}

/// The in-flight request gets `fault`; every other pending request gets
/// [`Error::ConnectionLost`].
fn fail_all(queue: &mut CommandQueue<Waiter>, fault: Error) {
    let mut waiters = queue.abort();
    if let Some(head) = waiters.next() {
        let _ = head.send(Err(fault));
    }
    for waiter in waiters {
        let _ = waiter.send(Err(Error::ConnectionLost));
    }
}

fn abandon(queue: &mut CommandQueue<Waiter>) {
    for waiter in queue.abort() {
        let _ = waiter.send(Err(Error::ConnectionLost));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
