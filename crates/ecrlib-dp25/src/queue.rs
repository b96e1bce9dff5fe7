//! Single-in-flight command queue with NAK-driven retransmission.
//!
//! The device processes one frame at a time and answers strictly in order,
//! so the queue keeps every pending request FIFO and only the head is ever
//! on the wire. Replies are paired with requests by position, never by
//! sequence number.
//!
//! The queue does no I/O. Each operation hands back the frame the caller
//! must write next, if any.

use std::collections::VecDeque;

use bytes::Bytes;
use ecrlib_core::{ConditionSet, Error, FaultSet, Result};

use crate::frame::Frame;
use crate::status;

/// Default number of NAKs tolerated for one frame.
pub const MAX_RETRIES: u32 = 12;

/// The device kept rejecting the in-flight frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("retries exhausted after {retries} NAKs")]
pub struct RetryExhausted {
    pub retries: u32,
}

impl From<RetryExhausted> for Error {
    fn from(e: RetryExhausted) -> Self {
        Error::RetryExhausted { retries: e.retries }
    }
}

/// A successfully settled reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub frame: Frame,
    /// Faults reported with the reply. Only ever non-empty together with
    /// `out_of_paper`.
    pub faults: FaultSet,
    pub conditions: ConditionSet,
    /// The command executed but the printer has no paper left.
    pub out_of_paper: bool,
}

impl Response {
    /// Reply payload as text.
    pub fn text(&self) -> String {
        self.frame.text()
    }

    /// Reply payload split on commas.
    pub fn fields(&self) -> Vec<String> {
        self.frame.fields()
    }
}

/// Outcome of decoding the reply to the head of the queue.
#[derive(Debug)]
pub struct Settled<W> {
    /// Waiter of the request that was answered.
    pub waiter: W,
    /// What the waiter should be told.
    pub outcome: Result<Response>,
    /// Frame to write next, if another request is waiting.
    pub next: Option<Bytes>,
}

/// Turn a decoded frame into the result its waiter receives.
///
/// A gated status is a failure even without an individual fault bit. Out of
/// paper wins over everything else: the command was executed, so the reply
/// is a success flagged with `out_of_paper`.
pub fn settle(frame: Frame) -> Result<Response> {
    let report = status::decode(&frame.status);
    let out_of_paper = report.out_of_paper();

    if report.is_error() && !out_of_paper {
        tracing::warn!(
            command = frame.command,
            faults = %report.faults,
            "device reported a fault"
        );
        return Err(Error::Device(report.faults));
    }

    if out_of_paper {
        tracing::warn!(command = frame.command, "printer is out of paper");
    }

    Ok(Response {
        frame,
        faults: report.faults,
        conditions: report.conditions,
        out_of_paper,
    })
}

struct Entry<W> {
    frame: Bytes,
    waiter: W,
}

/// FIFO of pending requests, at most one of which is in flight.
pub struct CommandQueue<W> {
    entries: VecDeque<Entry<W>>,
    retries: u32,
    max_retries: u32,
}

impl<W> CommandQueue<W> {
    pub fn new() -> Self {
        Self::with_max_retries(MAX_RETRIES)
    }

    pub fn with_max_retries(max_retries: u32) -> Self {
        CommandQueue {
            entries: VecDeque::new(),
            retries: 0,
            max_retries,
        }
    }

    /// Number of pending requests, including the one in flight.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// NAKs received for the in-flight frame so far.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// The frame currently on the wire.
    pub fn in_flight(&self) -> Option<&Bytes> {
        self.entries.front().map(|e| &e.frame)
    }

    /// Queue a frame. Returns it back if it should be written immediately,
    /// which is the case only when nothing else is pending.
    pub fn enqueue(&mut self, frame: Bytes, waiter: W) -> Option<Bytes> {
        let write_now = self.entries.is_empty().then(|| frame.clone());
        self.entries.push_back(Entry { frame, waiter });
        if write_now.is_none() {
            tracing::debug!(pending = self.entries.len(), "command queued behind in-flight frame");
        }
        write_now
    }

    /// The device rejected the in-flight frame.
    ///
    /// Returns the same frame for retransmission, or [`RetryExhausted`] once
    /// `max_retries` NAKs have been received for it. A NAK with nothing in
    /// flight is ignored.
    pub fn on_nak(&mut self) -> std::result::Result<Option<Bytes>, RetryExhausted> {
        let Some(head) = self.entries.front() else {
            tracing::warn!("NAK received with no command in flight");
            return Ok(None);
        };

        self.retries += 1;
        if self.retries >= self.max_retries {
            return Err(RetryExhausted {
                retries: self.retries,
            });
        }

        tracing::debug!(retry = self.retries, "NAK received, retransmitting");
        Ok(Some(head.frame.clone()))
    }

    /// A complete reply arrived for the in-flight frame.
    ///
    /// Returns `None` when nothing was in flight; the frame is dropped.
    pub fn on_frame(&mut self, frame: Frame) -> Option<Settled<W>> {
        let Some(entry) = self.entries.pop_front() else {
            tracing::warn!(
                sequence = frame.sequence,
                command = frame.command,
                "response received with no command in flight, dropping"
            );
            return None;
        };

        self.retries = 0;
        Some(Settled {
            waiter: entry.waiter,
            outcome: settle(frame),
            next: self.entries.front().map(|e| e.frame.clone()),
        })
    }

    /// Remove every pending request, in-flight first.
    pub fn abort(&mut self) -> impl Iterator<Item = W> + '_ {
        self.retries = 0;
        self.entries.drain(..).map(|e| e.waiter)
    }
}

impl<W> Default for CommandQueue<W> {
    fn default() -> Self {
        Self::new()
    }
}
