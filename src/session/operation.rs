//! Completion slots, one per asynchronous request kind
//!
//! ```text
//! Idle ──begin──► Pending(handle) ──complete(ticket)──► Completed
//!   ▲                  │                                   │
//!   └──── abandon ─────┘◄───────────── begin ──────────────┘
//! ```
//!
//! A slot hands out a [`PendingHandle`] when a request is issued. The handle is
//! consumed by the matching completion, so a late or duplicated completion for
//! the same kind finds no handle and is dropped.

use super::provider::{OperationKind, RequestTicket};
use super::SessionError;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Handle owned by a slot while its request is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHandle {
    ticket: RequestTicket,
}

impl PendingHandle {
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }
}

/// Observable state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Pending(PendingHandle),
    Completed,
}

impl OperationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending(_))
    }
}

/// Per-kind slots plus the ticket sequence shared by all of them
#[derive(Debug, Default)]
pub struct OperationSlots {
    slots: HashMap<OperationKind, OperationState>,
    next_seq: u64,
}

impl OperationSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, kind: OperationKind) -> OperationState {
        self.slots.get(&kind).copied().unwrap_or_default()
    }

    /// Moves `kind` to Pending and returns the ticket for the new request.
    ///
    /// Refuses while a request of the same kind is outstanding.
    pub fn begin(&mut self, kind: OperationKind) -> Result<RequestTicket, SessionError> {
        if let OperationState::Pending(handle) = self.state(kind) {
            warn!(
                "Refusing {} request, {} still pending",
                kind,
                handle.ticket()
            );
            return Err(SessionError::OperationPending(kind));
        }

        self.next_seq = self.next_seq.wrapping_add(1);
        let ticket = RequestTicket {
            kind,
            seq: self.next_seq,
        };
        self.slots
            .insert(kind, OperationState::Pending(PendingHandle { ticket }));
        debug!("Slot {} pending with ticket {}", kind, ticket);
        Ok(ticket)
    }

    /// Returns the slot to Idle after the request could not be issued
    pub fn abandon(&mut self, ticket: RequestTicket) {
        if self.owns(ticket) {
            debug!("Abandoning {}", ticket);
            self.slots.insert(ticket.kind, OperationState::Idle);
        }
    }

    /// Consumes the pending handle if `ticket` matches it.
    ///
    /// Returns `false` for stale or unknown tickets, leaving the slot untouched.
    pub fn complete(&mut self, ticket: RequestTicket) -> bool {
        if !self.owns(ticket) {
            warn!("Ignoring completion for {}, no matching pending request", ticket);
            return false;
        }
        self.slots.insert(ticket.kind, OperationState::Completed);
        debug!("Slot {} completed", ticket);
        true
    }

    fn owns(&self, ticket: RequestTicket) -> bool {
        matches!(
            self.state(ticket.kind),
            OperationState::Pending(handle) if handle.ticket == ticket
        )
    }
}
