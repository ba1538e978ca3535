// ── Completion router ──
//
// One pending slot per fire-once hardware operation, keyed by the
// `Ticket` handed to the driver. The firmware update stream is separate:
// it lives for one whole update and carries progress before completion.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::driver::{Completion, InventoryHandle, TagAccessRequest, Ticket};
use crate::error::CoreError;
use crate::reply::ReplySink;

/// The operation a pending slot is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
pub enum PendingKind {
    StopInventory,
    ProgramTag,
    WriteTag,
    LockUnlockTag,
    ReadTag,
    CustomCommandToTag,
    ChangePower,
    FirmwareCheck,
    FirmwareLoad,
    RegionNames,
    RegionSet,
}

impl PendingKind {
    pub fn for_tag_access(request: &TagAccessRequest) -> Self {
        match request {
            TagAccessRequest::Program { .. } => Self::ProgramTag,
            TagAccessRequest::Write { .. } => Self::WriteTag,
            TagAccessRequest::LockUnlock { .. } => Self::LockUnlockTag,
            TagAccessRequest::Read { .. } => Self::ReadTag,
            TagAccessRequest::CustomCommand { .. } => Self::CustomCommandToTag,
            TagAccessRequest::ChangePower { .. } => Self::ChangePower,
        }
    }

    /// Whether `completion` is the right shape for this operation.
    pub fn accepts(self, completion: &Completion) -> bool {
        matches!(
            (self, completion),
            (Self::StopInventory, Completion::StopInventory)
                | (
                    Self::ProgramTag | Self::WriteTag | Self::LockUnlockTag,
                    Completion::TagAccess { .. }
                )
                | (Self::ReadTag, Completion::TagRead { .. })
                | (Self::CustomCommandToTag, Completion::CustomCommand { .. })
                | (Self::ChangePower, Completion::ChangePower { .. })
                | (Self::FirmwareCheck, Completion::FirmwareCheck { .. })
                | (Self::FirmwareLoad, Completion::FirmwareLoaded { .. })
                | (Self::RegionNames, Completion::RegionNames { .. })
                | (Self::RegionSet, Completion::RegionSet { .. })
        )
    }
}

#[derive(Debug)]
struct Pending {
    kind: PendingKind,
    sink: ReplySink,
    /// The inventory run the operation acts on, if any.
    handle: Option<InventoryHandle>,
}

#[derive(Debug, Default)]
pub struct CompletionRouter {
    pending: HashMap<Ticket, Pending>,
    next_ticket: u64,
    firmware: Option<ReplySink>,
}

impl CompletionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn register(&mut self, kind: PendingKind, sink: ReplySink) -> Ticket {
        self.insert(kind, sink, None)
    }

    /// Register a slot for an operation on the inventory run `handle`.
    pub fn register_for(
        &mut self,
        handle: InventoryHandle,
        kind: PendingKind,
        sink: ReplySink,
    ) -> Ticket {
        self.insert(kind, sink, Some(handle))
    }

    fn insert(
        &mut self,
        kind: PendingKind,
        sink: ReplySink,
        handle: Option<InventoryHandle>,
    ) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.pending.insert(ticket, Pending { kind, sink, handle });
        debug!(%ticket, %kind, "completion slot registered");
        ticket
    }

    /// Take the slot for `ticket` if `completion` fits it.
    ///
    /// A completion of the wrong shape leaves the slot in place.
    pub fn complete(&mut self, ticket: Ticket, completion: &Completion) -> Option<ReplySink> {
        let Some(pending) = self.pending.get(&ticket) else {
            warn!(%ticket, "completion for unknown ticket, dropping");
            return None;
        };
        if !pending.kind.accepts(completion) {
            warn!(%ticket, kind = %pending.kind, ?completion, "mismatched completion, dropping");
            return None;
        }
        self.pending.remove(&ticket).map(|p| p.sink)
    }

    // ── Firmware update delegate ─────────────────────────────────

    pub fn firmware_update_in_progress(&self) -> bool {
        self.firmware.is_some()
    }

    /// Bind the firmware update stream. A second update while one is in
    /// flight is refused and the new sink failed.
    pub fn begin_firmware_update(&mut self, sink: ReplySink) -> Result<(), CoreError> {
        if self.firmware.is_some() {
            let err = CoreError::FirmwareUpdateInProgress;
            sink.fail(&err);
            return Err(err);
        }
        self.firmware = Some(sink);
        Ok(())
    }

    pub fn firmware_sink(&self) -> Option<&ReplySink> {
        self.firmware.as_ref()
    }

    pub fn end_firmware_update(&mut self) -> Option<ReplySink> {
        self.firmware.take()
    }

    /// Drop the slots of operations on any of `handles`, ending their
    /// streams without a reply. Returns how many were dropped.
    pub fn abandon_inventories(&mut self, handles: &[InventoryHandle]) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.handle.is_none_or(|h| !handles.contains(&h)));
        let dropped = before - self.pending.len();
        if dropped > 0 {
            debug!(count = dropped, "dropping completions of stopped inventories");
        }
        dropped
    }

    /// Drop every pending slot and the firmware delegate.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "dropping pending completions");
        }
        self.pending.clear();
        self.firmware = None;
    }
}
