//! Transmit-priority sequencing of multi-frame messages.
//!
//! Frames sharing an identifier receive strictly increasing local transmit
//! priorities, so the controller puts them on the bus in submission order,
//! while unrelated identifiers keep their nominal priority.
use crate::protocol::transport::can_id::CanId;

/// Remembers the two most recent chains as `(identifier, last priority)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrioritySequencer {
    recent: [Option<(CanId, u16)>; 2],
}

impl PrioritySequencer {
    pub const fn new() -> Self {
        Self { recent: [None; 2] }
    }

    /// Priority of the next frame carrying `id`.
    ///
    /// `chain_pending` tells whether a frame with `id` still waits in a slot
    /// or in the queue.
    ///
    /// * same identifier as the most recent chain: that priority + 1;
    /// * same identifier as the older chain: that priority + 1, and the chain
    ///   becomes the most recent one;
    /// * otherwise, or once nothing of the chain is pending, a new chain at
    ///   the nominal priority (identifier bits 28..26).
    pub fn next(&mut self, id: CanId, chain_pending: bool) -> u16 {
        let [latest, older] = self.recent;
        match (latest, older) {
            (Some((last_id, last)), _) if last_id == id && chain_pending => {
                let priority = last.saturating_add(1);
                self.recent = [Some((id, priority)), older];
                priority
            }
            (_, Some((prev_id, prev))) if prev_id == id && chain_pending => {
                let priority = prev.saturating_add(1);
                self.recent = [Some((id, priority)), latest];
                priority
            }
            (Some((last_id, _)), _) if last_id == id => {
                let priority = id.priority() as u16;
                self.recent = [Some((id, priority)), older];
                priority
            }
            _ => {
                let priority = id.priority() as u16;
                self.recent = [Some((id, priority)), latest];
                priority
            }
        }
    }

    /// Forgets both chains.
    pub fn reset(&mut self) {
        self.recent = [None; 2];
    }
}
