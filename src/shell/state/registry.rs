use std::collections::BTreeMap;
use std::os::fd::OwnedFd;

use log::trace;

/// Read ends of numbered pipes whose producers are already running but whose
/// consuming prompt has not arrived yet, keyed by target prompt index. Every
/// key is strictly greater than the current prompt. Descriptors are owned, so
/// dropping the registry (or a drained, unused batch) closes them.
#[derive(Debug, Default)]
pub struct PipeRegistry {
    pending: BTreeMap<u32, Vec<OwnedFd>>,
}

impl PipeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one inbound descriptor for the prompt at `target`. Several
    /// producers may accumulate on the same target.
    pub fn insert(&mut self, target: u32, fd: OwnedFd) {
        trace!("registry: descriptor {fd:?} queued for prompt {target}");
        self.pending.entry(target).or_default().push(fd);
    }

    /// Remove and return everything queued for `target`. Order within the
    /// batch is unspecified. Dropping the returned descriptors closes them.
    pub fn drain(&mut self, target: u32) -> Vec<OwnedFd> {
        let fds = self.pending.remove(&target).unwrap_or_default();
        if !fds.is_empty() {
            trace!("registry: prompt {target} consumes {} descriptor(s)", fds.len());
        }
        fds
    }

    #[cfg(test)]
    fn targets(&self) -> Vec<u32> {
        self.pending.keys().copied().collect()
    }
}
