// ============================================================
// Layer 6 — Interrupt Flag
// ============================================================
// Lets Ctrl-C stop training cleanly instead of killing the
// process mid-epoch: a helper thread waits for the signal and
// raises a shared flag; the training loop checks the flag
// between batches, stops, and saves what it has learned so far.
//
// A second Ctrl-C is also swallowed once the handler is
// installed; training always stops at a batch boundary.

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Spawn a thread that raises this flag on Ctrl-C.
    pub fn install_ctrl_c(&self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
            .context("Cannot start signal runtime")?;

        let flag = self.clone();
        std::thread::Builder::new()
            .name("ctrl-c".into())
            .spawn(move || {
                runtime.block_on(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            tracing::warn!("Interrupt received, stopping after the current batch");
                            flag.trigger();
                        }
                        Err(e) => tracing::error!("Failed to listen for Ctrl-C: {e}"),
                    }
                })
            })
            .context("Cannot spawn Ctrl-C listener thread")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag  = InterruptFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_set());
        flag.trigger();
        assert!(clone.is_set());
    }
}
