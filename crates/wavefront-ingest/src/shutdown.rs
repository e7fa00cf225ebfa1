// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-use stop signal for the accept loop.

use std::sync::Arc;
use tokio::sync::watch;

/// Stop signal observed by the connection acceptor.
///
/// Triggering is sticky: a waiter that starts after the trigger returns
/// immediately. Connection readers and the decode worker do not watch it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    /// Create an untriggered signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Fire the signal. Further calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Check whether the signal has fired.
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal fires.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // The sender lives in `self`, so this only fails if it is gone.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
