//! Cancellation scopes for accept loops.

use std::sync::Arc;

use futures_util::future::select_all;
use tokio::sync::watch;

/// A cancellation scope.
///
/// Clones share the same scope. A scope created with [`Shutdown::child`]
/// is cancelled by its own trigger or by any ancestor's.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Sender for this scope.
    tx: Arc<watch::Sender<bool>>,
    /// Receivers for this scope and every ancestor.
    chain: Vec<watch::Receiver<bool>>,
}

impl Shutdown {
    /// Create a new root scope.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            chain: vec![rx],
        }
    }

    /// Create a scope cancelled along with `self`, but which can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        let (tx, rx) = watch::channel(false);
        let mut chain = self.chain.clone();
        chain.push(rx);
        Self {
            tx: Arc::new(tx),
            chain,
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            chain: self.chain.clone(),
        }
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether this scope or an ancestor has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.chain.iter().any(|rx| *rx.borrow())
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving half of a [`Shutdown`] scope.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    chain: Vec<watch::Receiver<bool>>,
}

impl ShutdownSignal {
    /// Resolve once the scope or an ancestor is triggered.
    ///
    /// A scope whose owner went away without triggering never resolves.
    pub async fn recv(&mut self) {
        let waits = self.chain.iter_mut().map(|rx| {
            Box::pin(async move {
                let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            })
        });
        select_all(waits).await;
    }

    pub fn is_triggered(&self) -> bool {
        self.chain.iter().any(|rx| *rx.borrow())
    }
}
