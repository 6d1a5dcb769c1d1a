//! Single-owner coordinator runtime
//!
//! Each coordinator owns its state exclusively and processes commands from a
//! bounded mailbox one at a time, so multi-step read-modify-write sequences
//! are atomic with respect to other callers without any locking. Callers
//! talk to a coordinator through a cloneable handle; a reply channel inside
//! the command carries the answer back.

use crate::error::{FlowgateError, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

const MAILBOX_CAPACITY: usize = 64;

/// A stateful service that owns its data and serializes all access to it
#[async_trait]
pub trait Coordinator: Send + 'static {
    type Command: Send + 'static;

    async fn handle(&mut self, command: Self::Command);
}

/// Cloneable sender side of a coordinator's mailbox
pub struct CoordinatorHandle<C> {
    tx: mpsc::Sender<C>,
}

// Manual impl: #[derive(Clone)] would require C: Clone
impl<C> Clone for CoordinatorHandle<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C: Send + 'static> CoordinatorHandle<C> {
    /// Fire-and-forget command
    pub async fn send(&self, command: C) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| FlowgateError::channel("coordinator mailbox closed"))
    }

    /// Request/response command: builds the command around a fresh reply
    /// channel, enqueues it, and awaits the answer
    pub async fn call<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> C + Send) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| FlowgateError::channel("coordinator mailbox closed"))?;
        reply_rx
            .await
            .map_err(|_| FlowgateError::channel("coordinator dropped reply channel"))
    }
}

/// Spawn a coordinator onto the runtime. The task exits once every handle
/// is dropped and the mailbox drains.
pub fn spawn<C: Coordinator>(mut coordinator: C) -> (CoordinatorHandle<C::Command>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(MAILBOX_CAPACITY);

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            coordinator.handle(command).await;
        }
        debug!("coordinator mailbox closed, task exiting");
    });

    (CoordinatorHandle { tx }, task)
}
