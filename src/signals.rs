//! Termination requests and the shared cancellation handle.
//!
//! # Design Decisions
//! - SIGINT and SIGTERM both request a graceful shutdown
//! - The first request raises the [`ShutdownSignal`]; what a repeated request
//!   does is governed by [`RepeatSignalPolicy`]
//! - The request stream is injectable so the policy can be driven without OS signals

use crate::app::ShutdownTrigger;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info, warn, Instrument};

/// A termination request delivered by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationRequest::Interrupt => write!(f, "SIGINT"),
            TerminationRequest::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Behaviour when a termination request arrives after shutdown has begun
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatSignalPolicy {
    /// Abandon the graceful shutdown and report a forced exit
    #[default]
    Escalate,
    /// Log the request and keep waiting for the graceful shutdown
    Ignore,
}

/// One-shot, process-wide cancellation shared by the orchestrator and its components.
///
/// Cloning yields another handle to the same signal. The first call to
/// [`ShutdownSignal::trigger`] records the cause and cancels; every later call
/// is a no-op. Cancellation is never reset.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    force: CancellationToken,
    cause: Arc<OnceLock<ShutdownTrigger>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that actually raised it.
    pub fn trigger(&self, cause: ShutdownTrigger) -> bool {
        match self.cause.set(cause) {
            Ok(()) => {
                self.token.cancel();
                true
            }
            Err(ignored) => {
                debug!(cause = %ignored, "shutdown already triggered");
                false
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cause recorded by the first trigger
    pub fn cause(&self) -> Option<ShutdownTrigger> {
        self.cause.get().cloned()
    }

    /// Resolves once the signal has been raised, immediately if it already was
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Wait for the signal and return the cause that raised it
    pub async fn triggered(&self) -> ShutdownTrigger {
        self.token.cancelled().await;
        self.cause
            .get()
            .cloned()
            .expect("token is only cancelled after the cause is recorded")
    }

    /// A token for a component to observe. Cancelling it does not raise the signal.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Abandon any graceful shutdown still in progress
    pub fn force(&self) {
        self.force.cancel();
    }

    pub fn is_forced(&self) -> bool {
        self.force.is_cancelled()
    }

    pub fn forced(&self) -> WaitForCancellationFuture<'_> {
        self.force.cancelled()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("triggered", &self.is_triggered())
            .field("forced", &self.is_forced())
            .field("cause", &self.cause.get())
            .finish()
    }
}

/// Bridges termination requests into a [`ShutdownSignal`]
pub struct SignalSource<S> {
    requests: S,
    policy: RepeatSignalPolicy,
}

impl SignalSource<BoxStream<'static, TerminationRequest>> {
    /// Listen for SIGINT and SIGTERM. Must be called from within the tokio runtime.
    pub fn os(policy: RepeatSignalPolicy) -> Self {
        Self::new(os_requests(), policy)
    }
}

impl<S> SignalSource<S>
where
    S: Stream<Item = TerminationRequest> + Send + Unpin + 'static,
{
    pub fn new(requests: S, policy: RepeatSignalPolicy) -> Self {
        Self { requests, policy }
    }

    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.listen(shutdown).in_current_span())
    }

    /// Wait for termination requests until the stream ends
    pub async fn listen(mut self, shutdown: ShutdownSignal) {
        let Some(first) = self.requests.next().await else {
            return;
        };

        info!(signal = %first, "shutdown signal received, starting graceful shutdown");
        shutdown.trigger(ShutdownTrigger::Signal(first));

        while let Some(request) = self.requests.next().await {
            match self.policy {
                RepeatSignalPolicy::Escalate => {
                    warn!(signal = %request, "repeated termination request, forcing shutdown");
                    shutdown.force();
                    return;
                }
                RepeatSignalPolicy::Ignore => {
                    warn!(signal = %request, "already shutting down, ignoring termination request");
                }
            }
        }
    }
}

#[cfg(unix)]
fn os_requests() -> BoxStream<'static, TerminationRequest> {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn register(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("Failed to install {} handler: {}", name, e);
                None
            }
        }
    }

    async fn recv(sig: &mut Option<Signal>) -> Option<()> {
        match sig {
            Some(sig) => sig.recv().await,
            None => std::future::pending().await,
        }
    }

    let interrupt = register(SignalKind::interrupt(), "SIGINT");
    let terminate = register(SignalKind::terminate(), "SIGTERM");

    stream::unfold(
        (interrupt, terminate),
        |(mut interrupt, mut terminate)| async move {
            let request = tokio::select! {
                Some(()) = recv(&mut interrupt) => TerminationRequest::Interrupt,
                Some(()) = recv(&mut terminate) => TerminationRequest::Terminate,
                else => return None,
            };
            Some((request, (interrupt, terminate)))
        },
    )
    .boxed()
}

#[cfg(not(unix))]
fn os_requests() -> BoxStream<'static, TerminationRequest> {
    stream::unfold((), |()| async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some((TerminationRequest::Interrupt, ())),
            Err(e) => {
                warn!("Failed to listen for ctrl-c: {}", e);
                None
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_trigger_is_idempotent() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_triggered());
        assert!(shutdown.cause().is_none());

        assert!(shutdown.trigger(ShutdownTrigger::Signal(TerminationRequest::Terminate)));
        assert!(!shutdown.trigger(ShutdownTrigger::Signal(TerminationRequest::Interrupt)));

        assert!(shutdown.is_triggered());
        assert_eq!(
            shutdown.cause(),
            Some(ShutdownTrigger::Signal(TerminationRequest::Terminate))
        );
    }

    #[test]
    fn test_child_tokens_observe_cancellation_regardless_of_order() {
        let shutdown = ShutdownSignal::new();
        let early = shutdown.child_token();

        shutdown.trigger(ShutdownTrigger::Signal(TerminationRequest::Interrupt));
        let late = shutdown.child_token();

        assert!(early.is_cancelled());
        assert!(late.is_cancelled());
    }

    #[test]
    fn test_cancelling_child_token_does_not_raise_signal() {
        let shutdown = ShutdownSignal::new();
        let child = shutdown.child_token();
        child.cancel();

        assert!(!shutdown.is_triggered());
        assert!(shutdown.cause().is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let shutdown = ShutdownSignal::new();
        let clone = shutdown.clone();

        let waiter = tokio::spawn(async move {
            clone.cancelled().await;
            clone.cause()
        });

        shutdown.trigger(ShutdownTrigger::ComponentExited {
            component: "http".to_string(),
        });

        let cause = timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            cause,
            Some(ShutdownTrigger::ComponentExited {
                component: "http".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_first_request_triggers_shutdown() {
        let (tx, rx) = mpsc::unbounded();
        let shutdown = ShutdownSignal::new();
        let handle = SignalSource::new(rx, RepeatSignalPolicy::Escalate).spawn(shutdown.clone());

        tx.unbounded_send(TerminationRequest::Terminate).unwrap();
        timeout(Duration::from_secs(1), shutdown.cancelled())
            .await
            .unwrap();

        assert_eq!(
            shutdown.cause(),
            Some(ShutdownTrigger::Signal(TerminationRequest::Terminate))
        );
        assert!(!shutdown.is_forced());

        drop(tx);
        timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!shutdown.is_forced());
    }

    #[tokio::test]
    async fn test_repeated_request_escalates() {
        let (tx, rx) = mpsc::unbounded();
        let shutdown = ShutdownSignal::new();
        let handle = SignalSource::new(rx, RepeatSignalPolicy::Escalate).spawn(shutdown.clone());

        tx.unbounded_send(TerminationRequest::Interrupt).unwrap();
        tx.unbounded_send(TerminationRequest::Interrupt).unwrap();

        timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(shutdown.is_triggered());
        assert!(shutdown.is_forced());
    }

    #[tokio::test]
    async fn test_repeated_request_ignored() {
        let (tx, rx) = mpsc::unbounded();
        let shutdown = ShutdownSignal::new();
        let handle = SignalSource::new(rx, RepeatSignalPolicy::Ignore).spawn(shutdown.clone());

        tx.unbounded_send(TerminationRequest::Interrupt).unwrap();
        tx.unbounded_send(TerminationRequest::Terminate).unwrap();
        drop(tx);

        timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!shutdown.is_forced());
        assert_eq!(
            shutdown.cause(),
            Some(ShutdownTrigger::Signal(TerminationRequest::Interrupt))
        );
    }

    #[test]
    fn test_termination_request_display() {
        assert_eq!(TerminationRequest::Interrupt.to_string(), "SIGINT");
        assert_eq!(TerminationRequest::Terminate.to_string(), "SIGTERM");
    }
}
