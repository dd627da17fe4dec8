//! Process run state and termination-signal handling.
//!
//! The controller holds a [`KeepAlive`] token while the process is running.
//! The event loop owns the matching [`LoopHandle`] and exits once the token is
//! released, which happens on the first terminating signal.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{Error, Result};

// tokio has no named constructor for SIGABRT; 6 on every unix.
const SIGABRT: i32 = 6;

/// Signals the listener registers for. Not configurable.
pub fn watched_signals() -> [SignalKind; 5] {
    [
        SignalKind::interrupt(),
        SignalKind::terminate(),
        SignalKind::quit(),
        SignalKind::from_raw(SIGABRT),
        SignalKind::hangup(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Interrupt,
    Terminate,
    Quit,
    Abort,
    Hangup,
    Other(i32),
}

/// What the controller does with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Drain,
    /// Acknowledged, nothing to do. Keeps waiting.
    NoOp,
    Ignore,
}

impl ProcessSignal {
    pub fn from_kind(kind: SignalKind) -> Self {
        if kind == SignalKind::interrupt() {
            Self::Interrupt
        } else if kind == SignalKind::terminate() {
            Self::Terminate
        } else if kind == SignalKind::quit() {
            Self::Quit
        } else if kind == SignalKind::from_raw(SIGABRT) {
            Self::Abort
        } else if kind == SignalKind::hangup() {
            Self::Hangup
        } else {
            Self::Other(kind.as_raw_value())
        }
    }

    pub fn action(self) -> SignalAction {
        match self {
            Self::Interrupt | Self::Terminate | Self::Quit | Self::Abort => SignalAction::Drain,
            Self::Hangup => SignalAction::NoOp,
            Self::Other(_) => SignalAction::Ignore,
        }
    }
}

/// Held while the event loop must keep running. Dropping it releases the loop.
#[derive(Debug)]
pub struct KeepAlive {
    _token: watch::Sender<()>,
}

/// Event-loop side of the keep-alive token.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    rx: watch::Receiver<()>,
}

impl LoopHandle {
    /// Resolves once the keep-alive token has been released.
    pub async fn released(&mut self) {
        while self.rx.changed().await.is_ok() {}
    }

    pub fn is_released(&self) -> bool {
        self.rx.has_changed().is_err()
    }
}

fn keep_alive() -> (KeepAlive, LoopHandle) {
    let (tx, rx) = watch::channel(());
    (KeepAlive { _token: tx }, LoopHandle { rx })
}

#[derive(Debug)]
pub struct LifecycleController {
    state: LifecycleState,
    keep_alive: Option<KeepAlive>,
}

impl LifecycleController {
    pub fn new() -> (Self, LoopHandle) {
        let (token, handle) = keep_alive();
        let controller = Self {
            state: LifecycleState::Running,
            keep_alive: Some(token),
        };
        (controller, handle)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Apply one signal. Returns the action taken.
    pub fn handle_signal(&mut self, sig: ProcessSignal) -> SignalAction {
        let action = sig.action();
        match action {
            SignalAction::Drain => {
                info!("Received {:?}, shutting down", sig);
                self.drain();
            }
            SignalAction::NoOp => info!("Received {:?}, no-op", sig),
            SignalAction::Ignore => debug!("Ignoring {:?}", sig),
        }
        action
    }

    /// Wait for signals until one of them asks to drain. Every non-terminating
    /// signal goes back round the loop to wait for the next one.
    ///
    /// If the signal source closes first, the controller drains as well so the
    /// event loop cannot outlive its signal handling.
    pub async fn run(mut self, mut signals: mpsc::Receiver<ProcessSignal>) -> Self {
        while self.state == LifecycleState::Running {
            match signals.recv().await {
                Some(sig) => {
                    self.handle_signal(sig);
                }
                None => {
                    info!("Signal source closed, shutting down");
                    self.drain();
                }
            }
        }
        self
    }

    /// Running → Draining. Releases the keep-alive token.
    pub fn drain(&mut self) {
        if self.state != LifecycleState::Running {
            return;
        }
        self.state = LifecycleState::Draining;
        self.keep_alive.take();
    }

    /// Draining → Stopped, once teardown is complete.
    pub fn finish(&mut self) {
        self.drain();
        self.state = LifecycleState::Stopped;
        info!("Lifecycle stopped");
    }
}

/// Register the watched OS signals and forward each occurrence into `tx`.
pub fn listen(tx: mpsc::Sender<ProcessSignal>) -> Result<Vec<JoinHandle<()>>> {
    let kinds = watched_signals();
    let mut handles = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let mut stream = signal(kind).map_err(|source| Error::Signal {
            signal: kind.as_raw_value(),
            source,
        })?;
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(ProcessSignal::from_kind(kind)).await.is_err() {
                    break;
                }
            }
        }));
    }
    Ok(handles)
}
