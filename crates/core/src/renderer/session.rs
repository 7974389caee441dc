//! Latest-value authentication signal pushed by the renderer.

use tokio::sync::watch;

/// Read side of the authentication signal.
///
/// The renderer publishes a new value whenever a navigation completes;
/// consumers only ever look at the most recent one.
#[derive(Debug, Clone)]
pub struct SessionState {
    rx: watch::Receiver<bool>,
}

/// Write side of the authentication signal.
#[derive(Debug)]
pub struct SessionPublisher {
    tx: watch::Sender<bool>,
}

impl SessionState {
    /// Create a connected publisher/state pair starting at `authenticated`.
    pub fn channel(authenticated: bool) -> (SessionPublisher, SessionState) {
        let (tx, rx) = watch::channel(authenticated);
        (SessionPublisher { tx }, SessionState { rx })
    }

    /// A state that never changes. Useful in tests.
    pub fn fixed(authenticated: bool) -> Self {
        let (tx, rx) = watch::channel(authenticated);
        // Keep the value observable after the sender is gone.
        drop(tx);
        Self { rx }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the session reports authenticated.
    ///
    /// Returns `false` if the publisher went away while still unauthenticated.
    pub async fn wait_until_authenticated(&mut self) -> bool {
        self.rx.wait_for(|authenticated| *authenticated).await.is_ok()
    }
}

impl SessionPublisher {
    /// Publish a new value; no-op if unchanged.
    pub fn publish(&self, authenticated: bool) {
        self.tx.send_if_modified(|current| {
            if *current == authenticated {
                false
            } else {
                *current = authenticated;
                true
            }
        });
    }

    pub fn subscribe(&self) -> SessionState {
        SessionState {
            rx: self.tx.subscribe(),
        }
    }
}
