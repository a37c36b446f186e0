//! Running-state orchestration for the metadata server.

use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

/// The start/shutdown contract the orchestrator drives.
///
/// `shutdown` consumes the server: once stopped, there is nothing left to
/// restart, matching the one-way state machine below.
#[async_trait]
pub trait ManagedServer: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Bind listeners and begin serving.
    async fn start(&mut self) -> Result<(), Self::Error>;

    /// Release listeners and in-flight work.
    async fn shutdown(self) -> Result<(), Self::Error>;
}

/// Orchestrator running states. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Constructed,
    Running,
    Stopped,
    Failed,
}

/// Error type for lifecycle transitions. All variants are fatal.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to start metadata server: {0}")]
    Start(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to stop metadata server: {0}")]
    Shutdown(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("orchestrator already ran to completion")]
    AlreadyTerminated,
}

/// Drives a [`ManagedServer`] through its whole lifetime: start, block on
/// the termination signal, shut down exactly once.
pub struct Orchestrator<S> {
    server: Option<S>,
    state: RunState,
}

impl<S: ManagedServer> Orchestrator<S> {
    pub fn new(server: S) -> Self {
        Self {
            server: Some(server),
            state: RunState::Constructed,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to completion. The signal future is the sole cancellation
    /// trigger; no other work proceeds while blocked on it.
    pub async fn run<F>(&mut self, signal: F) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let mut server = self
            .server
            .take()
            .ok_or(LifecycleError::AlreadyTerminated)?;

        if let Err(e) = server.start().await {
            self.state = RunState::Failed;
            return Err(LifecycleError::Start(Box::new(e)));
        }
        self.state = RunState::Running;
        tracing::info!("Metadata server running; waiting for termination signal");

        signal.await;
        tracing::info!("Termination signal observed; shutting down");

        match server.shutdown().await {
            Ok(()) => {
                self.state = RunState::Stopped;
                Ok(())
            }
            Err(e) => {
                self.state = RunState::Failed;
                Err(LifecycleError::Shutdown(Box::new(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct StubServer {
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail_start: bool,
        fail_shutdown: bool,
    }

    impl StubServer {
        fn new(calls: Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                calls,
                fail_start: false,
                fail_shutdown: false,
            }
        }
    }

    #[async_trait]
    impl ManagedServer for StubServer {
        type Error = io::Error;

        async fn start(&mut self) -> Result<(), io::Error> {
            self.calls.lock().unwrap().push("start");
            if self.fail_start {
                return Err(io::Error::other("bind refused"));
            }
            Ok(())
        }

        async fn shutdown(self) -> Result<(), io::Error> {
            self.calls.lock().unwrap().push("shutdown");
            if self.fail_shutdown {
                return Err(io::Error::other("drain failed"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_then_signal_then_shutdown() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new(StubServer::new(calls.clone()));

        orchestrator.run(std::future::ready(())).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["start", "shutdown"]);
        assert_eq!(orchestrator.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn shutdown_waits_for_signal() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new(StubServer::new(calls.clone()));

        // No signal ever arrives; shutdown must not run.
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.run(std::future::pending()),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*calls.lock().unwrap(), vec!["start"]);
        assert_eq!(orchestrator.state(), RunState::Running);
    }

    #[tokio::test]
    async fn start_failure_is_fatal_and_skips_shutdown() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut server = StubServer::new(calls.clone());
        server.fail_start = true;
        let mut orchestrator = Orchestrator::new(server);

        let err = orchestrator.run(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Start(_)));
        assert_eq!(*calls.lock().unwrap(), vec!["start"]);
        assert_eq!(orchestrator.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn shutdown_failure_is_fatal() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut server = StubServer::new(calls.clone());
        server.fail_shutdown = true;
        let mut orchestrator = Orchestrator::new(server);

        let err = orchestrator.run(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Shutdown(_)));
        assert_eq!(orchestrator.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn no_restart_path() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut orchestrator = Orchestrator::new(StubServer::new(calls.clone()));

        orchestrator.run(std::future::ready(())).await.unwrap();
        let err = orchestrator.run(std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyTerminated));
        assert_eq!(*calls.lock().unwrap(), vec!["start", "shutdown"]);
    }
}
