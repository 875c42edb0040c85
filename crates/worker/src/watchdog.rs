//! Watchdog - liveness polling and coordinated shutdown
//!
//! After the start delay the watchdog polls every probe each
//! `monitor_delay`. The first probe reporting dead, or cancellation of the
//! token (termination signal), runs the shutdown hooks once, in
//! registration order. A failing hook is logged and the sequence goes on.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{LivenessProbe, ShutdownHook, WatchdogConfig};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Why the shutdown sequence ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A liveness probe reported dead
    ProbeFailed { probe: String },
    /// The cancellation token was triggered
    Cancelled,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::ProbeFailed { probe } => write!(f, "probe '{probe}' not alive"),
            ShutdownReason::Cancelled => f.write_str("termination requested"),
        }
    }
}

/// Liveness monitor driving the shutdown hooks
pub struct Watchdog {
    probes: Vec<Arc<dyn LivenessProbe>>,
    hooks: Vec<Arc<dyn ShutdownHook>>,
    start_delay: Duration,
    monitor_delay: Duration,
    token: CancellationToken,
    triggered: AtomicBool,
}

impl Watchdog {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self::with_delays(config.start_delay(), config.monitor_delay())
    }

    pub fn with_delays(start_delay: Duration, monitor_delay: Duration) -> Self {
        Self {
            probes: Vec::new(),
            hooks: Vec::new(),
            start_delay,
            monitor_delay,
            token: CancellationToken::new(),
            triggered: AtomicBool::new(false),
        }
    }

    /// Add a liveness probe
    pub fn probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Append a shutdown hook; hooks run in the order they were added
    pub fn hook(mut self, hook: Arc<dyn ShutdownHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Token that triggers the shutdown sequence when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn spawn(self) -> JoinHandle<ShutdownReason> {
        tokio::spawn(self.run())
    }

    /// Monitor until a probe fails or the token is cancelled, then shut down
    #[instrument(
        name = "watchdog_run",
        skip(self),
        fields(probes = self.probes.len(), hooks = self.hooks.len())
    )]
    pub async fn run(self) -> ShutdownReason {
        let reason = self.monitor().await;
        self.shutdown(&reason);
        info!(reason = %reason, "shutdown complete");
        reason
    }

    async fn monitor(&self) -> ShutdownReason {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => return ShutdownReason::Cancelled,
            _ = tokio::time::sleep(self.start_delay) => {}
        }

        let mut interval = tokio::time::interval(self.monitor_delay);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return ShutdownReason::Cancelled,
                _ = interval.tick() => {}
            }

            if let Some(dead) = self.probes.iter().find(|p| !p.is_alive()) {
                warn!(probe = dead.name(), "liveness probe failed");
                return ShutdownReason::ProbeFailed {
                    probe: dead.name().to_string(),
                };
            }
        }
    }

    /// Run every hook once; later calls are no-ops
    pub fn shutdown(&self, reason: &ShutdownReason) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(reason = %reason, hooks = self.hooks.len(), "initiating shutdown");
        for hook in &self.hooks {
            match hook.shutdown() {
                Ok(()) => info!(hook = hook.name(), "shutdown hook done"),
                Err(e) => error!(hook = hook.name(), error = %e, "shutdown hook failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ContractError;
    use std::sync::Mutex;

    struct Flag {
        name: String,
        alive: AtomicBool,
    }

    impl Flag {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                alive: AtomicBool::new(true),
            })
        }
    }

    impl LivenessProbe for Flag {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_alive(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    struct Recorder {
        name: String,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ShutdownHook for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn shutdown(&self) -> Result<(), ContractError> {
            self.log.lock().unwrap().push(self.name.clone());
            if self.fail {
                return Err(ContractError::Other("close failed".into()));
            }
            Ok(())
        }
    }

    fn recorder(name: &str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Arc<Recorder> {
        Arc::new(Recorder {
            name: name.to_string(),
            fail,
            log: Arc::clone(log),
        })
    }

    fn fast() -> Watchdog {
        Watchdog::with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_dead_probe_runs_hooks_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let worker = Flag::new("worker");
        let watchdog = fast()
            .probe(worker.clone())
            .hook(recorder("worker", false, &log))
            .hook(recorder("data_client", true, &log))
            .hook(recorder("backend", false, &log));

        let task = watchdog.spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(log.lock().unwrap().is_empty());

        worker.alive.store(false, Ordering::SeqCst);
        let reason = task.await.unwrap();

        assert_eq!(
            reason,
            ShutdownReason::ProbeFailed {
                probe: "worker".into()
            }
        );
        // the failing hook does not stop the sequence
        assert_eq!(*log.lock().unwrap(), vec!["worker", "data_client", "backend"]);
    }

    #[tokio::test]
    async fn test_cancellation_runs_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let watchdog = Watchdog::with_delays(Duration::from_secs(60), Duration::from_secs(60))
            .probe(Flag::new("worker"))
            .hook(recorder("worker", false, &log));
        let token = watchdog.cancellation_token();

        let task = watchdog.spawn();
        token.cancel();
        let reason = task.await.unwrap();

        assert_eq!(reason, ShutdownReason::Cancelled);
        assert_eq!(*log.lock().unwrap(), vec!["worker"]);
    }

    #[test]
    fn test_shutdown_runs_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let watchdog = fast().hook(recorder("backend", false, &log));

        watchdog.shutdown(&ShutdownReason::Cancelled);
        watchdog.shutdown(&ShutdownReason::Cancelled);

        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_probes_not_polled_before_start_delay() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dead = Flag::new("data_client");
        dead.alive.store(false, Ordering::SeqCst);
        let watchdog = Watchdog::with_delays(Duration::from_millis(50), Duration::from_millis(5))
            .probe(dead)
            .hook(recorder("worker", false, &log));

        let task = watchdog.spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(log.lock().unwrap().is_empty());

        task.await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
