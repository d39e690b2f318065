use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::EffectSettings;
use crate::error::EffectError;

/// Idle effect threads are reaped after this long
const THREAD_KEEP_ALIVE: Duration = Duration::from_secs(10);

/// Shared worker pool running effect playback tasks.
///
/// Tasks go to the blocking pool of a small tokio runtime: threads are
/// created on demand up to the configured cap, reused, and reaped when idle.
pub(crate) struct EffectPool {
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    accepting: AtomicBool,
}

impl EffectPool {
    pub(crate) fn new(settings: &EffectSettings) -> Result<Self, EffectError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(settings.max_threads.max(1))
            .thread_keep_alive(THREAD_KEEP_ALIVE)
            .thread_name("cadence-effect")
            .build()
            .map_err(|e| EffectError::PoolInit(format!("Failed to create runtime: {}", e)))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            accepting: AtomicBool::new(true),
        })
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Run a blocking task on the pool
    pub(crate) fn submit<F>(&self, task: F) -> Result<(), EffectError>
    where
        F: FnOnce() + Send + 'static,
    {
        if !self.is_accepting() {
            return Err(EffectError::PoolShutdown);
        }
        // Detached; the runtime keeps track of it until shutdown
        let _ = self.handle.spawn_blocking(task);
        Ok(())
    }

    /// Stop accepting work and wait up to `timeout` for running tasks.
    /// Only the first call waits.
    pub(crate) fn shutdown(&self, timeout: Duration) {
        self.accepting.store(false, Ordering::SeqCst);

        let runtime = self.runtime.lock().unwrap_or_else(|p| p.into_inner()).take();
        match runtime {
            Some(runtime) => {
                info!("Shutting down effect pool (waiting up to {:?})", timeout);
                runtime.shutdown_timeout(timeout);
            }
            None => debug!("Effect pool already shut down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_submit_runs_task() {
        let pool = EffectPool::new(&EffectSettings::default()).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.submit(move || tx.send(std::thread::current().name().map(str::to_string)).unwrap())
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("cadence-effect"));
        pool.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_waits_for_running_tasks() {
        let pool = EffectPool::new(&EffectSettings::default()).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        pool.submit(move || {
            started_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(50));
            done_tx.send(()).unwrap();
        })
        .unwrap();

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown(Duration::from_secs(3));
        assert!(done_rx.try_recv().is_ok());
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let pool = EffectPool::new(&EffectSettings::default()).unwrap();
        pool.shutdown(Duration::from_millis(100));
        pool.shutdown(Duration::from_millis(100));

        assert!(!pool.is_accepting());
        assert!(matches!(pool.submit(|| {}), Err(EffectError::PoolShutdown)));
    }
}
