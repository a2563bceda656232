//! Adapter supervision.
//!
//! While the run switch is on, the supervisor builds a fresh [`Adapter`],
//! runs it, and after a failure waits `restart_delay_secs` before building
//! the next one. Turning the switch off stops the current adapter cleanly;
//! cancelling the shutdown token ends supervision.

use crate::adapter::Adapter;
use crate::config::{AppConfig, VenueConfig};
use crate::error::AppResult;
use dealer_telemetry::Metrics;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Builds one adapter session bound to the given shutdown token.
pub type AdapterFactory =
    Box<dyn Fn(&VenueConfig, CancellationToken) -> AppResult<Adapter> + Send + Sync>;

/// Read access to whichever adapter is currently running.
#[derive(Clone, Default)]
pub struct AdapterHandle {
    current: Arc<RwLock<Option<Arc<Adapter>>>>,
}

impl AdapterHandle {
    pub fn current(&self) -> Option<Arc<Adapter>> {
        self.current.read().clone()
    }

    /// Status line of the running adapter.
    pub fn status_summary(&self) -> String {
        match self.current() {
            Some(adapter) => adapter.status_summary(),
            None => "stopped".to_string(),
        }
    }

    fn set(&self, adapter: Option<Arc<Adapter>>) {
        *self.current.write() = adapter;
    }
}

pub struct Supervisor {
    config: AppConfig,
    run_switch: watch::Receiver<bool>,
    shutdown: CancellationToken,
    factory: AdapterFactory,
    handle: AdapterHandle,
}

impl Supervisor {
    /// Supervisor building REST-backed adapters.
    pub fn new(
        config: AppConfig,
        run_switch: watch::Receiver<bool>,
        shutdown: CancellationToken,
    ) -> Self {
        Self::with_factory(
            config,
            run_switch,
            shutdown,
            Box::new(|venue: &VenueConfig, token: CancellationToken| {
                Adapter::new(venue.clone(), token)
            }),
        )
    }

    pub fn with_factory(
        config: AppConfig,
        run_switch: watch::Receiver<bool>,
        shutdown: CancellationToken,
        factory: AdapterFactory,
    ) -> Self {
        Self {
            config,
            run_switch,
            shutdown,
            factory,
            handle: AdapterHandle::default(),
        }
    }

    pub fn handle(&self) -> AdapterHandle {
        self.handle.clone()
    }

    /// Supervise until shutdown. Only adapter construction errors escape.
    pub async fn run(mut self) -> AppResult<()> {
        let restart_delay = self.config.supervisor.restart_delay();

        loop {
            if self.shutdown.is_cancelled() {
                info!("Supervisor shutting down");
                return Ok(());
            }

            if !*self.run_switch.borrow_and_update() {
                info!("Run switch off, waiting");
                tokio::select! {
                    () = self.shutdown.cancelled() => continue,
                    changed = self.run_switch.changed() => {
                        if changed.is_err() {
                            info!("Run switch dropped, supervisor exiting");
                            return Ok(());
                        }
                        continue;
                    }
                }
            }

            let session = self.shutdown.child_token();
            let adapter = Arc::new((self.factory)(&self.config.venue, session.clone())?);
            self.handle.set(Some(adapter.clone()));

            let run = adapter.run();
            tokio::pin!(run);
            let result = tokio::select! {
                result = &mut run => result,
                () = wait_switch_off(&mut self.run_switch) => {
                    info!("Run switch turned off, stopping adapter");
                    session.cancel();
                    run.await
                }
            };
            self.handle.set(None);

            match result {
                Ok(()) => continue,
                Err(e) => {
                    Metrics::adapter_restart();
                    error!(
                        error = %e,
                        delay_secs = restart_delay.as_secs(),
                        "Adapter failed, restarting after delay"
                    );
                    tokio::select! {
                        () = self.shutdown.cancelled() => {}
                        () = tokio::time::sleep(restart_delay) => {}
                    }
                }
            }
        }
    }
}

/// Resolve once the switch reads `false`. Never resolves if the switch is dropped.
async fn wait_switch_off(run_switch: &mut watch::Receiver<bool>) {
    loop {
        if !*run_switch.borrow_and_update() {
            return;
        }
        if run_switch.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
