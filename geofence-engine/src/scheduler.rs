//! Sampling scheduler
//!
//! Runs a tick callback on a dedicated worker thread at a fixed interval.
//! Only the worker ever calls the callback, so passes never overlap. Control
//! messages (new interval, stop) travel over a bounded channel and are
//! handled between ticks. A worker killed by a panicking tick is reaped by
//! the next `start`.

use crate::config::validate_interval_ms;
use crate::monitor::GeofenceMonitor;
use crate::types::{GeofenceError, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

type TickFn = Arc<Mutex<Box<dyn FnMut() + Send>>>;

#[derive(Debug)]
enum Control {
    SetInterval(Duration),
    Stop,
}

struct Worker {
    control_tx: Sender<Control>,
    join: JoinHandle<()>,
}

/// Timer that drives evaluation passes
pub struct SamplingScheduler {
    interval: Duration,
    on_tick: TickFn,
    worker: Option<Worker>,
}

impl SamplingScheduler {
    /// Create a stopped scheduler that will call `on_tick` every `interval_ms`
    pub fn new<F>(interval_ms: u64, on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        validate_interval_ms(interval_ms)?;
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            on_tick: Arc::new(Mutex::new(Box::new(on_tick))),
            worker: None,
        })
    }

    /// Create a scheduler that ticks a shared monitor
    ///
    /// A poisoned monitor lock is logged and that tick is skipped.
    pub fn for_monitor(interval_ms: u64, monitor: Arc<Mutex<GeofenceMonitor>>) -> Result<Self> {
        Self::new(interval_ms, move || match monitor.lock() {
            Ok(mut guard) => {
                let alerts = guard.tick();
                if !alerts.is_empty() {
                    log::debug!("Pass produced {} alerts", alerts.len());
                }
            }
            Err(_) => log::error!("Monitor lock poisoned, skipping tick"),
        })
    }

    /// Start ticking
    ///
    /// Returns `Ok(false)` if the scheduler was already running.
    pub fn start(&mut self) -> Result<bool> {
        self.reap_dead_worker();
        if self.worker.is_some() {
            log::debug!("Scheduler already running");
            return Ok(false);
        }

        let (control_tx, control_rx) = bounded::<Control>(16);
        let interval = self.interval;
        let on_tick = Arc::clone(&self.on_tick);

        let join = thread::Builder::new()
            .name("geofence-sampler".to_string())
            .spawn(move || worker_loop(interval, on_tick, control_rx))
            .map_err(|e| GeofenceError::Scheduler(format!("failed to spawn sampler thread: {}", e)))?;

        log::info!("Tracking started (every {}ms)", interval.as_millis());
        self.worker = Some(Worker { control_tx, join });
        Ok(true)
    }

    /// Stop ticking and wait for the worker to finish its current pass
    ///
    /// Returns `false` if the scheduler was not running.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };

        // A closed channel also ends the worker loop
        let _ = worker.control_tx.send(Control::Stop);
        if worker.join.join().is_err() {
            log::error!("Sampler thread panicked");
        }

        log::info!("Tracking stopped");
        true
    }

    /// Change the sampling interval
    ///
    /// While running, the worker drops its old timer before starting the new
    /// one. While stopped, the interval is used by the next `start`.
    pub fn set_interval(&mut self, interval_ms: u64) -> Result<()> {
        validate_interval_ms(interval_ms)?;
        self.interval = Duration::from_millis(interval_ms);
        self.reap_dead_worker();

        if let Some(worker) = &self.worker {
            worker
                .control_tx
                .send(Control::SetInterval(self.interval))
                .map_err(|_| GeofenceError::Scheduler("sampler thread is gone".to_string()))?;
            log::info!("Tracking interval changed to {}ms", interval_ms);
        }
        Ok(())
    }

    /// True while the worker thread is running
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |worker| !worker.join.is_finished())
    }

    /// Forget a worker whose thread has died (a panicking tick)
    fn reap_dead_worker(&mut self) {
        if !self.worker.as_ref().map_or(false, |w| w.join.is_finished()) {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join.join().is_err() {
                log::error!("Sampler thread panicked, tracking stopped");
            }
        }
    }

    /// Current sampling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for SamplingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for SamplingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingScheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn worker_loop(interval: Duration, on_tick: TickFn, control_rx: Receiver<Control>) {
    let mut current = interval;
    let mut ticker: Receiver<Instant> = tick(current);

    loop {
        let control = select! {
            recv(control_rx) -> msg => Some(msg),
            recv(ticker) -> _ => None,
        };

        match control {
            None => match on_tick.lock() {
                Ok(mut f) => (*f)(),
                Err(poisoned) => {
                    log::warn!("Previous tick panicked, continuing");
                    let mut f = poisoned.into_inner();
                    (*f)()
                }
            },
            Some(Ok(Control::SetInterval(next))) => {
                log::debug!("Replacing sampler timer: {:?} -> {:?}", current, next);
                current = next;
                ticker = tick(current);
            }
            Some(Ok(Control::Stop)) | Some(Err(_)) => break,
        }
    }
}
