//! Bounded concurrent passive scanning of many targets

use super::passive::PassiveProbe;
use crate::error::{Result, ZuulError};
use crate::http::Transport;
use crate::models::DEFAULT_CONCURRENCY;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Something worth reporting about one target
#[derive(Debug)]
pub enum ScanEvent {
    Vulnerable(String),
    Error { target: String, error: ZuulError },
}

/// Counts collected while reporting a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub targets: usize,
    pub vulnerable: usize,
    pub errors: usize,
}

/// Runs the passive probe over many targets with a ceiling on probes in flight
pub struct ScanOrchestrator {
    probe: PassiveProbe,
    concurrency: usize,
}

impl ScanOrchestrator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            probe: PassiveProbe::new(transport),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the maximum number of probes running at once (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Starts scanning `targets` in the background.
    ///
    /// Probes are admitted in target order as permits free up. Results are
    /// delivered through the returned stream in completion order.
    pub fn scan(&self, targets: Vec<String>) -> ScanStream {
        let (vulnerable_tx, vulnerable_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();

        let total = targets.len();
        let probe = self.probe.clone();
        let limiter = Arc::new(Semaphore::new(self.concurrency));
        info!(
            "Passive scan of {total} targets, {} at a time",
            self.concurrency
        );

        tokio::spawn(async move {
            let mut set = JoinSet::new();

            for target in targets {
                let Ok(permit) = Arc::clone(&limiter).acquire_owned().await else {
                    error!("Scan limiter closed, {target} not scanned");
                    break;
                };
                let probe = probe.clone();
                let vulnerable_tx = vulnerable_tx.clone();
                let errors_tx = errors_tx.clone();

                set.spawn(async move {
                    let _permit = permit;
                    match probe.scan(&target).await {
                        Ok(rs) if rs.vulnerable => {
                            let _ = vulnerable_tx.send(target);
                        }
                        Ok(rs) => debug!("{target}: not vulnerable ({rs})"),
                        Err(error) => {
                            let _ = errors_tx.send((target, error));
                        }
                    }
                });
            }

            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    error!("Passive probe task panicked: {e}");
                }
            }
            let _ = done_tx.send(());
        });

        ScanStream {
            total,
            vulnerable: vulnerable_rx,
            errors: errors_rx,
            done: done_rx,
            finished: false,
        }
    }
}

/// Results of a running passive scan
pub struct ScanStream {
    total: usize,
    vulnerable: mpsc::UnboundedReceiver<String>,
    errors: mpsc::UnboundedReceiver<(String, ZuulError)>,
    done: oneshot::Receiver<()>,
    finished: bool,
}

impl ScanStream {
    /// Number of targets submitted
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next event in arrival order; `None` once every probe has finished and
    /// all results were handed out.
    pub async fn next(&mut self) -> Option<ScanEvent> {
        loop {
            if self.finished {
                if let Ok(target) = self.vulnerable.try_recv() {
                    return Some(ScanEvent::Vulnerable(target));
                }
                if let Ok((target, error)) = self.errors.try_recv() {
                    return Some(ScanEvent::Error { target, error });
                }
                return None;
            }

            tokio::select! {
                Some(target) = self.vulnerable.recv() => {
                    return Some(ScanEvent::Vulnerable(target));
                }
                Some((target, error)) = self.errors.recv() => {
                    return Some(ScanEvent::Error { target, error });
                }
                _ = &mut self.done => {
                    self.finished = true;
                }
            }
        }
    }

    /// Drains the stream into every event, in arrival order
    pub async fn collect(mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

/// Prints each vulnerable target as it arrives; errors only when `verbose`
pub async fn report<W: Write>(
    mut stream: ScanStream,
    verbose: bool,
    out: &mut W,
) -> Result<ScanSummary> {
    let mut summary = ScanSummary {
        targets: stream.total(),
        ..ScanSummary::default()
    };

    while let Some(event) = stream.next().await {
        match event {
            ScanEvent::Vulnerable(target) => {
                summary.vulnerable += 1;
                writeln!(out, "{target} is vulnerable")?;
            }
            ScanEvent::Error { target, error } => {
                summary.errors += 1;
                if verbose {
                    writeln!(out, "{target}: {error}")?;
                }
            }
        }
        out.flush()?;
    }

    info!(
        "Passive scan finished: {} vulnerable, {} errors out of {} targets",
        summary.vulnerable, summary.errors, summary.targets
    );
    Ok(summary)
}
