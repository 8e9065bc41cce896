//! Global FIFO queue in front of the remote inference service.
//!
//! A single worker task owns the client and dispatches one call at a time.
//! Between calls it waits the inter-call delay, keeps the number of calls
//! inside a rolling window under the limit, and after a rate-limit or quota
//! error holds every following call for the cool-down. Callers that stop
//! waiting are skipped if their job has not started; an in-flight call
//! runs to completion and its result is dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::remote::{InferenceRequest, InferenceResponse, RemoteInference};
use crate::config::RemoteServiceConfig;
use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub inter_call_delay: Duration,
    pub max_calls_per_window: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl QueueSettings {
    pub fn from_config(config: &RemoteServiceConfig) -> Self {
        Self {
            inter_call_delay: Duration::from_millis(config.inter_call_delay_ms),
            max_calls_per_window: config.max_calls_per_window.max(1),
            window: Duration::from_secs(config.window_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

type Reply = oneshot::Sender<Result<InferenceResponse, PlanError>>;

struct Job {
    request: InferenceRequest,
    reply: Reply,
}

#[derive(Clone)]
pub struct RemoteQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl RemoteQueue {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(client: Arc<dyn RemoteInference>, settings: QueueSettings) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(client, settings, rx));
        Self { jobs }
    }

    /// Enqueue a call and wait for its result.
    pub async fn submit(&self, request: InferenceRequest) -> Result<InferenceResponse, PlanError> {
        let (reply, result) = oneshot::channel();
        self.jobs
            .send(Job { request, reply })
            .map_err(|_| PlanError::RemoteTransport("remote queue is shut down".to_string()))?;
        result
            .await
            .map_err(|_| PlanError::RemoteTransport("remote queue dropped the call".to_string()))?
    }
}

/// Rolling-window and spacing state of the worker.
struct Pacer {
    settings: QueueSettings,
    last_finished: Option<Instant>,
    recent_starts: VecDeque<Instant>,
    cooldown_until: Option<Instant>,
}

impl Pacer {
    fn new(settings: QueueSettings) -> Self {
        Self {
            settings,
            last_finished: None,
            recent_starts: VecDeque::new(),
            cooldown_until: None,
        }
    }

    /// Earliest instant the next call may start.
    fn next_start(&mut self, now: Instant) -> Instant {
        let mut at = now;
        if let Some(until) = self.cooldown_until {
            at = at.max(until);
        }
        if let Some(last) = self.last_finished {
            at = at.max(last + self.settings.inter_call_delay);
        }
        while let Some(front) = self.recent_starts.front() {
            if *front + self.settings.window <= at {
                self.recent_starts.pop_front();
            } else {
                break;
            }
        }
        if self.recent_starts.len() >= self.settings.max_calls_per_window as usize {
            if let Some(front) = self.recent_starts.front() {
                at = at.max(*front + self.settings.window);
            }
        }
        at
    }

    fn started(&mut self, at: Instant) {
        self.recent_starts.push_back(at);
        if self.recent_starts.len() > self.settings.max_calls_per_window as usize {
            self.recent_starts.pop_front();
        }
    }

    fn finished(&mut self, at: Instant, result: &Result<InferenceResponse, PlanError>) {
        self.last_finished = Some(at);
        match result {
            Err(e) if e.is_throttle() => {
                warn!(error = %e, cooldown_secs = self.settings.cooldown.as_secs(), "Remote service throttled; cooling down");
                self.cooldown_until = Some(at + self.settings.cooldown);
            }
            _ => {
                if self.cooldown_until.is_some_and(|u| u <= at) {
                    self.cooldown_until = None;
                }
            }
        }
    }
}

async fn worker(
    client: Arc<dyn RemoteInference>,
    settings: QueueSettings,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    let mut pacer = Pacer::new(settings);
    while let Some(job) = rx.recv().await {
        if job.reply.is_closed() {
            debug!(model = %job.request.model, "Skipping abandoned remote call");
            continue;
        }
        let start = pacer.next_start(Instant::now());
        sleep_until(start).await;
        if job.reply.is_closed() {
            debug!(model = %job.request.model, "Skipping abandoned remote call");
            continue;
        }

        pacer.started(Instant::now());
        let result = client.invoke(&job.request).await;
        pacer.finished(Instant::now(), &result);

        if job.reply.send(result).is_err() {
            debug!("Caller gave up; remote result discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(delay_ms: u64, max: u32, window_ms: u64) -> QueueSettings {
        QueueSettings {
            inter_call_delay: Duration::from_millis(delay_ms),
            max_calls_per_window: max,
            window: Duration::from_millis(window_ms),
            cooldown: Duration::from_millis(500),
        }
    }

    fn ok() -> Result<InferenceResponse, PlanError> {
        Ok(InferenceResponse {
            generated_text: String::new(),
        })
    }

    #[tokio::test]
    async fn spacing_follows_last_finish() {
        let mut pacer = Pacer::new(settings(100, 10, 60_000));
        let t0 = Instant::now();
        assert_eq!(pacer.next_start(t0), t0);
        pacer.started(t0);
        pacer.finished(t0 + Duration::from_millis(30), &ok());
        assert_eq!(
            pacer.next_start(t0 + Duration::from_millis(40)),
            t0 + Duration::from_millis(130)
        );
    }

    #[tokio::test]
    async fn window_limit_delays_the_next_call() {
        let mut pacer = Pacer::new(settings(0, 2, 1_000));
        let t0 = Instant::now();
        pacer.started(t0);
        pacer.finished(t0, &ok());
        pacer.started(t0 + Duration::from_millis(10));
        pacer.finished(t0 + Duration::from_millis(10), &ok());
        assert_eq!(
            pacer.next_start(t0 + Duration::from_millis(20)),
            t0 + Duration::from_millis(1_000)
        );
    }

    #[tokio::test]
    async fn throttle_starts_cooldown() {
        let mut pacer = Pacer::new(settings(0, 10, 60_000));
        let t0 = Instant::now();
        pacer.started(t0);
        pacer.finished(
            t0,
            &Err(PlanError::RemoteRateLimited {
                retry_after_secs: None,
            }),
        );
        assert_eq!(pacer.next_start(t0), t0 + Duration::from_millis(500));
    }
}
