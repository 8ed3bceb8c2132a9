#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notifly::{
    NotificationEvent, NotificationEventListener, NotificationProvider, NotificationRequest,
    NotificationResult, NotificationStatus, ProviderError, RetryConfig,
};

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Sent,
    Failed,
    Error,
}

/// Provider replaying a script of outcomes; the last step repeats forever.
pub struct MockProvider {
    name: &'static str,
    script: Mutex<VecDeque<Step>>,
    latency: Duration,
    calls: AtomicU32,
}

impl MockProvider {
    pub fn new(name: &'static str, script: Vec<Step>) -> Arc<Self> {
        Self::with_latency(name, script, Duration::ZERO)
    }

    pub fn always(name: &'static str, step: Step) -> Arc<Self> {
        Self::new(name, vec![step])
    }

    pub fn with_latency(name: &'static str, script: Vec<Step>, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
            latency,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            *script.front().unwrap_or(&Step::Sent)
        }
    }
}

#[async_trait]
impl NotificationProvider for MockProvider {
    async fn send(&self, request: &NotificationRequest) -> Result<NotificationResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        match self.next_step() {
            Step::Sent => Ok(NotificationResult::sent(
                self.name,
                format!("Delivered to {}", request.recipient),
            )),
            Step::Failed => Ok(NotificationResult::failed(
                self.name,
                "Delivery rejected",
                "mailbox unavailable",
            )),
            Step::Error => Err(ProviderError::new(self.name, "connection reset")),
        }
    }

    fn name(&self) -> &str {
        self.name
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Records every event it sees.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<NotificationEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<NotificationStatus> {
        self.events().iter().map(|e| e.status).collect()
    }

    pub fn for_correlation(&self, id: &str) -> Vec<NotificationEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.correlation_id == id)
            .collect()
    }
}

impl NotificationEventListener for Recorder {
    fn on_event(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingListener;

impl NotificationEventListener for FailingListener {
    fn on_event(&self, _event: &NotificationEvent) -> anyhow::Result<()> {
        anyhow::bail!("listener rejected event")
    }
}

pub struct PanickingListener;

impl NotificationEventListener for PanickingListener {
    fn on_event(&self, _event: &NotificationEvent) -> anyhow::Result<()> {
        panic!("listener panicked");
    }
}

/// Retry without waiting between attempts.
pub fn instant_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_attempts(max_attempts)
        .with_delays(Duration::ZERO, Duration::ZERO)
}

/// Check the lifecycle shape of one dispatch: `Pending`, any number of
/// `Retrying`, then exactly one terminal event.
pub fn assert_lifecycle(events: &[NotificationEvent], terminal: NotificationStatus) {
    assert!(events.len() >= 2, "too few events: {events:?}");
    assert_eq!(events[0].status, NotificationStatus::Pending);
    let last = events.last().unwrap();
    assert_eq!(last.status, terminal);
    for middle in &events[1..events.len() - 1] {
        assert_eq!(middle.status, NotificationStatus::Retrying);
    }
    let id = &events[0].correlation_id;
    assert!(events.iter().all(|e| &e.correlation_id == id));
}
