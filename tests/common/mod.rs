//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use kiaan_wake::{
    EngineConfig, EngineEvent, Recognizer, RecognizerErrorCode, RecognizerSink, RetryPolicy,
    Sensitivity,
};
use tokio::sync::mpsc;

/// What the engine has asked the mock to do
#[derive(Debug, Default)]
pub struct MockCalls {
    pub starts: u32,
    pub stops: u32,
    pub aborts: u32,
    pub languages: Vec<String>,
    pub sinks: Vec<RecognizerSink>,
    pub fail_start: Option<RecognizerErrorCode>,
    pub listening: bool,
}

/// Scripted recognizer; clones share state so a test can keep one while the
/// engine owns another
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer {
    calls: Arc<Mutex<MockCalls>>,
    unsupported: bool,
}

impl MockRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// Make every following `start` fail with `code`
    pub fn fail_start_with(&self, code: Option<RecognizerErrorCode>) {
        self.calls.lock().unwrap().fail_start = code;
    }

    pub fn starts(&self) -> u32 {
        self.calls.lock().unwrap().starts
    }

    pub fn stops(&self) -> u32 {
        self.calls.lock().unwrap().stops
    }

    pub fn aborts(&self) -> u32 {
        self.calls.lock().unwrap().aborts
    }

    pub fn languages(&self) -> Vec<String> {
        self.calls.lock().unwrap().languages.clone()
    }

    /// Sink of the session started `n` sessions ago (0 = latest)
    pub fn sink_back(&self, n: usize) -> RecognizerSink {
        let calls = self.calls.lock().unwrap();
        calls.sinks[calls.sinks.len() - 1 - n].clone()
    }

    pub fn result(&self, transcript: &str, is_final: bool) {
        self.sink_back(0).result(transcript, is_final);
    }

    pub fn error(&self, code: RecognizerErrorCode) {
        self.sink_back(0).error(code);
    }

    pub fn end(&self) {
        self.calls.lock().unwrap().listening = false;
        self.sink_back(0).end();
    }
}

impl Recognizer for MockRecognizer {
    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    fn start(&mut self, sink: RecognizerSink) -> Result<(), RecognizerErrorCode> {
        let mut calls = self.calls.lock().unwrap();
        calls.starts += 1;
        if let Some(code) = calls.fail_start.clone() {
            return Err(code);
        }
        calls.sinks.push(sink);
        calls.listening = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut calls = self.calls.lock().unwrap();
        calls.stops += 1;
        calls.listening = false;
    }

    fn abort(&mut self) {
        let mut calls = self.calls.lock().unwrap();
        calls.aborts += 1;
        calls.listening = false;
    }

    fn set_language(&mut self, code: &str) {
        self.calls.lock().unwrap().languages.push(code.to_string());
    }

    fn is_listening(&self) -> bool {
        self.calls.lock().unwrap().listening
    }
}

/// Engine config with a short, easy to reason about retry schedule
#[must_use]
pub fn test_config(sensitivity: Sensitivity) -> EngineConfig {
    EngineConfig {
        sensitivity,
        retry: RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        },
        ..EngineConfig::default()
    }
}

/// Let the engine process everything queued (paused clock advances 1ms)
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Take every event delivered so far
pub fn drain(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Error messages among `events`
#[must_use]
pub fn errors(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
        .collect()
}
