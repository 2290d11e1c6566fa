use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;

use crate::Error;
use crate::Handler;
use crate::Resource;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerCall<K> {
    Created(K),
    Updated { old: K, new: K },
    Deleted { key: String, last_known: Option<K> },
}

/// Handler fake that records every call in order.
///
/// Failures are scripted per identity with `fail_times` or `panic_times`. Overlapping calls for
/// the same identity are counted in `overlaps()`.
pub struct RecordingHandler<K> {
    calls: Mutex<Vec<HandlerCall<K>>>,
    attempts: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, usize>>,
    panics: Mutex<HashMap<String, usize>>,
    in_flight: Mutex<HashSet<String>>,
    overlaps: Mutex<usize>,
    init_calls: Mutex<usize>,
    fail_init: bool,
    delay: Option<Duration>,
}

impl<K: Resource> Default for RecordingHandler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Resource> RecordingHandler<K> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            panics: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            overlaps: Mutex::new(0),
            init_calls: Mutex::new(0),
            fail_init: false,
            delay: None,
        }
    }

    /// Every call sleeps for `delay` before returning.
    pub fn with_delay(
        mut self,
        delay: Duration,
    ) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// The next `times` calls for `key` fail.
    pub fn fail_times(
        &self,
        key: &str,
        times: usize,
    ) {
        self.failures.lock().insert(key.to_string(), times);
    }

    /// The next `times` calls for `key` panic.
    pub fn panic_times(
        &self,
        key: &str,
        times: usize,
    ) {
        self.panics.lock().insert(key.to_string(), times);
    }

    pub fn calls(&self) -> Vec<HandlerCall<K>> {
        self.calls.lock().clone()
    }

    /// Successful calls only.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Successful and failed calls for `key`.
    pub fn attempts(
        &self,
        key: &str,
    ) -> usize {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }

    pub fn overlaps(&self) -> usize {
        *self.overlaps.lock()
    }

    pub fn init_calls(&self) -> usize {
        *self.init_calls.lock()
    }

    async fn record(
        &self,
        key: String,
        call: HandlerCall<K>,
    ) -> Result<()> {
        if !self.in_flight.lock().insert(key.clone()) {
            *self.overlaps.lock() += 1;
        }
        *self.attempts.lock().entry(key.clone()).or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.lock().remove(&key);

        if take_scripted(&self.panics, &key) {
            panic!("scripted panic for {}", key);
        }
        if take_scripted(&self.failures, &key) {
            return Err(Error::reconcile_failed(key, "scripted failure"));
        }

        self.calls.lock().push(call);
        Ok(())
    }
}

fn take_scripted(
    script: &Mutex<HashMap<String, usize>>,
    key: &str,
) -> bool {
    match script.lock().get_mut(key) {
        Some(left) if *left > 0 => {
            *left -= 1;
            true
        }
        _ => false,
    }
}

fn key_of<K: Resource>(obj: &K) -> String {
    crate::cache::key::object_key(obj).unwrap_or_default()
}

#[async_trait::async_trait]
impl<K: Resource> Handler<K> for RecordingHandler<K> {
    async fn init(&self) -> Result<()> {
        *self.init_calls.lock() += 1;
        if self.fail_init {
            return Err(crate::HandlerError::Init("scripted init failure".to_string()).into());
        }
        Ok(())
    }

    async fn object_created(
        &self,
        obj: &K,
    ) -> Result<()> {
        self.record(key_of(obj), HandlerCall::Created(obj.clone())).await
    }

    async fn object_updated(
        &self,
        old: &K,
        new: &K,
    ) -> Result<()> {
        self.record(
            key_of(new),
            HandlerCall::Updated {
                old: old.clone(),
                new: new.clone(),
            },
        )
        .await
    }

    async fn object_deleted(
        &self,
        key: &str,
        last_known: Option<K>,
    ) -> Result<()> {
        self.record(
            key.to_string(),
            HandlerCall::Deleted {
                key: key.to_string(),
                last_known,
            },
        )
        .await
    }
}
