use super::{OriginError, OriginFetcher, WeatherRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn paris() -> WeatherRecord {
    WeatherRecord {
        latitude: 48.85,
        longitude: 2.35,
        resolved_address: "Paris, France".to_string(),
        address: None,
        timezone: None,
        description: None,
    }
}

/// What the mock origin should do on a given call.
pub enum Reply {
    Record(WeatherRecord),
    Status(u16),
    Decode,
}

impl Reply {
    fn into_result(self) -> Result<WeatherRecord, OriginError> {
        match self {
            Reply::Record(record) => Ok(record),
            Reply::Status(code) => Err(OriginError::UpstreamStatus { code }),
            Reply::Decode => Err(OriginError::Decode(
                serde_json::from_str::<WeatherRecord>("{}").unwrap_err(),
            )),
        }
    }
}

/// Scripted origin: replies are consumed in order, the last one repeats.
pub struct MockOrigin {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockOrigin {
    pub fn returning(record: WeatherRecord) -> Self {
        Self::scripted(vec![Reply::Record(record)])
    }

    pub fn failing(code: u16) -> Self {
        Self::scripted(vec![Reply::Status(code)])
    }

    pub fn scripted(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            return replies.pop_front().unwrap();
        }
        match replies.front() {
            Some(Reply::Record(record)) => Reply::Record(record.clone()),
            Some(Reply::Status(code)) => Reply::Status(*code),
            Some(Reply::Decode) => Reply::Decode,
            None => Reply::Status(500),
        }
    }
}

#[async_trait]
impl OriginFetcher for MockOrigin {
    async fn fetch(&self, location: &str) -> Result<WeatherRecord, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(location.to_string());
        if location.trim().is_empty() {
            return Err(OriginError::InvalidKey);
        }
        self.next_reply().into_result()
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// An origin that accepts the call and never answers. Counts the in-flight
/// fetches that were cancelled by dropping their future.
#[derive(Default)]
pub struct HangingOrigin {
    calls: AtomicUsize,
    cancelled: Arc<AtomicUsize>,
}

impl HangingOrigin {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginFetcher for HangingOrigin {
    async fn fetch(&self, _location: &str) -> Result<WeatherRecord, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = DropCounter(self.cancelled.clone());
        std::future::pending().await
    }
}
