//! Network call correlation.
//!
//! Every outbound call made through an intercepted surface (the imperative
//! [`XhrBackend`] or the promise-based [`FetchBackend`]) becomes one
//! [`NetworkEntry`]. The correlator keeps the entry keyed by its correlation id
//! while the call moves through its lifecycle:
//!
//! ```text
//!   begin ──> Created ──mark_sent──> InFlight ──resolve──> emitted
//!               │  ▲                                 (Success | Error | Timeout)
//!               └──┘ add_request_header
//! ```
//!
//! `resolve` removes the call, so a second terminal event for the same id is
//! rejected with [`CorrelationError::UnknownCall`] and the entry is emitted
//! exactly once.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use super::clock::Clock;
use super::recorder::{EventSink, Recorder, SinkSlot};
use super::types::NetworkEntry;
use crate::configuration::types::{DEFAULT_MAX_REQUEST_BODY, DEFAULT_MAX_RESPONSE_BODY};
use crate::error_handling::types::{CaptureError, CorrelationError};

const TRUNCATION_PREFIX: &str = "...[truncated, ";
const TRUNCATION_SUFFIX: &str = " bytes omitted]";

/// Cuts `body` to `max` characters and appends a marker naming how many were dropped.
///
/// A body already truncated to the same limit is returned unchanged.
pub fn truncate_body(body: &str, max: usize) -> String {
    let length = body.chars().count();
    if length <= max || is_truncated_to(body, max) {
        return body.to_string();
    }
    let kept: String = body.chars().take(max).collect();
    format!("{}{}{}{}", kept, TRUNCATION_PREFIX, length - max, TRUNCATION_SUFFIX)
}

fn is_truncated_to(body: &str, max: usize) -> bool {
    let Some(rest) = body.strip_suffix(TRUNCATION_SUFFIX) else {
        return false;
    };
    let Some((kept, omitted)) = rest.rsplit_once(TRUNCATION_PREFIX) else {
        return false;
    };
    !omitted.is_empty()
        && omitted.bytes().all(|b| b.is_ascii_digit())
        && kept.chars().count() == max
}

/// Parses a raw `name: value\r\n` header block. Later duplicates win.
pub fn parse_header_block(raw: &str) -> BTreeMap<String, String> {
    raw.split("\r\n")
        .filter_map(|line| line.split_once(": "))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Created,
    InFlight { started_at: i64 },
}

#[derive(Debug)]
struct PendingCall {
    entry: NetworkEntry,
    state: CallState,
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        status: u16,
        status_text: String,
        headers: BTreeMap<String, String>,
        /// `None` when the body could not be read.
        body: Option<String>,
    },
    TransportError,
    Timeout,
    /// The promise-based surface rejected with this message.
    Failed(String),
}

struct Shared {
    calls: Mutex<HashMap<String, PendingCall>>,
    counter: AtomicU64,
    slot: Arc<SinkSlot<NetworkEntry>>,
    clock: Arc<dyn Clock>,
    max_request_body: usize,
    max_response_body: usize,
}

/// Owns the in-flight calls. Clones share the same state.
#[derive(Clone)]
pub struct NetworkCorrelator {
    shared: Arc<Shared>,
}

impl NetworkCorrelator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_REQUEST_BODY, DEFAULT_MAX_RESPONSE_BODY)
    }

    pub fn with_limits(
        clock: Arc<dyn Clock>,
        max_request_body: usize,
        max_response_body: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                calls: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(0),
                slot: SinkSlot::new(),
                clock,
                max_request_body,
                max_response_body,
            }),
        }
    }

    fn calls(&self) -> MutexGuard<'_, HashMap<String, PendingCall>> {
        self.shared
            .calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens a new call and returns its correlation id, or `None` when not recording.
    pub fn begin(&self, method: &str, url: &str) -> Option<String> {
        if !self.shared.slot.is_active() {
            return None;
        }
        let now = self.shared.clock.now_ms();
        let n = self.shared.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("req_{}_{}", n, now);

        let entry = NetworkEntry {
            timestamp: now,
            id: id.clone(),
            method: method.to_uppercase(),
            url: url.to_string(),
            request_headers: Some(BTreeMap::new()),
            ..Default::default()
        };
        self.calls().insert(
            id.clone(),
            PendingCall {
                entry,
                state: CallState::Created,
            },
        );
        Some(id)
    }

    /// Headers may only be added before the call is sent.
    pub fn add_request_header(
        &self,
        id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), CorrelationError> {
        let mut calls = self.calls();
        let call = calls
            .get_mut(id)
            .ok_or_else(|| CorrelationError::UnknownCall(id.to_string()))?;
        if call.state != CallState::Created {
            return Err(CorrelationError::AlreadySent(id.to_string()));
        }
        call.entry
            .request_headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Moves a call in flight, storing its (truncated) body.
    pub fn mark_sent(&self, id: &str, body: Option<&str>) -> Result<(), CorrelationError> {
        let now = self.shared.clock.now_ms();
        let mut calls = self.calls();
        let call = calls
            .get_mut(id)
            .ok_or_else(|| CorrelationError::UnknownCall(id.to_string()))?;
        if call.state != CallState::Created {
            return Err(CorrelationError::AlreadySent(id.to_string()));
        }
        call.entry.request_body = body.map(|b| truncate_body(b, self.shared.max_request_body));
        call.state = CallState::InFlight { started_at: now };
        Ok(())
    }

    /// Applies the terminal outcome and emits the finished entry.
    pub fn resolve(&self, id: &str, outcome: Outcome) -> Result<(), CorrelationError> {
        let now = self.shared.clock.now_ms();
        let mut entry = {
            let mut calls = self.calls();
            let started_at = match calls.get(id).map(|c| c.state) {
                None => return Err(CorrelationError::UnknownCall(id.to_string())),
                Some(CallState::Created) => {
                    return Err(CorrelationError::NotInFlight(id.to_string()))
                }
                Some(CallState::InFlight { started_at }) => started_at,
            };
            let Some(call) = calls.remove(id) else {
                return Err(CorrelationError::UnknownCall(id.to_string()));
            };
            let mut entry = call.entry;
            entry.duration = Some(now - started_at);
            entry
        };

        match outcome {
            Outcome::Success {
                status,
                status_text,
                headers,
                body,
            } => {
                entry.status = Some(status);
                entry.status_text = Some(status_text);
                entry.response_headers = Some(headers);
                entry.response_body =
                    body.map(|b| truncate_body(&b, self.shared.max_response_body));
            }
            Outcome::TransportError => entry.error = Some("Network error".to_string()),
            Outcome::Timeout => entry.error = Some("Request timeout".to_string()),
            Outcome::Failed(message) => entry.error = Some(message),
        }

        if !self.shared.slot.emit(entry) {
            debug!("call {} resolved while not recording", id);
        }
        Ok(())
    }

    /// Forgets a call without emitting it.
    pub fn discard(&self, id: &str) -> bool {
        self.calls().remove(id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.calls().len()
    }

    /// Wraps an imperative request object.
    pub fn wrap_xhr<B: XhrBackend>(&self, inner: B) -> InterceptedXhr<B> {
        InterceptedXhr {
            inner,
            correlator: self.clone(),
            call: PendingCallGuard::new(self.clone()),
        }
    }

    /// Wraps a promise-based call surface.
    pub fn wrap_fetch<F: FetchBackend>(&self, inner: F) -> InterceptedFetch<F> {
        InterceptedFetch {
            inner,
            correlator: self.clone(),
        }
    }
}

impl Recorder for NetworkCorrelator {
    type Record = NetworkEntry;

    fn start(&mut self, sink: EventSink<NetworkEntry>) -> Result<(), CaptureError> {
        if !self.shared.slot.install(sink) {
            debug!("network recorder already active");
        }
        Ok(())
    }

    /// In-flight calls are dropped; terminal events for them are ignored later.
    fn stop(&mut self) {
        if !self.shared.slot.clear() {
            return;
        }
        let dropped = {
            let mut calls = self.calls();
            let n = calls.len();
            calls.clear();
            n
        };
        if dropped > 0 {
            debug!("network recorder stopped, discarded {} in-flight call(s)", dropped);
        }
    }

    fn is_active(&self) -> bool {
        self.shared.slot.is_active()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    fn as_text(&self) -> Option<&str> {
        match self {
            RequestBody::Text(text) => Some(text),
            RequestBody::Bytes(_) => None,
        }
    }
}

/// The host's real imperative request object.
pub trait XhrBackend: Send {
    fn open(&mut self, method: &str, url: &str);
    fn set_request_header(&mut self, name: &str, value: &str);
    fn send(&mut self, body: Option<RequestBody>);

    fn status(&self) -> u16;
    fn status_text(&self) -> String;
    /// Raw `name: value\r\n` header block.
    fn all_response_headers(&self) -> String;
    /// Fails when the response is not text.
    fn response_text(&self) -> Result<String, String>;
}

/// Holds the id of a call that has not been resolved yet. Dropping the guard
/// while it still holds an id discards that call from the correlator.
struct PendingCallGuard {
    correlator: NetworkCorrelator,
    id: Option<String>,
}

impl PendingCallGuard {
    fn new(correlator: NetworkCorrelator) -> Self {
        Self {
            correlator,
            id: None,
        }
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Abandons the held call, if any, and holds `id` instead.
    fn replace(&mut self, id: Option<String>) {
        self.abandon();
        self.id = id;
    }

    /// Releases the id to the caller, who is then responsible for resolving it.
    fn take(&mut self) -> Option<String> {
        self.id.take()
    }

    fn abandon(&mut self) {
        if let Some(id) = self.id.take() {
            if self.correlator.discard(&id) {
                debug!("call {} abandoned before completion", id);
            }
        }
    }
}

impl Drop for PendingCallGuard {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Lifecycle notifications the host shim forwards from the request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XhrEvent {
    Load,
    Error,
    Timeout,
}

/// Wrapped request object. Dropping it with a call still pending forgets that call.
pub struct InterceptedXhr<B: XhrBackend> {
    inner: B,
    correlator: NetworkCorrelator,
    call: PendingCallGuard,
}

impl<B: XhrBackend> InterceptedXhr<B> {
    pub fn open(&mut self, method: &str, url: &str) {
        self.call.replace(self.correlator.begin(method, url));
        self.inner.open(method, url);
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        if let Some(id) = self.call.id() {
            if let Err(e) = self.correlator.add_request_header(id, name, value) {
                warn!("could not record request header: {}", e);
            }
        }
        self.inner.set_request_header(name, value);
    }

    pub fn send(&mut self, body: Option<RequestBody>) {
        if let Some(id) = self.call.id() {
            let text = body.as_ref().and_then(RequestBody::as_text);
            if let Err(e) = self.correlator.mark_sent(id, text) {
                warn!("could not record request send: {}", e);
            }
        }
        self.inner.send(body);
    }

    /// Called by the host shim for load, error and timeout. Only the first
    /// terminal event for the current call is recorded. A terminal event for a
    /// call that was never sent drops the call.
    pub fn handle_event(&mut self, event: XhrEvent) {
        let Some(id) = self.call.take() else {
            return;
        };
        let outcome = match event {
            XhrEvent::Load => Outcome::Success {
                status: self.inner.status(),
                status_text: self.inner.status_text(),
                headers: parse_header_block(&self.inner.all_response_headers()),
                body: match self.inner.response_text() {
                    Ok(text) => Some(text),
                    Err(e) => {
                        debug!("response body of {} unreadable: {}", id, e);
                        None
                    }
                },
            },
            XhrEvent::Error => Outcome::TransportError,
            XhrEvent::Timeout => Outcome::Timeout,
        };
        if let Err(e) = self.correlator.resolve(&id, outcome) {
            warn!("could not record response: {}", e);
            self.correlator.discard(&id);
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Gives the original request object back. A pending call is discarded.
    pub fn into_inner(self) -> B {
        self.inner
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchRequest {
    /// Defaults to `GET`.
    pub method: Option<String>,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl FetchRequest {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FetchError {}

/// The host's real promise-based call surface.
pub trait FetchBackend: Send + Sync {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

pub struct InterceptedFetch<F: FetchBackend> {
    inner: F,
    correlator: NetworkCorrelator,
}

impl<F: FetchBackend> InterceptedFetch<F> {
    /// Performs the call through the original surface and records it. The
    /// original result, success or failure, is returned untouched.
    ///
    /// Dropping the returned future before it completes discards the call.
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let method = request.method.as_deref().unwrap_or("GET");
        let mut call = PendingCallGuard::new(self.correlator.clone());
        call.replace(self.correlator.begin(method, &request.url));

        if let Some(id) = call.id() {
            for (name, value) in &request.headers {
                if let Err(e) = self.correlator.add_request_header(id, name, value) {
                    warn!("could not record request header: {}", e);
                }
            }
            let text = request.body.as_ref().and_then(RequestBody::as_text);
            if let Err(e) = self.correlator.mark_sent(id, text) {
                warn!("could not record request send: {}", e);
            }
        }

        let result = self.inner.fetch(request).await;

        if let Some(id) = call.take() {
            let outcome = match &result {
                Ok(response) => Outcome::Success {
                    status: response.status,
                    status_text: response.status_text.clone(),
                    headers: response.headers.iter().cloned().collect(),
                    body: String::from_utf8(response.body.clone()).ok(),
                },
                Err(e) => Outcome::Failed(e.message.clone()),
            };
            if let Err(e) = self.correlator.resolve(&id, outcome) {
                warn!("could not record response: {}", e);
                self.correlator.discard(&id);
            }
        }
        result
    }

    /// Gives the original call surface back.
    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::clock::ManualClock;
    use std::collections::HashSet;
    use std::time::Duration;

    fn started(clock: &ManualClock) -> (NetworkCorrelator, Arc<Mutex<Vec<NetworkEntry>>>) {
        let mut correlator = NetworkCorrelator::with_limits(Arc::new(clock.clone()), 10, 20);
        let out = Arc::new(Mutex::new(Vec::new()));
        let out2 = Arc::clone(&out);
        correlator
            .start(Arc::new(move |e| out2.lock().unwrap().push(e)))
            .unwrap();
        (correlator, out)
    }

    #[derive(Default)]
    struct FakeXhr {
        opened: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        sent: Option<Option<RequestBody>>,
        binary: bool,
    }

    impl XhrBackend for FakeXhr {
        fn open(&mut self, method: &str, url: &str) {
            self.opened.push((method.to_string(), url.to_string()));
        }
        fn set_request_header(&mut self, name: &str, value: &str) {
            self.headers.push((name.to_string(), value.to_string()));
        }
        fn send(&mut self, body: Option<RequestBody>) {
            self.sent = Some(body);
        }
        fn status(&self) -> u16 {
            201
        }
        fn status_text(&self) -> String {
            "Created".to_string()
        }
        fn all_response_headers(&self) -> String {
            "content-type: text/plain\r\nx-a: 1\r\nx-a: 2\r\n".to_string()
        }
        fn response_text(&self) -> Result<String, String> {
            if self.binary {
                Err("responseType is arraybuffer".to_string())
            } else {
                Ok("created".to_string())
            }
        }
    }

    struct FakeFetch {
        fail: bool,
    }

    impl FetchBackend for FakeFetch {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
            if self.fail {
                return Err(FetchError {
                    message: format!("Failed to fetch {}", request.url),
                });
            }
            Ok(FetchResponse {
                status: 200,
                status_text: "OK".to_string(),
                headers: vec![("content-type".into(), "application/json".into())],
                body: br#"{"ok":true}"#.to_vec(),
            })
        }
    }

    struct HangingFetch;

    impl FetchBackend for HangingFetch {
        async fn fetch(&self, _: FetchRequest) -> Result<FetchResponse, FetchError> {
            std::future::pending().await
        }
    }

    #[test]
    fn truncation_marks_and_is_idempotent() {
        let body = "a".repeat(25);
        let once = truncate_body(&body, 10);
        assert_eq!(once, format!("{}...[truncated, 15 bytes omitted]", "a".repeat(10)));
        assert_eq!(truncate_body(&once, 10), once);
        assert_eq!(truncate_body("short", 10), "short");
        assert_eq!(truncate_body(&"b".repeat(10), 10), "b".repeat(10));
    }

    #[test]
    fn truncation_counts_characters() {
        let body = "é".repeat(12);
        assert_eq!(
            truncate_body(&body, 10),
            format!("{}...[truncated, 2 bytes omitted]", "é".repeat(10))
        );
    }

    #[test]
    fn header_block_later_duplicates_win() {
        let headers = parse_header_block("a: 1\r\nb: 2\r\na: 3\r\n\r\nbroken line");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers["a"], "3");
    }

    #[test]
    fn xhr_call_produces_one_entry() {
        let clock = ManualClock::new(1_000);
        let (correlator, out) = started(&clock);
        let mut xhr = correlator.wrap_xhr(FakeXhr::default());

        xhr.open("post", "https://example.com/items");
        xhr.set_request_header("Content-Type", "text/plain");
        xhr.send(Some(RequestBody::Text("x".repeat(30))));
        clock.advance(250);
        xhr.handle_event(XhrEvent::Load);
        xhr.handle_event(XhrEvent::Error);

        let entries = out.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.method, "POST");
        assert_eq!(entry.timestamp, 1_000);
        assert!(entry.id.starts_with("req_1_1000"));
        assert_eq!(entry.status, Some(201));
        assert_eq!(entry.error, None);
        assert_eq!(entry.duration, Some(250));
        assert_eq!(entry.response_headers.as_ref().unwrap()["x-a"], "2");
        assert_eq!(entry.response_body.as_deref(), Some("created"));
        assert!(entry
            .request_body
            .as_deref()
            .unwrap()
            .ends_with("[truncated, 20 bytes omitted]"));
        assert_eq!(
            entry.request_headers.as_ref().unwrap()["Content-Type"],
            "text/plain"
        );

        let inner = xhr.into_inner();
        assert_eq!(inner.opened.len(), 1);
        assert_eq!(inner.headers.len(), 1);
        assert!(inner.sent.is_some());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn xhr_timeout_and_unreadable_body() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);

        let mut timed_out = correlator.wrap_xhr(FakeXhr::default());
        timed_out.open("GET", "/slow");
        timed_out.send(None);
        timed_out.handle_event(XhrEvent::Timeout);
        timed_out.handle_event(XhrEvent::Load);

        let mut binary = correlator.wrap_xhr(FakeXhr {
            binary: true,
            ..Default::default()
        });
        binary.open("GET", "/blob");
        binary.send(Some(RequestBody::Bytes(vec![1, 2, 3])));
        binary.handle_event(XhrEvent::Load);

        let entries = out.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].error.as_deref(), Some("Request timeout"));
        assert_eq!(entries[0].status, None);
        assert_eq!(entries[1].status, Some(201));
        assert_eq!(entries[1].response_body, None);
        assert_eq!(entries[1].request_body, None);
    }

    #[test]
    fn terminal_transition_happens_once() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);
        let id = correlator.begin("GET", "/x").unwrap();

        assert_eq!(
            correlator.resolve(&id, Outcome::Timeout),
            Err(CorrelationError::NotInFlight(id.clone()))
        );
        correlator.mark_sent(&id, None).unwrap();
        assert_eq!(
            correlator.mark_sent(&id, None),
            Err(CorrelationError::AlreadySent(id.clone()))
        );
        assert_eq!(
            correlator.add_request_header(&id, "a", "b"),
            Err(CorrelationError::AlreadySent(id.clone()))
        );
        correlator.resolve(&id, Outcome::TransportError).unwrap();
        assert_eq!(
            correlator.resolve(&id, Outcome::Timeout),
            Err(CorrelationError::UnknownCall(id.clone()))
        );

        let entries = out.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].error.as_deref(), Some("Network error"));
        assert!(entries[0].status.is_none());
    }

    #[test]
    fn ids_stay_unique_across_threads_and_restarts() {
        let clock = ManualClock::new(5);
        let (mut correlator, _out) = started(&clock);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = correlator.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter_map(|_| c.begin("GET", "/"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        correlator.stop();
        correlator.start(Arc::new(|_| {})).unwrap();
        ids.push(correlator.begin("GET", "/").unwrap());

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), 401);
        assert_eq!(unique.len(), 401);
    }

    #[test]
    fn stop_discards_in_flight_calls() {
        let clock = ManualClock::new(0);
        let (mut correlator, out) = started(&clock);
        let mut xhr = correlator.wrap_xhr(FakeXhr::default());
        xhr.open("GET", "/pending");
        xhr.send(None);

        correlator.stop();
        assert_eq!(correlator.pending_count(), 0);
        xhr.handle_event(XhrEvent::Load);

        assert!(out.lock().unwrap().is_empty());
        assert!(correlator.begin("GET", "/ignored").is_none());
        // the call still went through
        assert!(xhr.inner().sent.is_some());
    }

    #[tokio::test]
    async fn fetch_records_success_and_returns_original_response() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);
        let fetch = correlator.wrap_fetch(FakeFetch { fail: false });

        let response = fetch
            .fetch(FetchRequest {
                method: Some("post".into()),
                url: "https://api.example.com/login".into(),
                headers: vec![("Authorization".into(), "Bearer t".into())],
                body: Some(RequestBody::Text("{}".into())),
            })
            .await
            .unwrap();
        assert_eq!(response.status, 200);

        let entries = out.lock().unwrap();
        assert_eq!(entries[0].method, "POST");
        assert_eq!(entries[0].request_body.as_deref(), Some("{}"));
        assert_eq!(entries[0].response_body.as_deref(), Some(r#"{"ok":true}"#));
        assert_eq!(
            entries[0].request_headers.as_ref().unwrap()["Authorization"],
            "Bearer t"
        );
    }

    #[test]
    fn fetch_failure_is_recorded_then_returned() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);
        let fetch = correlator.wrap_fetch(FakeFetch { fail: true });

        let err = tokio_test::block_on(fetch.fetch(FetchRequest::get("/down"))).unwrap_err();
        assert_eq!(err.message, "Failed to fetch /down");

        let entries = out.lock().unwrap();
        assert_eq!(entries[0].method, "GET");
        assert_eq!(entries[0].error.as_deref(), Some("Failed to fetch /down"));
        assert_eq!(entries[0].duration, Some(0));
    }

    #[test]
    fn fetch_while_inactive_is_a_pass_through() {
        let correlator = NetworkCorrelator::new(Arc::new(ManualClock::new(0)));
        let fetch = correlator.wrap_fetch(FakeFetch { fail: false });
        let response = tokio_test::block_on(fetch.fetch(FetchRequest::get("/"))).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn abandoned_xhr_calls_are_released() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);

        for _ in 0..100 {
            let mut xhr = correlator.wrap_xhr(FakeXhr::default());
            xhr.open("GET", "/never-answered");
            xhr.send(None);
        }
        assert_eq!(correlator.pending_count(), 0);

        let mut reopened = correlator.wrap_xhr(FakeXhr::default());
        reopened.open("GET", "/first");
        reopened.open("GET", "/second");
        assert_eq!(correlator.pending_count(), 1);
        let _ = reopened.into_inner();
        assert_eq!(correlator.pending_count(), 0);

        assert!(out.lock().unwrap().is_empty());
    }

    #[test]
    fn terminal_event_before_send_drops_the_call() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);
        let mut xhr = correlator.wrap_xhr(FakeXhr::default());

        xhr.open("GET", "/unsent");
        xhr.handle_event(XhrEvent::Error);

        assert_eq!(correlator.pending_count(), 0);
        assert!(out.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_fetch_is_released() {
        let clock = ManualClock::new(0);
        let (correlator, out) = started(&clock);
        let fetch = correlator.wrap_fetch(HangingFetch);

        for _ in 0..20 {
            let result =
                tokio::time::timeout(Duration::from_millis(5), fetch.fetch(FetchRequest::get("/hang")))
                    .await;
            assert!(result.is_err());
        }

        assert_eq!(correlator.pending_count(), 0);
        assert!(out.lock().unwrap().is_empty());
    }
}
