use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};
use uuid::Uuid;

use super::types::{CaptureState, StreamCounts};
use crate::configuration::types::CaptureConfig;
use crate::data_capture::clock::{Clock, SystemClock};
use crate::data_capture::console_recorder::{ConsoleRecorder, HostConsole, InterceptedConsole};
use crate::data_capture::host::HostEnvironment;
use crate::data_capture::keyboard_recorder::{KeyListener, KeyboardRecorder};
use crate::data_capture::network_correlator::{
    FetchBackend, InterceptedFetch, InterceptedXhr, NetworkCorrelator, XhrBackend,
};
use crate::data_capture::recorder::Recorder;
use crate::data_capture::time_window_buffer::TimeWindowBuffer;
use crate::data_capture::trace_recorder::{TraceRecorder, TraceSource};
use crate::data_capture::types::{
    ConsoleEntry, KeyboardEntry, NetworkEntry, Timestamped, TraceEvent,
};
use crate::error_handling::types::{CaptureError, ConfigError};
use crate::report_generation::types::{Report, ReportMetadata};
use crate::sanitizer::Sanitizer;

type Shared<T> = Arc<Mutex<TimeWindowBuffer<T>>>;

fn lock<T>(buffer: &Mutex<T>) -> MutexGuard<'_, T> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn shared_buffer<T: Timestamped + Clone>(window_ms: u64, clock: &Arc<dyn Clock>) -> Shared<T> {
    Arc::new(Mutex::new(TimeWindowBuffer::with_clock(window_ms, Arc::clone(clock))))
}

/// One capture context.
///
/// The orchestrator owns a [`TimeWindowBuffer`] per stream and the recorder
/// feeding it. Console and network records are sanitized before they are
/// buffered; trace and keyboard records are buffered as they arrive (password
/// keys are already masked by the keyboard recorder).
///
/// Instances are independent: two orchestrators never share buffers, recorders
/// or correlation ids.
///
/// # Fields Overview
///
/// - `id`: instance id, used as the log prefix
/// - `sanitizer`: shared with the console and network sinks
/// - `environment`: page metadata source for snapshots
/// - `active` / `started_at`: lifecycle state, only changed by this struct
pub struct CaptureOrchestrator {
    id: Uuid,
    config: CaptureConfig,
    clock: Arc<dyn Clock>,
    sanitizer: Arc<Sanitizer>,
    environment: Arc<dyn HostEnvironment>,

    events: Shared<TraceEvent>,
    console: Shared<ConsoleEntry>,
    network: Shared<NetworkEntry>,
    keyboard: Shared<KeyboardEntry>,

    trace_recorder: TraceRecorder,
    console_recorder: ConsoleRecorder,
    network_correlator: NetworkCorrelator,
    keyboard_recorder: KeyboardRecorder,

    active: bool,
    started_at: Option<i64>,
}

impl CaptureOrchestrator {
    pub fn new(
        config: CaptureConfig,
        trace_source: Box<dyn TraceSource>,
        environment: Arc<dyn HostEnvironment>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, trace_source, environment, Arc::new(SystemClock))
    }

    /// # Errors
    /// [`ConfigError::NotInRange`] for a zero window, [`ConfigError::InvalidPattern`]
    /// when an extra sensitive pattern does not compile.
    pub fn with_clock(
        config: CaptureConfig,
        trace_source: Box<dyn TraceSource>,
        environment: Arc<dyn HostEnvironment>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if config.window_ms == 0 {
            return Err(ConfigError::NotInRange(
                "window_ms must be greater than 0".to_string(),
            ));
        }
        let sanitizer = Arc::new(Sanitizer::from_config(&config)?);
        let window = config.window_ms;

        let orchestrator = Self {
            id: Uuid::new_v4(),
            events: shared_buffer(window, &clock),
            console: shared_buffer(window, &clock),
            network: shared_buffer(window, &clock),
            keyboard: shared_buffer(window, &clock),
            trace_recorder: TraceRecorder::new(trace_source),
            console_recorder: ConsoleRecorder::new(Arc::clone(&clock)),
            network_correlator: NetworkCorrelator::with_limits(
                Arc::clone(&clock),
                config.max_request_body,
                config.max_response_body,
            ),
            keyboard_recorder: KeyboardRecorder::with_mask(
                Arc::clone(&clock),
                config.keyboard_mask,
            ),
            config,
            clock,
            sanitizer,
            environment,
            active: false,
            started_at: None,
        };
        debug!("[{}] capture context created (window {} ms)", orchestrator.id, window);
        Ok(orchestrator)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Starts the four recorders. A recorder that fails to start is logged and
    /// skipped; the others still record.
    pub fn start(&mut self) {
        if self.active {
            debug!("[{}] start ignored, already recording", self.id);
            return;
        }
        self.started_at = Some(self.clock.now_ms());

        let events = Arc::clone(&self.events);
        let result = self
            .trace_recorder
            .start(Arc::new(move |event| lock(&events).push(event)));
        self.report_start("trace", result);

        let console = Arc::clone(&self.console);
        let sanitizer = Arc::clone(&self.sanitizer);
        let result = self.console_recorder.start(Arc::new(move |entry| {
            let entry = sanitizer.sanitize_console_entry(entry);
            lock(&console).push(entry);
        }));
        self.report_start("console", result);

        let network = Arc::clone(&self.network);
        let sanitizer = Arc::clone(&self.sanitizer);
        let result = self.network_correlator.start(Arc::new(move |entry| {
            let entry = sanitizer.sanitize_network_entry(entry);
            lock(&network).push(entry);
        }));
        self.report_start("network", result);

        let keyboard = Arc::clone(&self.keyboard);
        let result = self
            .keyboard_recorder
            .start(Arc::new(move |entry| lock(&keyboard).push(entry)));
        self.report_start("keyboard", result);

        self.active = true;
        info!("[{}] recording started", self.id);
    }

    fn report_start(&self, stream: &str, result: Result<(), CaptureError>) {
        if let Err(e) = result {
            warn!("[{}] {} recorder did not start: {}", self.id, stream, e);
        }
    }

    /// Stops every recorder. Buffered records are kept.
    pub fn stop(&mut self) {
        self.trace_recorder.stop();
        self.console_recorder.stop();
        self.network_correlator.stop();
        self.keyboard_recorder.stop();
        if self.active {
            self.active = false;
            info!("[{}] recording stopped", self.id);
        }
    }

    /// Current lifecycle state and per-stream counts. Evicts expired records.
    pub fn state(&self) -> CaptureState {
        let counts = StreamCounts {
            events: Self::evicted_len(&self.events),
            console: Self::evicted_len(&self.console),
            network: Self::evicted_len(&self.network),
            keyboard: Self::evicted_len(&self.keyboard),
        };
        CaptureState {
            active: self.active,
            started_at: self.started_at,
            window_elapsed: lock(&self.events).get_duration(),
            counts,
        }
    }

    fn evicted_len<T: Timestamped + Clone>(buffer: &Mutex<TimeWindowBuffer<T>>) -> usize {
        let mut buffer = lock(buffer);
        buffer.evict();
        buffer.len()
    }

    /// Copies every buffer into a new [`Report`]. Buffers are left as they are.
    pub fn snapshot(&self) -> Report {
        let events = lock(&self.events).get_all();
        let console = lock(&self.console).get_all();
        let network = lock(&self.network).get_all();
        let keyboard = lock(&self.keyboard).get_all();

        let duration = match (events.first(), events.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        };
        let metadata = ReportMetadata::from_page(
            self.environment.page_info(),
            self.clock.now_ms(),
            duration,
        );
        debug!(
            "[{}] snapshot: {} events, {} console, {} network, {} keyboard",
            self.id,
            events.len(),
            console.len(),
            network.len(),
            keyboard.len()
        );

        Report {
            events,
            console,
            network,
            keyboard,
            ..Report::new(metadata)
        }
    }

    /// Changes the window of all four buffers. Applies from the next eviction.
    pub fn reconfigure(&mut self, window_ms: u64) -> Result<(), ConfigError> {
        if window_ms == 0 {
            return Err(ConfigError::NotInRange(
                "window_ms must be greater than 0".to_string(),
            ));
        }
        lock(&self.events).set_window_duration(window_ms);
        lock(&self.console).set_window_duration(window_ms);
        lock(&self.network).set_window_duration(window_ms);
        lock(&self.keyboard).set_window_duration(window_ms);
        self.config.window_ms = window_ms;
        info!("[{}] window set to {} ms", self.id, window_ms);
        Ok(())
    }

    /// Stops recording, then drops all buffered records and lifecycle state.
    pub fn reset(&mut self) {
        self.stop();
        lock(&self.events).clear();
        lock(&self.console).clear();
        lock(&self.network).clear();
        lock(&self.keyboard).clear();
        self.started_at = None;
        info!("[{}] capture context reset", self.id);
    }

    /// Asks the trace source for a fresh full snapshot, e.g. after the page
    /// becomes visible again. Does nothing while stopped.
    pub fn resync_trace(&mut self) -> Result<(), CaptureError> {
        self.trace_recorder.resync().inspect_err(|e| {
            warn!("[{}] trace resync failed: {}", self.id, e);
        })
    }

    /// Console wrapper to install in place of `original`.
    pub fn intercept_console(&self, original: Arc<dyn HostConsole>) -> InterceptedConsole {
        self.console_recorder.wrap(original)
    }

    pub fn intercept_xhr<B: XhrBackend>(&self, original: B) -> InterceptedXhr<B> {
        self.network_correlator.wrap_xhr(original)
    }

    pub fn intercept_fetch<F: FetchBackend>(&self, original: F) -> InterceptedFetch<F> {
        self.network_correlator.wrap_fetch(original)
    }

    pub fn key_listener(&self) -> KeyListener {
        self.keyboard_recorder.listener()
    }
}

impl Drop for CaptureOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::clock::ManualClock;
    use crate::data_capture::host::{HostError, HostValue, PageInfo, StaticEnvironment};
    use crate::data_capture::keyboard_recorder::{EventTarget, HostKeyEvent};
    use crate::data_capture::network_correlator::{
        FetchError, FetchRequest, FetchResponse, RequestBody,
    };
    use crate::data_capture::trace_recorder::{FeedTraceSource, TraceFeed, TraceOptions};
    use crate::data_capture::types::{ConsoleLevel, KeyboardEventType, Modifiers};
    use crate::data_capture::EventSink;
    use serde_json::json;

    struct SilentConsole;

    impl HostConsole for SilentConsole {
        fn write(&self, _: ConsoleLevel, _: &[HostValue]) {}
        fn current_stack(&self) -> Option<String> {
            Some("Error\n    at wrapper\n    at call\n    at synthetic".into())
        }
    }

    struct EchoFetch;

    impl FetchBackend for EchoFetch {
        async fn fetch(&self, _: FetchRequest) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse {
                status: 200,
                status_text: "OK".into(),
                headers: vec![("set-token".into(), "t".into())],
                body: br#"{"token":"abc","ok":true}"#.to_vec(),
            })
        }
    }

    struct BrokenSource;

    impl TraceSource for BrokenSource {
        fn start(&mut self, _: EventSink<TraceEvent>, _: &TraceOptions) -> Result<(), CaptureError> {
            Err(CaptureError::TraceSourceFailed("no document".into()))
        }
        fn stop(&mut self) {}
        fn take_full_snapshot(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
    }

    fn orchestrator(clock: &ManualClock) -> (CaptureOrchestrator, TraceFeed) {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let source = FeedTraceSource::new(Arc::clone(&clock));
        let feed = source.feed();
        let environment = Arc::new(StaticEnvironment::new(PageInfo {
            url: "https://app.example.com/checkout".into(),
            title: "Checkout".into(),
            user_agent: "TestAgent/1.0".into(),
            screen_width: 1440,
            screen_height: 900,
        }));
        let orchestrator = CaptureOrchestrator::with_clock(
            CaptureConfig::default(),
            Box::new(source),
            environment,
            clock,
        )
        .unwrap();
        (orchestrator, feed)
    }

    #[test]
    fn console_error_keeps_own_stack() {
        let clock = ManualClock::new(10_000);
        let (mut orch, _feed) = orchestrator(&clock);
        let console = orch.intercept_console(Arc::new(SilentConsole));

        orch.start();
        console.error(&[HostValue::Error(HostError::new("boom").with_stack("X"))]);
        orch.stop();

        let report = orch.snapshot();
        assert_eq!(report.console[0].level, ConsoleLevel::Error);
        assert!(report.console[0].stack.as_deref().unwrap().starts_with("X"));
    }

    #[tokio::test]
    async fn fetch_login_body_is_sanitized_before_buffering() {
        let clock = ManualClock::new(0);
        let (mut orch, _feed) = orchestrator(&clock);
        let fetch = orch.intercept_fetch(EchoFetch);
        orch.start();

        fetch
            .fetch(FetchRequest {
                method: Some("POST".into()),
                url: "https://api.example.com/login".into(),
                headers: vec![("Content-Type".into(), "application/json".into())],
                body: Some(RequestBody::Text(r#"{"password":"abc123","user":"bob"}"#.into())),
            })
            .await
            .unwrap();

        let report = orch.snapshot();
        let entry = &report.network[0];
        let body = entry.request_body.as_deref().unwrap();
        assert!(body.contains("********"));
        assert!(!body.contains("abc123"));
        assert!(body.contains("\"bob\""));
        assert_eq!(entry.response_body.as_deref(), Some(r#"{"token":"********","ok":true}"#));
        assert_eq!(entry.response_headers.as_ref().unwrap()["set-token"], "********");
    }

    #[test]
    fn state_counts_streams_and_evicts() {
        let clock = ManualClock::new(1_000);
        let (mut orch, feed) = orchestrator(&clock);
        let listener = orch.key_listener();
        orch.start();

        feed.emit(TraceEvent::new(1_000, json!({"type": 2})));
        clock.set(3_000);
        feed.emit(TraceEvent::new(3_000, json!({"type": 3})));
        listener.handle(&HostKeyEvent {
            kind: KeyboardEventType::Keydown,
            key: "p".into(),
            code: "KeyP".into(),
            modifiers: Modifiers::default(),
            repeat: false,
            target: Some(EventTarget::input("password")),
        });

        let state = orch.state();
        assert!(state.active);
        assert_eq!(state.started_at, Some(1_000));
        assert_eq!(state.counts.events, 2);
        assert_eq!(state.counts.keyboard, 1);
        assert_eq!(state.window_elapsed, 2_000);

        let report = orch.snapshot();
        assert_eq!(report.metadata.duration, 2_000);
        assert_eq!(report.metadata.timestamp, 3_000);
        assert_eq!(report.metadata.title, "Checkout");
        assert_eq!(report.keyboard[0].key, "*");

        clock.advance(60_500);
        let state = orch.state();
        assert_eq!(state.counts.total(), 0);
        assert_eq!(state.window_elapsed, 0);
    }

    #[test]
    fn stop_keeps_buffers_and_reset_clears_them() {
        let clock = ManualClock::new(0);
        let (mut orch, feed) = orchestrator(&clock);
        orch.start();
        feed.emit(TraceEvent::new(0, json!({})));
        orch.stop();
        assert!(!feed.emit(TraceEvent::new(1, json!({}))));

        let state = orch.state();
        assert!(!state.active);
        assert_eq!(state.counts.events, 1);

        orch.reset();
        let state = orch.state();
        assert_eq!(state.counts.events, 0);
        assert_eq!(state.started_at, None);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let clock = ManualClock::new(5);
        let (mut orch, _feed) = orchestrator(&clock);
        orch.start();
        clock.set(50);
        orch.start();
        assert_eq!(orch.state().started_at, Some(5));
    }

    #[test]
    fn failing_trace_source_does_not_block_other_streams() {
        let clock = ManualClock::new(0);
        let mut orch = CaptureOrchestrator::with_clock(
            CaptureConfig::default(),
            Box::new(BrokenSource),
            Arc::new(StaticEnvironment::default()),
            Arc::new(clock.clone()),
        )
        .unwrap();
        let console = orch.intercept_console(Arc::new(SilentConsole));
        orch.start();
        console.log(&["still recorded".into()]);

        let state = orch.state();
        assert!(state.active);
        assert_eq!(state.counts.console, 1);
        assert_eq!(state.counts.events, 0);
    }

    #[test]
    fn reconfigure_applies_to_every_buffer() {
        let clock = ManualClock::new(0);
        let (mut orch, feed) = orchestrator(&clock);
        let console = orch.intercept_console(Arc::new(SilentConsole));
        orch.start();
        feed.emit(TraceEvent::new(0, json!({})));
        console.info(&["old".into()]);

        clock.set(5_000);
        assert_eq!(orch.state().counts.total(), 2);
        orch.reconfigure(1_000).unwrap();
        assert_eq!(orch.state().counts.total(), 0);
        assert_eq!(orch.config().window_ms, 1_000);
        assert!(orch.reconfigure(0).is_err());
    }

    #[test]
    fn resync_reaches_trace_source_only_while_recording() {
        let clock = ManualClock::new(0);
        let (mut orch, feed) = orchestrator(&clock);
        orch.resync_trace().unwrap();
        assert_eq!(feed.take_snapshot_requests(), 0);
        orch.start();
        orch.resync_trace().unwrap();
        assert_eq!(feed.take_snapshot_requests(), 1);
    }

    #[test]
    fn instances_are_independent() {
        let clock = ManualClock::new(0);
        let (mut a, feed_a) = orchestrator(&clock);
        let (b, _feed_b) = orchestrator(&clock);
        a.start();
        feed_a.emit(TraceEvent::new(0, json!({})));
        assert_eq!(a.state().counts.events, 1);
        assert_eq!(b.state().counts.events, 0);
        assert!(!b.is_active());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn empty_snapshot_has_zero_duration() {
        let clock = ManualClock::new(42);
        let (orch, _feed) = orchestrator(&clock);
        let report = orch.snapshot();
        assert_eq!(report.metadata.duration, 0);
        assert_eq!(report.record_count(), 0);
        assert_eq!(report.version, "2.0.0");
    }
}
