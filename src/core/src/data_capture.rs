//! Capture side of the pipeline: record types, the time-windowed buffer and
//! the four stream recorders (trace, console, network, keyboard).

pub mod clock;
pub mod console_recorder;
pub mod host;
pub mod keyboard_recorder;
pub mod network_correlator;
pub mod recorder;
pub mod time_window_buffer;
pub mod trace_recorder;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use console_recorder::{ConsoleRecorder, HostConsole, InterceptedConsole};
pub use host::{HostEnvironment, HostValue, PageInfo, StaticEnvironment};
pub use keyboard_recorder::{EventTarget, HostKeyEvent, KeyListener, KeyboardRecorder};
pub use network_correlator::{
    FetchBackend, FetchError, FetchRequest, FetchResponse, InterceptedFetch, InterceptedXhr,
    NetworkCorrelator, Outcome, RequestBody, XhrBackend, XhrEvent,
};
pub use recorder::{EventSink, Recorder};
pub use time_window_buffer::TimeWindowBuffer;
pub use trace_recorder::{FeedTraceSource, TraceFeed, TraceOptions, TraceRecorder, TraceSource};
pub use types::{
    ConsoleEntry, ConsoleLevel, KeyboardEntry, KeyboardEventType, Modifiers, NetworkEntry,
    SerializedValue, TaggedValue, Timestamped, TraceEvent,
};
