use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::configuration::config::Config;
use crate::data_capture::host::HostEnvironment;
use crate::data_capture::trace_recorder::TraceSource;
use crate::error_handling::types::*;
use crate::orchestration::capture_orchestrator::CaptureOrchestrator;
use crate::orchestration::types::CaptureState;
use crate::report_generation::assembler::ReportAssembler;
use crate::storage::file_storage::FileArtifactStore;
use crate::storage::storage_trait::ArtifactStore;

/// Requests relayed from a control surface, e.g. `{"type":"GET_STATE"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    StartRecording,
    StopRecording,
    GetState,
    GenerateReport,
}

/// Answer to a [`Command`]. Serialized without a tag: the shape tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Generated { success: bool, filename: String },
    State(CaptureState),
    Failed { error: String },
    Ack { success: bool },
}

/// The command surface of one capture context.
///
/// # Fields Overview
///
/// - `orchestrator`: the capture context the commands act on
/// - `assembler`: turns snapshots into artifacts
/// - `store`: where generated artifacts are delivered
pub struct Controller {
    orchestrator: CaptureOrchestrator,
    assembler: ReportAssembler,
    store: Arc<dyn ArtifactStore>,
}

impl Controller {
    pub fn new(orchestrator: CaptureOrchestrator, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            orchestrator,
            assembler: ReportAssembler::new(),
            store,
        }
    }

    /// Builds the orchestrator and a [`FileArtifactStore`] from `config`.
    pub fn from_config(
        config: &Config,
        trace_source: Box<dyn TraceSource>,
        environment: Arc<dyn HostEnvironment>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let orchestrator =
            CaptureOrchestrator::new(config.capture.clone(), trace_source, environment)?;
        let store = FileArtifactStore::from_config(&config.capture)?;
        info!("[{}] controller ready", orchestrator.id());
        Ok(Self::new(orchestrator, Arc::new(store)))
    }

    pub fn orchestrator(&self) -> &CaptureOrchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut CaptureOrchestrator {
        &mut self.orchestrator
    }

    pub fn handle(&mut self, command: Command) -> CommandResponse {
        debug!("[{}] handling {:?}", self.orchestrator.id(), command);
        match command {
            Command::StartRecording => {
                self.orchestrator.start();
                CommandResponse::Ack { success: true }
            }
            Command::StopRecording => {
                self.orchestrator.stop();
                CommandResponse::Ack { success: true }
            }
            Command::GetState => CommandResponse::State(self.orchestrator.state()),
            Command::GenerateReport => match self.generate_report() {
                Ok(filename) => CommandResponse::Generated {
                    success: true,
                    filename,
                },
                Err(e) => CommandResponse::Failed {
                    error: e.to_string(),
                },
            },
        }
    }

    /// Parses a raw JSON command and handles it.
    pub fn handle_message(&mut self, raw: &str) -> CommandResponse {
        match serde_json::from_str::<Command>(raw) {
            Ok(command) => self.handle(command),
            Err(e) => {
                warn!("[{}] rejected message {}: {}", self.orchestrator.id(), raw, e);
                CommandResponse::Failed {
                    error: "Unknown message type".to_string(),
                }
            }
        }
    }

    /// Snapshots, assembles and saves an artifact, returning its file name.
    ///
    /// Recording state and buffered records are untouched whether this
    /// succeeds or not, so a failed attempt can be retried.
    pub fn generate_report(&mut self) -> Result<String, ControllerError> {
        let report = self.orchestrator.snapshot();
        let artifact = self.assembler.assemble(&report).map_err(|e| {
            error!("[{}] report assembly failed: {}", self.orchestrator.id(), e);
            ControllerError::from(e)
        })?;
        self.store.save_artifact(&artifact).map_err(|e| {
            error!("[{}] saving {} failed: {}", self.orchestrator.id(), artifact.filename, e);
            ControllerError::from(e)
        })?;
        info!("[{}] report {} generated", self.orchestrator.id(), artifact.filename);
        Ok(artifact.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::clock::ManualClock;
    use crate::data_capture::host::StaticEnvironment;
    use crate::data_capture::trace_recorder::FeedTraceSource;
    use crate::data_capture::types::TraceEvent;
    use crate::data_capture::TraceFeed;
    use crate::report_generation::assembler::{decode_artifact, Artifact};
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FailingStore;

    impl ArtifactStore for FailingStore {
        fn save_artifact(&self, _: &Artifact) -> Result<PathBuf, StorageError> {
            Err(StorageError::WriteFailed)
        }
        fn load_artifact(&self, _: &str) -> Result<String, StorageError> {
            Err(StorageError::NotFound)
        }
        fn list_artifacts(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn controller(store: Arc<dyn ArtifactStore>) -> (Controller, TraceFeed) {
        let _ = env_logger::builder().is_test(true).try_init();
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let source = FeedTraceSource::new(clock.clone());
        let feed = source.feed();
        let orchestrator = CaptureOrchestrator::with_clock(
            Default::default(),
            Box::new(source),
            Arc::new(StaticEnvironment::default()),
            clock,
        )
        .unwrap();
        (Controller::new(orchestrator, store), feed)
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!(
            serde_json::to_value(Command::StartRecording).unwrap(),
            json!({"type": "START_RECORDING"})
        );
        assert_eq!(
            serde_json::from_str::<Command>(r#"{"type":"GENERATE_REPORT"}"#).unwrap(),
            Command::GenerateReport
        );
        assert_eq!(
            serde_json::to_value(CommandResponse::Ack { success: true }).unwrap(),
            json!({"success": true})
        );
    }

    #[test]
    fn test_start_state_stop() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()).unwrap());
        let (mut controller, feed) = controller(store);

        assert_eq!(
            controller.handle_message(r#"{"type":"START_RECORDING"}"#),
            CommandResponse::Ack { success: true }
        );
        feed.emit(TraceEvent::new(1_700_000_000_000, json!({"type": 4})));

        let CommandResponse::State(state) = controller.handle(Command::GetState) else {
            panic!("expected state");
        };
        assert!(state.active);
        assert_eq!(state.counts.events, 1);

        controller.handle(Command::StopRecording);
        assert!(!controller.orchestrator().is_active());
    }

    #[test]
    fn test_generate_report_saves_decodable_artifact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileArtifactStore::new(dir.path()).unwrap());
        let (mut controller, feed) = controller(store.clone());
        controller.handle(Command::StartRecording);
        feed.emit(TraceEvent::new(1_700_000_000_000, json!({"type": 2})));

        let CommandResponse::Generated { success, filename } =
            controller.handle(Command::GenerateReport)
        else {
            panic!("expected generated response");
        };
        assert!(success);
        assert_eq!(filename, "bugstream-report-20231114T221320.html");

        let html = store.load_artifact(&filename).unwrap();
        let report = decode_artifact(&html).unwrap();
        assert_eq!(report.events.len(), 1);
        assert!(controller.orchestrator().is_active());
    }

    #[test]
    fn test_failed_generate_keeps_recording_state() {
        let (mut controller, feed) = controller(Arc::new(FailingStore));
        controller.handle(Command::StartRecording);
        feed.emit(TraceEvent::new(1_700_000_000_000, json!({"type": 2})));

        let response = controller.handle(Command::GenerateReport);
        assert!(matches!(response, CommandResponse::Failed { ref error } if error.contains("Storage")));

        let state = controller.orchestrator().state();
        assert!(state.active);
        assert_eq!(state.counts.events, 1);
    }

    #[test]
    fn test_unknown_message() {
        let (mut controller, _feed) = controller(Arc::new(FailingStore));
        assert_eq!(
            controller.handle_message(r#"{"type":"RECORDING_STATE_CHANGED"}"#),
            CommandResponse::Failed {
                error: "Unknown message type".to_string()
            }
        );
    }
}
