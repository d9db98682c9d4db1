use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::command::EditCommand;
use crate::config::EngineConfig;
use crate::edit::{DropPayload, DropPlacement};
use crate::error::{EngineError, ErrorKind, Result};
use crate::export::{ExportPlan, build_export_plan};
use crate::probe::Probe;
use crate::project::{ClipId, MediaId, NewClip, NewMediaFile, TrackId, TrackKind};
use crate::range::Range;
use crate::store::{ClipPatch, ProjectStore, RemovalPolicy, TrackPatch};
use crate::timeline::{TimelinePatch, find_clip_at, normalize_playhead};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    AddMedia {
        media: NewMediaFile,
    },
    RemoveMedia {
        media_id: MediaId,
        #[serde(default)]
        policy: RemovalPolicy,
    },
    AddTrack {
        #[serde(default)]
        name: String,
        kind: TrackKind,
    },
    UpdateTrack {
        track_id: TrackId,
        patch: TrackPatch,
    },
    RemoveTrack {
        track_id: TrackId,
        #[serde(default)]
        policy: RemovalPolicy,
    },
    AddClip {
        clip: NewClip,
    },
    UpdateClip {
        clip_id: ClipId,
        patch: ClipPatch,
    },
    RemoveClip {
        clip_id: ClipId,
    },
    UpdateTimeline {
        patch: TimelinePatch,
    },
    /// Moves the playhead, clamped into the project duration.
    SetPlayhead {
        t: f64,
    },
    /// Splits `clip_id` at timeline time `at` in seconds.
    ///
    /// # Example
    /// ```
    /// use engine::{Command, Engine, Event};
    ///
    /// let mut engine = Engine::default();
    /// let events = engine
    ///     .handle_command(Command::SplitClip { clip_id: 1, at: 2.0 })
    ///     .expect("recoverable errors become events");
    /// assert!(matches!(events[0], Event::Rejected(_)));
    /// ```
    SplitClip {
        clip_id: ClipId,
        at: f64,
    },
    /// Splits whichever clip on `track_id` lies under the playhead.
    SplitAtPlayhead {
        track_id: TrackId,
    },
    ResizeClip {
        clip_id: ClipId,
        start_time: f64,
        end_time: f64,
    },
    TrimClipStart {
        clip_id: ClipId,
        start_time: f64,
    },
    TrimClipEnd {
        clip_id: ClipId,
        end_time: f64,
    },
    MoveClip {
        clip_id: ClipId,
        offset: f64,
        #[serde(default)]
        track_id: Option<TrackId>,
    },
    DropMedia {
        track_id: TrackId,
        payload: DropPayload,
        #[serde(default)]
        placement: DropPlacement,
    },
    /// Evaluates a text command and replaces the preview cuts with its result.
    RunText {
        text: String,
        probe: Probe,
        #[serde(default)]
        peaks: Vec<f32>,
    },
    SetPreviewCuts {
        ranges: Vec<Range>,
    },
    AcceptPreview,
    ClearPreview,
    UndoCuts,
    RedoCuts,
    UndoEdit,
    RedoEdit,
    Save {
        path: PathBuf,
    },
    Load {
        path: PathBuf,
    },
    CheckIntegrity,
    /// Plans an export of `media_id` with the accepted cuts removed.
    PlanExport {
        media_id: MediaId,
    },
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Event {
    ProjectChanged(ProjectSnapshot),
    PlayheadChanged { t: f64 },
    CutsChanged {
        preview: Vec<Range>,
        accepted: Vec<Range>,
    },
    CommandNotRecognized { text: String },
    Rejected(EngineErrorEvent),
    IntegrityWarnings(Vec<String>),
    ExportPlanReady(ExportPlan),
    Saved { path: PathBuf },
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
        }
    }
}

/// Immutable project snapshot consumed by hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectSnapshot {
    /// Tracks from top to bottom.
    pub tracks: Vec<TrackSummary>,
    pub media: Vec<MediaSummary>,
    pub duration: f64,
    pub playhead: f64,
}

/// Snapshot representation of one track and its clips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub muted: bool,
    pub volume: u8,
    pub order: i32,
    /// Clips ordered by offset.
    pub clips: Vec<ClipSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClipSummary {
    pub id: ClipId,
    pub media_id: MediaId,
    pub name: String,
    pub offset: f64,
    pub span: f64,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaSummary {
    pub id: MediaId,
    pub path: String,
    pub duration: f64,
    pub has_video: bool,
}

/// Command front-end over a [`ProjectStore`].
#[derive(Debug, Default)]
pub struct Engine {
    store: ProjectStore,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine over a store seeded with default tracks.
    ///
    /// # Example
    /// ```
    /// use engine::{Engine, EngineConfig};
    ///
    /// let engine = Engine::new(EngineConfig::default());
    /// assert_eq!(engine.store().project().tracks.len(), 2);
    /// ```
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(ProjectStore::default(), config)
    }

    pub fn with_store(store: ProjectStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Direct store access, e.g. to register subscribers.
    pub fn store_mut(&mut self) -> &mut ProjectStore {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Applies one command and returns emitted events.
    ///
    /// Validation and not-found failures are reported as
    /// [`Event::Rejected`]; only persistence failures are returned as `Err`.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let outcome = match command {
            Command::AddMedia { media } => {
                self.store.add_media_file(media).map(|_| self.project_changed())
            }
            Command::RemoveMedia { media_id, policy } => self
                .store
                .remove_media_file(media_id, policy)
                .map(|_| self.project_changed()),
            Command::AddTrack { name, kind } => {
                self.store.add_track(&name, kind);
                Ok(self.project_changed())
            }
            Command::UpdateTrack { track_id, patch } => {
                if !self.store.project().tracks.contains_key(&track_id) {
                    Err(EngineError::TrackNotFound { track_id })
                } else if self.store.update_track(track_id, patch) {
                    Ok(self.project_changed())
                } else {
                    Ok(rejected(format!("track {track_id} update has invalid values")))
                }
            }
            Command::RemoveTrack { track_id, policy } => self
                .store
                .remove_track(track_id, policy)
                .map(|_| self.project_changed()),
            Command::AddClip { clip } => self.store.add_clip(clip).map(|_| self.project_changed()),
            Command::UpdateClip { clip_id, patch } => {
                if !self.store.project().clips.contains_key(&clip_id) {
                    Err(EngineError::ClipNotFound { clip_id })
                } else if self.store.update_clip(clip_id, patch) {
                    Ok(self.project_changed())
                } else {
                    Ok(rejected(format!("clip {clip_id} update breaks a clip invariant")))
                }
            }
            Command::RemoveClip { clip_id } => {
                self.store.remove_clip(clip_id).map(|_| self.project_changed())
            }
            Command::UpdateTimeline { patch } => {
                if self.store.update_timeline(patch) {
                    Ok(self.project_changed())
                } else {
                    Ok(rejected("timeline update has invalid values"))
                }
            }
            Command::SetPlayhead { t } => Ok(self.set_playhead(t)),
            Command::SplitClip { clip_id, at } => self.split(clip_id, at),
            Command::SplitAtPlayhead { track_id } => self.split_at_playhead(track_id),
            Command::ResizeClip {
                clip_id,
                start_time,
                end_time,
            } => self
                .store
                .resize_clip(clip_id, start_time, end_time)
                .map(|_| self.project_changed()),
            Command::TrimClipStart {
                clip_id,
                start_time,
            } => self
                .store
                .trim_clip_start(clip_id, start_time)
                .map(|_| self.project_changed()),
            Command::TrimClipEnd { clip_id, end_time } => self
                .store
                .trim_clip_end(clip_id, end_time)
                .map(|_| self.project_changed()),
            Command::MoveClip {
                clip_id,
                offset,
                track_id,
            } => match track_id {
                Some(track_id) => self.store.move_clip_to_track(clip_id, track_id, offset),
                None => self.store.ai_move_clip(clip_id, offset),
            }
            .map(|_| self.project_changed()),
            Command::DropMedia {
                track_id,
                payload,
                placement,
            } => self
                .store
                .handle_drop_media(track_id, payload, placement)
                .map(|_| self.project_changed()),
            Command::RunText { text, probe, peaks } => Ok(self.run_text(text, &probe, &peaks)),
            Command::SetPreviewCuts { ranges } => {
                self.store.set_preview_cuts(ranges);
                Ok(self.cuts_changed())
            }
            Command::AcceptPreview => {
                self.store.accept_preview_cuts();
                Ok(self.cuts_changed())
            }
            Command::ClearPreview => {
                self.store.clear_preview_cuts();
                Ok(self.cuts_changed())
            }
            Command::UndoCuts => {
                self.store.undo_cuts();
                Ok(self.cuts_changed())
            }
            Command::RedoCuts => {
                self.store.redo_cuts();
                Ok(self.cuts_changed())
            }
            Command::UndoEdit => Ok(if self.store.undo_edit() {
                self.project_changed()
            } else {
                Vec::new()
            }),
            Command::RedoEdit => Ok(if self.store.redo_edit() {
                self.project_changed()
            } else {
                Vec::new()
            }),
            Command::Save { path } => self.save(path),
            Command::Load { path } => self.load(path),
            Command::CheckIntegrity => {
                Ok(vec![Event::IntegrityWarnings(
                    self.store.project().integrity_report().warnings(),
                )])
            }
            Command::PlanExport { media_id } => build_export_plan(
                self.store.project(),
                media_id,
                self.store.accepted_cuts(),
                &self.config,
            )
            .map(|plan| vec![Event::ExportPlanReady(plan)]),
        };

        match outcome {
            Err(error) if error.is_recoverable() => {
                debug!(%error, "command rejected");
                Ok(vec![Event::Rejected(EngineErrorEvent::from_error(&error))])
            }
            other => other,
        }
    }

    fn split(&mut self, clip_id: ClipId, at: f64) -> Result<Vec<Event>> {
        let (left, right) = self.store.split_clip(clip_id, at)?;
        info!(
            clip_id = left,
            right_id = right,
            at,
            clip_count = self.store.project().clips.len(),
            "split applied"
        );
        Ok(self.project_changed())
    }

    fn split_at_playhead(&mut self, track_id: TrackId) -> Result<Vec<Event>> {
        self.store.project().ensure_track(track_id)?;
        let playhead = self.store.project().timeline.playhead;
        match find_clip_at(self.store.project(), track_id, playhead) {
            Some(clip_id) => self.split(clip_id, playhead),
            None => Ok(rejected(format!(
                "no clip under the playhead ({playhead}s) on track {track_id}"
            ))),
        }
    }

    fn set_playhead(&mut self, t: f64) -> Vec<Event> {
        let t = normalize_playhead(t, self.store.project().duration());
        self.store.update_timeline(TimelinePatch {
            playhead: Some(t),
            ..TimelinePatch::default()
        });
        vec![Event::PlayheadChanged { t }]
    }

    fn run_text(&mut self, text: String, probe: &Probe, peaks: &[f32]) -> Vec<Event> {
        let Some(command) = EditCommand::parse(&text) else {
            info!(%text, "text command not recognized");
            return vec![Event::CommandNotRecognized { text }];
        };
        let ranges = command.evaluate(probe, peaks, &self.config);
        info!(?command, range_count = ranges.len(), "text command previewed");
        self.store.set_preview_cuts(ranges);
        self.cuts_changed()
    }

    fn save(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        self.store.save_to_file(&path)?;
        Ok(vec![Event::Saved { path }])
    }

    fn load(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let report = self.store.load_from_file(&path)?;
        let mut events = self.project_changed();
        events.extend(self.cuts_changed());
        if !report.is_clean() {
            events.push(Event::IntegrityWarnings(report.warnings));
        }
        Ok(events)
    }

    fn project_changed(&self) -> Vec<Event> {
        vec![Event::ProjectChanged(self.store.project().snapshot())]
    }

    fn cuts_changed(&self) -> Vec<Event> {
        vec![Event::CutsChanged {
            preview: self.store.preview_cuts().to_vec(),
            accepted: self.store.accepted_cuts().to_vec(),
        }]
    }
}

fn rejected(message: impl Into<String>) -> Vec<Event> {
    vec![Event::Rejected(EngineErrorEvent::invalid(message))]
}
