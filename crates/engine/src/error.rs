use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::project::{ClipId, MediaId, TrackId};

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by store mutations, clip edits and persistence.
#[derive(Debug)]
pub enum EngineError {
    ClipNotFound {
        clip_id: ClipId,
    },
    TrackNotFound {
        track_id: TrackId,
    },
    MediaNotFound {
        media_id: MediaId,
    },
    SplitPointOutsideClip {
        clip_id: ClipId,
        at: f64,
    },
    InvalidSourceWindow {
        clip_id: Option<ClipId>,
        start_time: f64,
        end_time: f64,
    },
    InvalidOffset {
        offset: f64,
    },
    InvalidMediaDuration {
        path: String,
        duration: f64,
    },
    MediaInUse {
        media_id: MediaId,
        clip_count: usize,
    },
    TrackInUse {
        track_id: TrackId,
        clip_count: usize,
    },
    InvalidDropPayload {
        reason: String,
    },
    NothingToKeep {
        media_id: MediaId,
    },
    ProjectIo {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    ProjectSerialization {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
    InvalidProjectFile {
        reason: String,
    },
    InvalidConfig {
        path: PathBuf,
        reason: String,
    },
}

/// Coarse error classes used to pick a handling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or out-of-bounds input. The operation is rejected without
    /// touching state.
    Validation,
    /// The target id does not exist. Same policy as `Validation`.
    NotFound,
    /// Save/load failures, always propagated to the caller.
    Persistence,
}

impl EngineError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClipNotFound { .. } | Self::TrackNotFound { .. } | Self::MediaNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::ProjectIo { .. }
            | Self::ProjectSerialization { .. }
            | Self::InvalidProjectFile { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Persistence,
            _ => ErrorKind::Validation,
        }
    }

    /// Returns true when the operation was rejected without side effects and
    /// interactive editing may simply continue.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Persistence
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClipNotFound { clip_id } => write!(f, "clip not found: {clip_id}"),
            Self::TrackNotFound { track_id } => write!(f, "track not found: {track_id}"),
            Self::MediaNotFound { media_id } => write!(f, "media file not found: {media_id}"),
            Self::SplitPointOutsideClip { clip_id, at } => {
                write!(f, "split point {at}s is not strictly inside clip {clip_id}")
            }
            Self::InvalidSourceWindow {
                clip_id: Some(clip_id),
                start_time,
                end_time,
            } => write!(
                f,
                "invalid source window for clip {clip_id}: {start_time}..{end_time}"
            ),
            Self::InvalidSourceWindow {
                clip_id: None,
                start_time,
                end_time,
            } => write!(f, "invalid source window: {start_time}..{end_time}"),
            Self::InvalidOffset { offset } => write!(f, "invalid timeline offset: {offset}"),
            Self::InvalidMediaDuration { path, duration } => {
                write!(f, "media duration must be positive: {path} ({duration}s)")
            }
            Self::MediaInUse {
                media_id,
                clip_count,
            } => write!(f, "media file {media_id} is still used by {clip_count} clip(s)"),
            Self::TrackInUse {
                track_id,
                clip_count,
            } => write!(f, "track {track_id} still hosts {clip_count} clip(s)"),
            Self::InvalidDropPayload { reason } => write!(f, "invalid drop payload: {reason}"),
            Self::NothingToKeep { media_id } => {
                write!(f, "cuts remove all content of media file {media_id}")
            }
            Self::ProjectIo {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::ProjectSerialization {
                path: Some(path),
                source,
            } => write!(
                f,
                "project serialization/deserialization failed at {} ({source})",
                path.display()
            ),
            Self::ProjectSerialization { path: None, source } => {
                write!(f, "project serialization/deserialization failed ({source})")
            }
            Self::InvalidProjectFile { reason } => write!(f, "invalid project file: {reason}"),
            Self::InvalidConfig { path, reason } => {
                write!(f, "invalid engine config {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ProjectIo { source, .. } => Some(source),
            Self::ProjectSerialization { source, .. } => Some(source),
            _ => None,
        }
    }
}
