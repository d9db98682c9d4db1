//! Observable container for the project aggregate.
//!
//! Every mutation is staged on a copy of the project, validated, and only then
//! swapped in. Subscribers run synchronously after the swap, so they observe
//! either the old or the new state, never a partial one.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::history::History;
use crate::persist::{self, ImportReport};
use crate::project::{
    Clip, ClipId, MAX_TRACK_VOLUME, MediaFile, MediaId, NewClip, NewMediaFile, Project, Track,
    TrackId, TrackKind,
};
use crate::range::{Range, merge_ranges, valid_ranges};
use crate::timeline::TimelinePatch;

/// Handle returned by [`ProjectStore::subscribe`].
pub type SubscriptionId = u64;

/// Callback invoked after each committed mutation.
pub type Subscriber = Box<dyn FnMut(&Change, &Project) + Send>;

/// Typed description of a committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    MediaAdded {
        media_id: MediaId,
    },
    MediaRemoved {
        media_id: MediaId,
        removed_clips: Vec<ClipId>,
    },
    TrackAdded {
        track_id: TrackId,
    },
    TrackUpdated {
        track_id: TrackId,
    },
    TrackRemoved {
        track_id: TrackId,
        removed_clips: Vec<ClipId>,
    },
    ClipAdded {
        clip_id: ClipId,
    },
    ClipUpdated {
        clip_id: ClipId,
    },
    ClipRemoved {
        clip_id: ClipId,
    },
    ClipSplit {
        left: ClipId,
        right: ClipId,
    },
    TimelineUpdated,
    PreviewCutsChanged,
    AcceptedCutsChanged,
    /// The whole aggregate was swapped (import, load, edit undo/redo).
    ProjectReplaced,
}

/// What to do with clips that reference a track or media file being removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Refuse the removal while any clip references the target.
    #[default]
    Reject,
    /// Remove the referencing clips in the same mutation.
    Cascade,
    /// Keep the referencing clips; they show up in the integrity report.
    Orphan,
}

/// Partial update for a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub muted: Option<bool>,
    #[serde(default)]
    pub volume: Option<u8>,
    #[serde(default)]
    pub order: Option<i32>,
}

/// Partial update for a clip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub end_time: Option<f64>,
    #[serde(default)]
    pub track_id: Option<TrackId>,
    #[serde(default)]
    pub offset: Option<f64>,
}

impl ClipPatch {
    fn apply_to(&self, clip: &mut Clip) {
        if let Some(name) = &self.name {
            clip.name = name.clone();
        }
        if let Some(start_time) = self.start_time {
            clip.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            clip.end_time = end_time;
        }
        if let Some(track_id) = self.track_id {
            clip.track_id = track_id;
        }
        if let Some(offset) = self.offset {
            clip.offset = offset;
        }
    }
}

/// Canonical in-memory project state.
pub struct ProjectStore {
    project: Project,
    path: Option<PathBuf>,
    preview_cuts: Vec<Range>,
    cut_history: History<Vec<Range>>,
    edit_history: History<Project>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription_id: SubscriptionId,
    next_media_id: MediaId,
    next_track_id: TrackId,
    next_clip_id: ClipId,
}

impl Debug for ProjectStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectStore")
            .field("project", &self.project)
            .field("path", &self.path)
            .field("preview_cuts", &self.preview_cuts)
            .field("cut_history", &self.cut_history)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new(Project::with_default_tracks())
    }
}

impl ProjectStore {
    /// Wraps `project` with empty cut lists and a fresh edit history.
    ///
    /// # Example
    /// ```
    /// use engine::{ProjectStore, TrackKind};
    ///
    /// let mut store = ProjectStore::default();
    /// let track_id = store.add_track("B-roll", TrackKind::Video);
    /// assert_eq!(store.project().tracks[&track_id].order, 2);
    /// ```
    pub fn new(project: Project) -> Self {
        let mut store = Self {
            edit_history: History::new(project.clone()),
            project,
            path: None,
            preview_cuts: Vec::new(),
            cut_history: History::new(Vec::new()),
            subscribers: Vec::new(),
            next_subscription_id: 1,
            next_media_id: 1,
            next_track_id: 1,
            next_clip_id: 1,
        };
        store.resync_id_allocators();
        store
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Path of the last successful save or load.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Registers a callback run after every committed mutation.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Change, &Project) + Send + 'static,
    {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a subscription. Returns false when `id` was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    pub fn add_media_file(&mut self, media: NewMediaFile) -> Result<MediaId> {
        if let Err(error) = media.validate() {
            warn!(%error, "add media rejected");
            return Err(error);
        }
        let media_id = self.next_media_id;
        let mut staged = self.stage();
        staged.media.insert(media_id, media.into_media(media_id));
        self.commit(staged, vec![Change::MediaAdded { media_id }]);
        info!(media_id, "media file added");
        Ok(media_id)
    }

    pub fn remove_media_file(
        &mut self,
        media_id: MediaId,
        policy: RemovalPolicy,
    ) -> Result<MediaFile> {
        if !self.project.media.contains_key(&media_id) {
            warn!(media_id, "remove media rejected: not found");
            return Err(EngineError::MediaNotFound { media_id });
        }
        let referencing = self.project.clips_using_media(media_id);
        let removed_clips = match (policy, referencing.is_empty()) {
            (RemovalPolicy::Reject, false) => {
                warn!(
                    media_id,
                    clip_count = referencing.len(),
                    "remove media rejected: still referenced"
                );
                return Err(EngineError::MediaInUse {
                    media_id,
                    clip_count: referencing.len(),
                });
            }
            (RemovalPolicy::Cascade, _) => referencing,
            _ => Vec::new(),
        };

        let mut staged = self.stage();
        let Some(removed) = staged.media.remove(&media_id) else {
            return Err(EngineError::MediaNotFound { media_id });
        };
        for clip_id in &removed_clips {
            staged.clips.remove(clip_id);
        }
        info!(
            media_id,
            ?policy,
            removed_clip_count = removed_clips.len(),
            "media file removed"
        );
        self.commit(
            staged,
            vec![Change::MediaRemoved {
                media_id,
                removed_clips,
            }],
        );
        Ok(removed)
    }

    /// Adds a track stacked outside the existing tracks of the same kind.
    ///
    /// A blank `name` is replaced by `"Video N"` / `"Audio N"`.
    pub fn add_track(&mut self, name: &str, kind: TrackKind) -> TrackId {
        let track_id = self.next_track_id;
        let mut staged = self.stage();
        let order = staged.next_track_order(kind);
        let name = if name.trim().is_empty() {
            let count = staged.tracks.values().filter(|t| t.kind == kind).count() + 1;
            match kind {
                TrackKind::Video => format!("Video {count}"),
                TrackKind::Audio => format!("Audio {count}"),
            }
        } else {
            name.trim().to_string()
        };
        staged.tracks.insert(
            track_id,
            Track {
                id: track_id,
                name,
                kind,
                enabled: true,
                muted: false,
                volume: MAX_TRACK_VOLUME,
                order,
            },
        );
        debug!(track_id, ?kind, order, "track added");
        self.commit(staged, vec![Change::TrackAdded { track_id }]);
        track_id
    }

    /// Merges `patch` over the track. Unknown ids and orders that would move
    /// the track into the other kind's range are ignored.
    pub fn update_track(&mut self, track_id: TrackId, patch: TrackPatch) -> bool {
        let mut staged = self.stage();
        let Some(track) = staged.tracks.get_mut(&track_id) else {
            warn!(track_id, "update track ignored: not found");
            return false;
        };
        if let Some(name) = patch.name {
            track.name = name;
        }
        if let Some(enabled) = patch.enabled {
            track.enabled = enabled;
        }
        if let Some(muted) = patch.muted {
            track.muted = muted;
        }
        if let Some(volume) = patch.volume {
            track.volume = volume.min(MAX_TRACK_VOLUME);
        }
        if let Some(order) = patch.order {
            let in_range = match track.kind {
                TrackKind::Video => order > 0,
                TrackKind::Audio => order < 0,
            };
            if !in_range {
                warn!(track_id, order, "update track ignored: order outside kind range");
                return false;
            }
            track.order = order;
        }
        self.commit(staged, vec![Change::TrackUpdated { track_id }]);
        true
    }

    pub fn remove_track(&mut self, track_id: TrackId, policy: RemovalPolicy) -> Result<Track> {
        if !self.project.tracks.contains_key(&track_id) {
            warn!(track_id, "remove track rejected: not found");
            return Err(EngineError::TrackNotFound { track_id });
        }
        let hosted = self.project.clips_on_track_ids(track_id);
        let removed_clips = match (policy, hosted.is_empty()) {
            (RemovalPolicy::Reject, false) => {
                warn!(
                    track_id,
                    clip_count = hosted.len(),
                    "remove track rejected: still hosts clips"
                );
                return Err(EngineError::TrackInUse {
                    track_id,
                    clip_count: hosted.len(),
                });
            }
            (RemovalPolicy::Cascade, _) => hosted,
            _ => Vec::new(),
        };

        let mut staged = self.stage();
        let Some(removed) = staged.tracks.remove(&track_id) else {
            return Err(EngineError::TrackNotFound { track_id });
        };
        for clip_id in &removed_clips {
            staged.clips.remove(clip_id);
        }
        info!(
            track_id,
            ?policy,
            removed_clip_count = removed_clips.len(),
            "track removed"
        );
        self.commit(
            staged,
            vec![Change::TrackRemoved {
                track_id,
                removed_clips,
            }],
        );
        Ok(removed)
    }

    /// Adds a clip after checking its track, media file and source window.
    pub fn add_clip(&mut self, clip: NewClip) -> Result<ClipId> {
        let mut staged = self.stage();
        let clip_id = self.next_clip_id;
        let clip = self.materialize_clip(&staged, clip_id, clip)?;
        staged.clips.insert(clip_id, clip);
        self.commit(staged, vec![Change::ClipAdded { clip_id }]);
        Ok(clip_id)
    }

    /// Merges `patch` over the clip. Unknown ids and patches that would break
    /// a clip invariant are ignored.
    pub fn update_clip(&mut self, clip_id: ClipId, patch: ClipPatch) -> bool {
        let mut staged = self.stage();
        let Some(clip) = staged.clips.get_mut(&clip_id) else {
            warn!(clip_id, "update clip ignored: not found");
            return false;
        };
        patch.apply_to(clip);
        let candidate = clip.clone();
        if let Err(error) = staged.validate_clip(&candidate) {
            warn!(clip_id, %error, "update clip ignored: invalid result");
            return false;
        }
        self.commit(staged, vec![Change::ClipUpdated { clip_id }]);
        true
    }

    pub fn remove_clip(&mut self, clip_id: ClipId) -> Result<Clip> {
        let mut staged = self.stage();
        let Some(removed) = staged.clips.remove(&clip_id) else {
            warn!(clip_id, "remove clip rejected: not found");
            return Err(EngineError::ClipNotFound { clip_id });
        };
        debug!(clip_id, "clip removed");
        self.commit(staged, vec![Change::ClipRemoved { clip_id }]);
        Ok(removed)
    }

    pub fn update_timeline(&mut self, patch: TimelinePatch) -> bool {
        let Some(timeline) = patch.merged_over(&self.project.timeline) else {
            warn!(?patch, "update timeline ignored: invalid values");
            return false;
        };
        self.project.timeline = timeline;
        self.notify(&[Change::TimelineUpdated]);
        true
    }

    pub fn preview_cuts(&self) -> &[Range] {
        &self.preview_cuts
    }

    /// Committed cut ranges, merge-normalized.
    pub fn accepted_cuts(&self) -> &[Range] {
        self.cut_history.current()
    }

    pub fn cut_history(&self) -> &History<Vec<Range>> {
        &self.cut_history
    }

    /// Replaces the proposed cuts. Empty, inverted or non-finite ranges are
    /// dropped.
    pub fn set_preview_cuts(&mut self, ranges: Vec<Range>) {
        self.preview_cuts = valid_ranges(ranges);
        debug!(
            preview_count = self.preview_cuts.len(),
            "preview cuts replaced"
        );
        self.notify(&[Change::PreviewCutsChanged]);
    }

    pub fn clear_preview_cuts(&mut self) {
        if self.preview_cuts.is_empty() {
            return;
        }
        self.preview_cuts.clear();
        self.notify(&[Change::PreviewCutsChanged]);
    }

    /// Moves the preview cuts into the accepted list and merges it.
    ///
    /// Pushes one cut-history entry. Without preview cuts this is a no-op.
    pub fn accept_preview_cuts(&mut self) -> &[Range] {
        if self.preview_cuts.is_empty() {
            return self.cut_history.current();
        }
        let mut combined = self.cut_history.current().clone();
        combined.append(&mut self.preview_cuts);
        let merged = merge_ranges(&combined);
        info!(accepted_count = merged.len(), "preview cuts accepted");
        self.cut_history.push(merged);
        self.notify(&[Change::PreviewCutsChanged, Change::AcceptedCutsChanged]);
        self.cut_history.current()
    }

    /// Replaces the accepted cuts with the merged `ranges`, as one history step.
    ///
    /// Invalid ranges are dropped as in [`ProjectStore::set_preview_cuts`].
    pub fn set_accepted_cuts(&mut self, ranges: &[Range]) -> &[Range] {
        self.cut_history
            .push(merge_ranges(&valid_ranges(ranges.iter().copied())));
        self.notify(&[Change::AcceptedCutsChanged]);
        self.cut_history.current()
    }

    pub fn undo_cuts(&mut self) -> &[Range] {
        let before = self.cut_history.index();
        self.cut_history.undo();
        if before != self.cut_history.index() {
            self.notify(&[Change::AcceptedCutsChanged]);
        }
        self.cut_history.current()
    }

    pub fn redo_cuts(&mut self) -> &[Range] {
        let before = self.cut_history.index();
        self.cut_history.redo();
        if before != self.cut_history.index() {
            self.notify(&[Change::AcceptedCutsChanged]);
        }
        self.cut_history.current()
    }

    pub fn can_undo_edit(&self) -> bool {
        self.edit_history.can_undo()
    }

    pub fn can_redo_edit(&self) -> bool {
        self.edit_history.can_redo()
    }

    /// Restores the project aggregate before the last committed edit.
    ///
    /// Timeline view settings (zoom, playhead) are not part of the edit
    /// history and keep their current values. Returns false when there is
    /// nothing to undo.
    pub fn undo_edit(&mut self) -> bool {
        if !self.edit_history.can_undo() {
            return false;
        }
        let snapshot = self.edit_history.undo().clone();
        self.restore_edit(snapshot);
        debug!(index = self.edit_history.index(), "edit undone");
        self.notify(&[Change::ProjectReplaced]);
        true
    }

    pub fn redo_edit(&mut self) -> bool {
        if !self.edit_history.can_redo() {
            return false;
        }
        let snapshot = self.edit_history.redo().clone();
        self.restore_edit(snapshot);
        debug!(index = self.edit_history.index(), "edit redone");
        self.notify(&[Change::ProjectReplaced]);
        true
    }

    /// Serializes the project and its cut history.
    pub fn export_to_json(&self) -> Result<String> {
        persist::encode(&self.project, &self.cut_history, None)
    }

    /// Replaces the whole aggregate with the document in `json`.
    ///
    /// Dangling references do not fail the import; they are returned in the
    /// report. On error the store is left untouched.
    pub fn import_from_json(&mut self, json: &str) -> Result<ImportReport> {
        let decoded = persist::decode(json, None)?;
        Ok(self.replace(decoded))
    }

    /// Writes the project to `path` and remembers it.
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = persist::encode(&self.project, &self.cut_history, Some(path))?;
        std::fs::write(path, json).map_err(|source| EngineError::ProjectIo {
            context: "failed to write project file",
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "project saved");
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Loads the project stored at `path`.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<ImportReport> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::ProjectIo {
            context: "failed to read project file",
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = persist::decode(&json, Some(path))?;
        let report = self.replace(decoded);
        info!(
            path = %path.display(),
            tracks = self.project.tracks.len(),
            clips = self.project.clips.len(),
            media = self.project.media.len(),
            warnings = report.warnings.len(),
            "project loaded"
        );
        self.path = Some(path.to_path_buf());
        Ok(report)
    }

    pub(crate) fn stage(&self) -> Project {
        self.project.clone()
    }

    /// Swaps in a fully validated project, records it and notifies.
    ///
    /// A commit that leaves the project unchanged adds no edit-history entry.
    /// Ids handed out by `peek_*_id` are claimed here, so rejected edits never
    /// consume one.
    pub(crate) fn commit(&mut self, staged: Project, changes: Vec<Change>) {
        if staged != self.project {
            self.project = staged;
            self.edit_history.push(self.project.clone());
            self.resync_id_allocators();
        }
        self.notify(&changes);
    }

    fn restore_edit(&mut self, mut snapshot: Project) {
        snapshot.timeline = self.project.timeline.clone();
        self.project = snapshot;
    }

    /// Id the next committed clip will get.
    pub(crate) fn peek_clip_id(&self) -> ClipId {
        self.next_clip_id
    }

    pub(crate) fn peek_media_id(&self) -> MediaId {
        self.next_media_id
    }

    /// Builds and validates a clip from `clip` against `project`.
    pub(crate) fn materialize_clip(
        &self,
        project: &Project,
        clip_id: ClipId,
        clip: NewClip,
    ) -> Result<Clip> {
        let name = match clip.name {
            Some(name) => name,
            None => project
                .media
                .get(&clip.media_id)
                .map(|media| display_name(&media.path))
                .unwrap_or_default(),
        };
        let clip = Clip {
            id: clip_id,
            media_id: clip.media_id,
            name,
            start_time: clip.start_time,
            end_time: clip.end_time,
            track_id: clip.track_id,
            offset: clip.offset,
        };
        if let Err(error) = project.validate_clip(&clip) {
            warn!(clip_id, %error, "clip rejected");
            return Err(error);
        }
        Ok(clip)
    }

    fn replace(&mut self, decoded: persist::Decoded) -> ImportReport {
        let mut report = ImportReport::from_integrity(&decoded.project.integrity_report());
        report.warnings.extend(decoded.repairs);
        for warning in &report.warnings {
            warn!(%warning, "project integrity");
        }
        self.project = decoded.project;
        self.cut_history = decoded.cut_history;
        self.preview_cuts.clear();
        self.edit_history.reset(self.project.clone());
        self.resync_id_allocators();
        self.notify(&[
            Change::ProjectReplaced,
            Change::PreviewCutsChanged,
            Change::AcceptedCutsChanged,
        ]);
        report
    }

    fn resync_id_allocators(&mut self) {
        let (media, track, clip) = self.project.max_ids();
        self.next_media_id = self.next_media_id.max(media + 1);
        self.next_track_id = self.next_track_id.max(track + 1);
        self.next_clip_id = self.next_clip_id.max(clip + 1);
    }

    fn notify(&mut self, changes: &[Change]) {
        for change in changes {
            for (_, subscriber) in self.subscribers.iter_mut() {
                subscriber(change, &self.project);
            }
        }
    }
}

/// File name without extension, used as the default clip name.
pub(crate) fn display_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(path)
        .to_string()
}
