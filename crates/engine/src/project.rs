use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api::{ClipSummary, MediaSummary, ProjectSnapshot, TrackSummary};
use crate::error::{EngineError, Result};
use crate::probe::Probe;
use crate::timeline::TimelineSettings;

/// Opaque identifier for media files.
pub type MediaId = u64;
/// Opaque identifier for tracks.
pub type TrackId = u64;
/// Opaque identifier for clips.
pub type ClipId = u64;

/// Imported media asset referenced by clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: MediaId,
    pub path: String,
    pub duration: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub audio_channels: u8,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

/// Media description before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMediaFile {
    pub path: String,
    pub duration: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub audio_channels: u8,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
}

impl NewMediaFile {
    /// Builds a media description from decode-service metadata.
    pub fn from_probe(path: impl Into<String>, probe: &Probe) -> Self {
        Self {
            path: path.into(),
            duration: probe.duration,
            width: probe.width,
            height: probe.height,
            fps: probe.fps,
            audio_channels: probe.audio_channels,
            thumbnail: None,
            preview: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(EngineError::InvalidMediaDuration {
                path: self.path.clone(),
                duration: self.duration,
            });
        }
        Ok(())
    }

    pub(crate) fn into_media(self, id: MediaId) -> MediaFile {
        MediaFile {
            id,
            path: self.path,
            duration: self.duration,
            width: self.width,
            height: self.height,
            fps: self.fps,
            audio_channels: self.audio_channels,
            thumbnail: self.thumbnail,
            preview: self.preview,
        }
    }
}

/// Lane kind. Video and audio tracks occupy disjoint `order` ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// One timeline lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub enabled: bool,
    pub muted: bool,
    pub volume: u8,
    /// Stacking key: positive for video, negative for audio, higher is drawn
    /// on top.
    pub order: i32,
}

/// Largest accepted track volume.
pub const MAX_TRACK_VOLUME: u8 = 100;

/// A trimmed window of a media file placed on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub media_id: MediaId,
    pub name: String,
    /// Source-time window start, seconds into the media file.
    pub start_time: f64,
    /// Source-time window end (exclusive).
    pub end_time: f64,
    pub track_id: TrackId,
    /// Timeline position of the clip's first frame.
    pub offset: f64,
}

impl Clip {
    /// Timeline length of the clip.
    pub fn span(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Exclusive timeline end.
    pub fn timeline_end(&self) -> f64 {
        self.offset + self.span()
    }

    /// Returns true when `t` lies strictly between the clip's timeline edges.
    pub fn strictly_contains(&self, t: f64) -> bool {
        self.offset < t && t < self.timeline_end()
    }
}

/// Clip description before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewClip {
    pub media_id: MediaId,
    pub track_id: TrackId,
    #[serde(default)]
    pub name: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub offset: f64,
}

/// Canonical project aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub tracks: BTreeMap<TrackId, Track>,
    pub clips: BTreeMap<ClipId, Clip>,
    pub media: BTreeMap<MediaId, MediaFile>,
    pub timeline: TimelineSettings,
}

impl Default for Project {
    fn default() -> Self {
        Self::with_default_tracks()
    }
}

impl Project {
    /// Project without tracks, clips or media.
    pub fn empty() -> Self {
        Self {
            tracks: BTreeMap::new(),
            clips: BTreeMap::new(),
            media: BTreeMap::new(),
            timeline: TimelineSettings::default(),
        }
    }

    /// Project seeded with one video and one audio track.
    pub fn with_default_tracks() -> Self {
        let mut project = Self::empty();
        for (id, name, kind, order) in [
            (1, "Video 1", TrackKind::Video, 1),
            (2, "Audio 1", TrackKind::Audio, -1),
        ] {
            project.tracks.insert(
                id,
                Track {
                    id,
                    name: name.to_string(),
                    kind,
                    enabled: true,
                    muted: false,
                    volume: MAX_TRACK_VOLUME,
                    order,
                },
            );
        }
        project
    }

    /// Order for a new track of `kind` so it stacks outside existing ones.
    pub fn next_track_order(&self, kind: TrackKind) -> i32 {
        let orders = self
            .tracks
            .values()
            .filter(|track| track.kind == kind)
            .map(|track| track.order);
        match kind {
            TrackKind::Video => orders.max().unwrap_or(0).max(0) + 1,
            TrackKind::Audio => orders.min().unwrap_or(0).min(0) - 1,
        }
    }

    /// Tracks from top to bottom.
    pub fn tracks_in_stack_order(&self) -> Vec<&Track> {
        let mut tracks: Vec<&Track> = self.tracks.values().collect();
        tracks.sort_by(|a, b| b.order.cmp(&a.order).then(a.id.cmp(&b.id)));
        tracks
    }

    /// Clips hosted by `track_id`, ordered by timeline offset.
    pub fn clips_on_track(&self, track_id: TrackId) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self
            .clips
            .values()
            .filter(|clip| clip.track_id == track_id)
            .collect();
        clips.sort_by(|a, b| a.offset.total_cmp(&b.offset).then(a.id.cmp(&b.id)));
        clips
    }

    /// Timeline end of the last clip on `track_id`, or 0 for an empty track.
    pub fn track_end(&self, track_id: TrackId) -> f64 {
        self.clips
            .values()
            .filter(|clip| clip.track_id == track_id)
            .map(Clip::timeline_end)
            .fold(0.0, f64::max)
    }

    /// Timeline end of the furthest clip across all tracks.
    pub fn duration(&self) -> f64 {
        self.clips.values().map(Clip::timeline_end).fold(0.0, f64::max)
    }

    pub fn clips_using_media(&self, media_id: MediaId) -> Vec<ClipId> {
        self.clips
            .values()
            .filter(|clip| clip.media_id == media_id)
            .map(|clip| clip.id)
            .collect()
    }

    pub fn clips_on_track_ids(&self, track_id: TrackId) -> Vec<ClipId> {
        self.clips
            .values()
            .filter(|clip| clip.track_id == track_id)
            .map(|clip| clip.id)
            .collect()
    }

    pub(crate) fn media_by_id(&self, media_id: MediaId) -> Result<&MediaFile> {
        self.media
            .get(&media_id)
            .ok_or(EngineError::MediaNotFound { media_id })
    }

    pub(crate) fn clip_by_id(&self, clip_id: ClipId) -> Result<&Clip> {
        self.clips
            .get(&clip_id)
            .ok_or(EngineError::ClipNotFound { clip_id })
    }

    pub(crate) fn ensure_track(&self, track_id: TrackId) -> Result<()> {
        if self.tracks.contains_key(&track_id) {
            Ok(())
        } else {
            Err(EngineError::TrackNotFound { track_id })
        }
    }

    /// Checks every clip invariant against the current media and tracks.
    ///
    /// The source window must satisfy `0 <= start < end <= media.duration`
    /// and the offset must be a non-negative finite number.
    pub fn validate_clip(&self, clip: &Clip) -> Result<()> {
        self.ensure_track(clip.track_id)?;
        let media = self.media_by_id(clip.media_id)?;
        validate_window(Some(clip.id), clip.start_time, clip.end_time, media.duration)?;
        if !(clip.offset.is_finite() && clip.offset >= 0.0) {
            return Err(EngineError::InvalidOffset {
                offset: clip.offset,
            });
        }
        Ok(())
    }

    /// Lists dangling references and out-of-bounds clips.
    pub fn integrity_report(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        for clip in self.clips.values() {
            if !self.tracks.contains_key(&clip.track_id) {
                report.missing_tracks.push(DanglingReference {
                    clip_id: clip.id,
                    target_id: clip.track_id,
                });
            }
            match self.media.get(&clip.media_id) {
                None => report.missing_media.push(DanglingReference {
                    clip_id: clip.id,
                    target_id: clip.media_id,
                }),
                Some(media) => {
                    if validate_window(Some(clip.id), clip.start_time, clip.end_time, media.duration)
                        .is_err()
                    {
                        report.out_of_bounds.push(clip.id);
                    }
                }
            }
        }
        report
    }

    /// Creates an immutable snapshot for hosts.
    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            tracks: self
                .tracks_in_stack_order()
                .into_iter()
                .map(|track| TrackSummary {
                    id: track.id,
                    name: track.name.clone(),
                    kind: track.kind,
                    enabled: track.enabled,
                    muted: track.muted,
                    volume: track.volume,
                    order: track.order,
                    clips: self
                        .clips_on_track(track.id)
                        .into_iter()
                        .map(|clip| ClipSummary {
                            id: clip.id,
                            media_id: clip.media_id,
                            name: clip.name.clone(),
                            offset: clip.offset,
                            span: clip.span(),
                            start_time: clip.start_time,
                            end_time: clip.end_time,
                        })
                        .collect(),
                })
                .collect(),
            media: self
                .media
                .values()
                .map(|media| MediaSummary {
                    id: media.id,
                    path: media.path.clone(),
                    duration: media.duration,
                    has_video: media.width > 0 && media.height > 0,
                })
                .collect(),
            duration: self.duration(),
            playhead: self.timeline.playhead,
        }
    }

    pub(crate) fn max_ids(&self) -> (MediaId, TrackId, ClipId) {
        (
            self.media.keys().next_back().copied().unwrap_or(0),
            self.tracks.keys().next_back().copied().unwrap_or(0),
            self.clips.keys().next_back().copied().unwrap_or(0),
        )
    }
}

/// A clip pointing at a track or media file that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub clip_id: ClipId,
    pub target_id: u64,
}

/// Non-fatal consistency findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Clips whose media file is gone; hosts should prompt for relinking.
    pub missing_media: Vec<DanglingReference>,
    pub missing_tracks: Vec<DanglingReference>,
    pub out_of_bounds: Vec<ClipId>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing_media.is_empty() && self.missing_tracks.is_empty() && self.out_of_bounds.is_empty()
    }

    /// Human-readable warning lines.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for dangling in &self.missing_media {
            warnings.push(format!(
                "clip {} references missing media file {}",
                dangling.clip_id, dangling.target_id
            ));
        }
        for dangling in &self.missing_tracks {
            warnings.push(format!(
                "clip {} references missing track {}",
                dangling.clip_id, dangling.target_id
            ));
        }
        for clip_id in &self.out_of_bounds {
            warnings.push(format!(
                "clip {clip_id} source window exceeds its media duration"
            ));
        }
        warnings
    }
}

pub(crate) fn validate_window(
    clip_id: Option<ClipId>,
    start_time: f64,
    end_time: f64,
    media_duration: f64,
) -> Result<()> {
    let valid = start_time.is_finite()
        && end_time.is_finite()
        && start_time >= 0.0
        && start_time < end_time
        && end_time <= media_duration;
    if valid {
        Ok(())
    } else {
        Err(EngineError::InvalidSourceWindow {
            clip_id,
            start_time,
            end_time,
        })
    }
}
