use serde::{Deserialize, Serialize};

use crate::project::{Clip, ClipId, Project, TrackId};

/// Timeline-level view settings stored with the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSettings {
    /// Horizontal zoom in pixels per second.
    pub zoom: f64,
    /// Playhead position in timeline seconds.
    pub playhead: f64,
    pub fps: f64,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            zoom: 50.0,
            playhead: 0.0,
            fps: 30.0,
        }
    }
}

/// Partial update for [`TimelineSettings`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelinePatch {
    #[serde(default)]
    pub zoom: Option<f64>,
    #[serde(default)]
    pub playhead: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
}

impl TimelinePatch {
    pub fn is_empty(&self) -> bool {
        self.zoom.is_none() && self.playhead.is_none() && self.fps.is_none()
    }

    /// Applies the patch over `settings`, returning the merged value.
    ///
    /// Returns `None` when a field is not a positive finite number (or, for
    /// the playhead, a non-negative one).
    pub(crate) fn merged_over(&self, settings: &TimelineSettings) -> Option<TimelineSettings> {
        let positive = |value: f64| value.is_finite() && value > 0.0;
        let merged = TimelineSettings {
            zoom: self.zoom.unwrap_or(settings.zoom),
            playhead: self.playhead.unwrap_or(settings.playhead),
            fps: self.fps.unwrap_or(settings.fps),
        };
        let valid = positive(merged.zoom)
            && positive(merged.fps)
            && merged.playhead.is_finite()
            && merged.playhead >= 0.0;
        valid.then_some(merged)
    }
}

/// Clamps a playhead position into `[0, duration]`.
pub fn normalize_playhead(t: f64, duration: f64) -> f64 {
    if !(duration > 0.0) || !t.is_finite() {
        return 0.0;
    }
    t.clamp(0.0, duration)
}

/// Finds the clip on `track_id` whose timeline span contains `t`.
///
/// Later clips win when overlapping clips cover `t`, matching the draw order
/// of a track.
pub fn find_clip_at(project: &Project, track_id: TrackId, t: f64) -> Option<ClipId> {
    project
        .clips_on_track(track_id)
        .into_iter()
        .rev()
        .find(|clip| clip.offset <= t && t < clip.timeline_end())
        .map(|clip| clip.id)
}

/// Offset that appends a clip after every clip in `clips`.
pub fn append_offset<'a>(clips: impl IntoIterator<Item = &'a Clip>) -> f64 {
    clips
        .into_iter()
        .map(Clip::timeline_end)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::{TimelinePatch, TimelineSettings, append_offset, find_clip_at, normalize_playhead};
    use crate::project::{Clip, Project};

    fn clip(id: u64, offset: f64, span: f64) -> Clip {
        Clip {
            id,
            media_id: 1,
            name: format!("clip {id}"),
            start_time: 0.0,
            end_time: span,
            track_id: 1,
            offset,
        }
    }

    #[test]
    fn append_offset_is_zero_for_empty_track() {
        assert_eq!(append_offset(&[] as &[Clip]), 0.0);
    }

    #[test]
    fn append_offset_uses_furthest_clip_end_not_last_inserted() {
        let clips = [clip(1, 10.0, 5.0), clip(2, 0.0, 3.0)];
        assert_eq!(append_offset(&clips), 15.0);
    }

    #[test]
    fn find_clip_at_treats_clip_end_as_exclusive() {
        let mut project = Project::with_default_tracks();
        project.clips.insert(1, clip(1, 0.0, 4.0));
        project.clips.insert(2, clip(2, 4.0, 4.0));

        assert_eq!(find_clip_at(&project, 1, 0.0), Some(1));
        assert_eq!(find_clip_at(&project, 1, 4.0), Some(2));
        assert_eq!(find_clip_at(&project, 1, 8.0), None);
        assert_eq!(find_clip_at(&project, 2, 1.0), None);
    }

    #[test]
    fn timeline_patch_rejects_non_positive_zoom() {
        let settings = TimelineSettings::default();
        let patch = TimelinePatch {
            zoom: Some(0.0),
            ..TimelinePatch::default()
        };
        assert!(patch.merged_over(&settings).is_none());

        let patch = TimelinePatch {
            playhead: Some(3.5),
            ..TimelinePatch::default()
        };
        let merged = patch.merged_over(&settings).expect("valid patch");
        assert_eq!(merged.playhead, 3.5);
        assert_eq!(merged.zoom, settings.zoom);
    }

    #[test]
    fn normalize_playhead_clamps_into_duration() {
        assert_eq!(normalize_playhead(-1.0, 10.0), 0.0);
        assert_eq!(normalize_playhead(12.0, 10.0), 10.0);
        assert_eq!(normalize_playhead(4.0, 0.0), 0.0);
    }
}
