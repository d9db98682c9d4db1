//! Clip-level edits layered on the project store.
//!
//! Every operation validates against a staged copy and commits once, so a
//! rejected edit leaves the store untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::project::{ClipId, MediaId, NewClip, NewMediaFile, TrackId};
use crate::store::{Change, ProjectStore, display_name};
use crate::timeline::append_offset;

/// Media dropped onto a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DropPayload {
    /// A file that is not in the library yet; it is added with the clip.
    MediaFile { media_file: NewMediaFile },
    /// A file already in the library.
    LibraryMedia { media_id: MediaId },
}

impl DropPayload {
    /// Parses and validates a payload coming from a host.
    ///
    /// # Example
    /// ```
    /// use engine::DropPayload;
    ///
    /// let payload = DropPayload::from_json(r#"{"kind":"library-media","media_id":3}"#)
    ///     .expect("valid payload");
    /// assert_eq!(payload, DropPayload::LibraryMedia { media_id: 3 });
    /// assert!(DropPayload::from_json(r#"{"kind":"folder"}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: Self =
            serde_json::from_str(json).map_err(|error| EngineError::InvalidDropPayload {
                reason: error.to_string(),
            })?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::MediaFile { media_file } => {
                if media_file.path.trim().is_empty() {
                    return Err(EngineError::InvalidDropPayload {
                        reason: "media file path is empty".to_string(),
                    });
                }
                media_file.validate()
            }
            Self::LibraryMedia { .. } => Ok(()),
        }
    }
}

/// Where a dropped clip lands on its track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "offset", rename_all = "snake_case")]
pub enum DropPlacement {
    /// After the furthest clip on the track.
    #[default]
    Append,
    /// At a literal timeline position, without collision avoidance.
    At(f64),
}

impl ProjectStore {
    /// Splits a clip at timeline time `at`.
    ///
    /// The left part keeps the clip id, source start and offset. The right
    /// part is a new clip starting where the left one ends, in both source
    /// and timeline terms. Returns `(left, right)`.
    ///
    /// # Example
    /// ```
    /// use engine::{NewClip, NewMediaFile, ProjectStore};
    ///
    /// let mut store = ProjectStore::default();
    /// let media_id = store
    ///     .add_media_file(NewMediaFile {
    ///         path: "talk.mp4".to_string(),
    ///         duration: 10.0,
    ///         width: 1280,
    ///         height: 720,
    ///         fps: 30.0,
    ///         audio_channels: 2,
    ///         thumbnail: None,
    ///         preview: None,
    ///     })
    ///     .expect("media");
    /// let clip_id = store
    ///     .add_clip(NewClip {
    ///         media_id,
    ///         track_id: 1,
    ///         name: None,
    ///         start_time: 0.0,
    ///         end_time: 10.0,
    ///         offset: 0.0,
    ///     })
    ///     .expect("clip");
    ///
    /// let (left, right) = store.split_clip(clip_id, 5.0).expect("split");
    /// let clips = &store.project().clips;
    /// assert_eq!(clips[&left].end_time, 5.0);
    /// assert_eq!(clips[&right].offset, 5.0);
    /// ```
    pub fn split_clip(&mut self, clip_id: ClipId, at: f64) -> Result<(ClipId, ClipId)> {
        let clip = match self.project().clip_by_id(clip_id) {
            Ok(clip) => clip.clone(),
            Err(error) => {
                warn!(clip_id, "split rejected: clip not found");
                return Err(error);
            }
        };
        if !clip.strictly_contains(at) {
            warn!(
                clip_id,
                at,
                offset = clip.offset,
                end = clip.timeline_end(),
                "split rejected: point outside clip"
            );
            return Err(EngineError::SplitPointOutsideClip { clip_id, at });
        }

        let split_source = clip.start_time + (at - clip.offset);
        let mut left = clip.clone();
        left.end_time = split_source;
        let mut right = clip;
        right.id = self.peek_clip_id();
        right.start_time = split_source;
        right.offset = left.timeline_end();

        let mut staged = self.stage();
        for part in [&left, &right] {
            if let Err(error) = staged.validate_clip(part) {
                warn!(clip_id, at, %error, "split rejected: degenerate part");
                return Err(EngineError::SplitPointOutsideClip { clip_id, at });
            }
        }
        let right_id = right.id;
        staged.clips.insert(left.id, left);
        staged.clips.insert(right_id, right);
        debug!(clip_id, right_id, at, "clip split");
        self.commit(
            staged,
            vec![Change::ClipSplit {
                left: clip_id,
                right: right_id,
            }],
        );
        Ok((clip_id, right_id))
    }

    /// Sets both source bounds of a clip.
    ///
    /// Bounds are clamped to `[0, media.duration]`; an empty or inverted
    /// window after clamping is rejected. The timeline offset is unchanged.
    pub fn resize_clip(&mut self, clip_id: ClipId, new_start: f64, new_end: f64) -> Result<()> {
        let mut staged = self.stage();
        let media_duration = self.clip_media_duration(clip_id)?;
        let start_time = new_start.clamp(0.0, media_duration);
        let end_time = new_end.clamp(0.0, media_duration);
        if !(start_time < end_time) {
            warn!(clip_id, new_start, new_end, "resize rejected: empty window");
            return Err(EngineError::InvalidSourceWindow {
                clip_id: Some(clip_id),
                start_time,
                end_time,
            });
        }
        let Some(clip) = staged.clips.get_mut(&clip_id) else {
            return Err(EngineError::ClipNotFound { clip_id });
        };
        clip.start_time = start_time;
        clip.end_time = end_time;
        debug!(clip_id, start_time, end_time, "clip resized");
        self.commit(staged, vec![Change::ClipUpdated { clip_id }]);
        Ok(())
    }

    /// Moves the source start while keeping the clip's right timeline edge.
    ///
    /// The offset shifts by the same delta and stops at 0.
    pub fn trim_clip_start(&mut self, clip_id: ClipId, new_start_time: f64) -> Result<()> {
        let mut staged = self.stage();
        let media_duration = self.clip_media_duration(clip_id)?;
        let Some(clip) = staged.clips.get_mut(&clip_id) else {
            return Err(EngineError::ClipNotFound { clip_id });
        };
        let start_time = new_start_time.clamp(0.0, media_duration);
        if !(start_time < clip.end_time) {
            warn!(clip_id, new_start_time, "trim start rejected: empty window");
            return Err(EngineError::InvalidSourceWindow {
                clip_id: Some(clip_id),
                start_time,
                end_time: clip.end_time,
            });
        }
        let delta = start_time - clip.start_time;
        clip.start_time = start_time;
        clip.offset = (clip.offset + delta).max(0.0);
        debug!(clip_id, start_time, offset = clip.offset, "clip start trimmed");
        self.commit(staged, vec![Change::ClipUpdated { clip_id }]);
        Ok(())
    }

    /// Moves the source end, keeping the offset.
    pub fn trim_clip_end(&mut self, clip_id: ClipId, new_end_time: f64) -> Result<()> {
        let mut staged = self.stage();
        let media_duration = self.clip_media_duration(clip_id)?;
        let Some(clip) = staged.clips.get_mut(&clip_id) else {
            return Err(EngineError::ClipNotFound { clip_id });
        };
        let end_time = new_end_time.clamp(0.0, media_duration);
        if !(clip.start_time < end_time) {
            warn!(clip_id, new_end_time, "trim end rejected: empty window");
            return Err(EngineError::InvalidSourceWindow {
                clip_id: Some(clip_id),
                start_time: clip.start_time,
                end_time,
            });
        }
        clip.end_time = end_time;
        debug!(clip_id, end_time, "clip end trimmed");
        self.commit(staged, vec![Change::ClipUpdated { clip_id }]);
        Ok(())
    }

    /// Places a clip at `offset` (clamped at 0). Overlaps are allowed.
    pub fn move_clip(&mut self, clip_id: ClipId, offset: f64) -> Result<()> {
        self.relocate_clip(clip_id, None, offset)
    }

    /// Same as [`ProjectStore::move_clip`]; entry point for scripted agents.
    pub fn ai_move_clip(&mut self, clip_id: ClipId, offset: f64) -> Result<()> {
        self.move_clip(clip_id, offset)
    }

    /// Moves a clip onto another track at `offset`.
    pub fn move_clip_to_track(
        &mut self,
        clip_id: ClipId,
        track_id: TrackId,
        offset: f64,
    ) -> Result<()> {
        self.relocate_clip(clip_id, Some(track_id), offset)
    }

    /// Creates a clip covering the whole dropped media file.
    pub fn handle_drop_media(
        &mut self,
        track_id: TrackId,
        payload: DropPayload,
        placement: DropPlacement,
    ) -> Result<ClipId> {
        if let Err(error) = payload.validate() {
            warn!(track_id, %error, "drop rejected: invalid payload");
            return Err(error);
        }
        let mut staged = self.stage();
        if let Err(error) = staged.ensure_track(track_id) {
            warn!(track_id, "drop rejected: track not found");
            return Err(error);
        }

        let mut changes = Vec::new();
        let media_id = match payload {
            DropPayload::MediaFile { media_file } => {
                let media_id = self.peek_media_id();
                staged.media.insert(media_id, media_file.into_media(media_id));
                changes.push(Change::MediaAdded { media_id });
                media_id
            }
            DropPayload::LibraryMedia { media_id } => media_id,
        };
        let media = match staged.media_by_id(media_id) {
            Ok(media) => media.clone(),
            Err(error) => {
                warn!(track_id, media_id, "drop rejected: media not found");
                return Err(error);
            }
        };

        let offset = match placement {
            DropPlacement::Append => {
                append_offset(staged.clips.values().filter(|clip| clip.track_id == track_id))
            }
            DropPlacement::At(offset) => offset,
        };
        let clip_id = self.peek_clip_id();
        let clip = self.materialize_clip(
            &staged,
            clip_id,
            NewClip {
                media_id,
                track_id,
                name: Some(display_name(&media.path)),
                start_time: 0.0,
                end_time: media.duration,
                offset,
            },
        )?;
        staged.clips.insert(clip_id, clip);
        changes.push(Change::ClipAdded { clip_id });
        debug!(track_id, media_id, clip_id, offset, ?placement, "media dropped");
        self.commit(staged, changes);
        Ok(clip_id)
    }

    fn relocate_clip(
        &mut self,
        clip_id: ClipId,
        track_id: Option<TrackId>,
        offset: f64,
    ) -> Result<()> {
        if !offset.is_finite() {
            warn!(clip_id, offset, "move rejected: non-finite offset");
            return Err(EngineError::InvalidOffset { offset });
        }
        let mut staged = self.stage();
        if let Some(track_id) = track_id {
            if let Err(error) = staged.ensure_track(track_id) {
                warn!(clip_id, track_id, "move rejected: track not found");
                return Err(error);
            }
        }
        let Some(clip) = staged.clips.get_mut(&clip_id) else {
            warn!(clip_id, "move rejected: clip not found");
            return Err(EngineError::ClipNotFound { clip_id });
        };
        clip.offset = offset.max(0.0);
        if let Some(track_id) = track_id {
            clip.track_id = track_id;
        }
        debug!(clip_id, offset = clip.offset, track_id = clip.track_id, "clip moved");
        self.commit(staged, vec![Change::ClipUpdated { clip_id }]);
        Ok(())
    }

    fn clip_media_duration(&self, clip_id: ClipId) -> Result<f64> {
        let clip = self.project().clip_by_id(clip_id).inspect_err(|_| {
            warn!(clip_id, "edit rejected: clip not found");
        })?;
        let media = self.project().media_by_id(clip.media_id).inspect_err(|_| {
            warn!(clip_id, media_id = clip.media_id, "edit rejected: media not found");
        })?;
        Ok(media.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::{DropPayload, DropPlacement};
    use crate::error::EngineError;
    use crate::project::{NewClip, NewMediaFile};
    use crate::store::ProjectStore;

    const VIDEO_TRACK: u64 = 1;

    fn media(path: &str, duration: f64) -> NewMediaFile {
        NewMediaFile {
            path: path.to_string(),
            duration,
            width: 1920,
            height: 1080,
            fps: 25.0,
            audio_channels: 2,
            thumbnail: None,
            preview: None,
        }
    }

    fn store_with_clip(start: f64, end: f64, offset: f64) -> (ProjectStore, u64) {
        let mut store = ProjectStore::default();
        let media_id = store
            .add_media_file(media("a.mp4", 30.0))
            .expect("media should be added");
        let clip_id = store
            .add_clip(NewClip {
                media_id,
                track_id: VIDEO_TRACK,
                name: None,
                start_time: start,
                end_time: end,
                offset,
            })
            .expect("clip should be added");
        (store, clip_id)
    }

    #[test]
    fn split_at_midpoint_yields_contiguous_halves() {
        let (mut store, clip_id) = store_with_clip(0.0, 10.0, 0.0);
        let (left, right) = store.split_clip(clip_id, 5.0).expect("split should succeed");

        let clips = &store.project().clips;
        let (a, b) = (&clips[&left], &clips[&right]);
        assert_eq!((a.offset, a.start_time, a.end_time), (0.0, 0.0, 5.0));
        assert_eq!((b.offset, b.start_time, b.end_time), (5.0, 5.0, 10.0));
        assert_eq!(left, clip_id);
        assert_eq!(a.media_id, b.media_id);
        assert_eq!(a.track_id, b.track_id);
    }

    #[test]
    fn split_preserves_span_for_offset_clip() {
        let (mut store, clip_id) = store_with_clip(2.5, 12.5, 20.0);
        let (left, right) = store.split_clip(clip_id, 23.75).expect("split should succeed");

        let clips = &store.project().clips;
        let (a, b) = (&clips[&left], &clips[&right]);
        assert_eq!(a.span() + b.span(), 10.0);
        assert_eq!(a.end_time, b.start_time);
        assert_eq!(a.timeline_end(), b.offset);
        assert_eq!(a.start_time, 2.5);
        assert_eq!(b.end_time, 12.5);
    }

    #[test]
    fn split_seams_are_exact_for_fractional_positions() {
        for step in 1..200u32 {
            let start = 0.1 * f64::from(step % 7);
            let offset = 3.3 + 0.7 * f64::from(step % 11);
            let (mut store, clip_id) = store_with_clip(start, start + 17.3, offset);
            let original = store.project().clips[&clip_id].clone();
            let at = offset + 17.3 * f64::from(step) / 200.0;

            let (left, right) = store.split_clip(clip_id, at).expect("split should succeed");

            let clips = &store.project().clips;
            let (a, b) = (&clips[&left], &clips[&right]);
            assert_eq!(a.end_time, b.start_time);
            assert_eq!(a.timeline_end(), b.offset);
            assert_eq!(a.offset, original.offset);
            assert_eq!(b.end_time, original.end_time);
            // Source spans are differences of rounded values, so their sum may
            // differ from the original span by a few ulps.
            let drift = (a.span() + b.span() - original.span()).abs();
            assert!(drift <= 4.0 * f64::EPSILON * original.end_time.max(1.0));
        }
    }

    #[test]
    fn rejected_edits_do_not_consume_ids() {
        let (mut store, clip_id) = store_with_clip(0.0, 10.0, 0.0);
        assert!(store.split_clip(clip_id, 10.0).is_err());
        assert!(
            store
                .handle_drop_media(
                    VIDEO_TRACK,
                    DropPayload::MediaFile {
                        media_file: media("d.mp4", 3.0),
                    },
                    DropPlacement::At(-2.0),
                )
                .is_err()
        );

        let (_, right) = store.split_clip(clip_id, 4.0).expect("split should succeed");
        assert_eq!(right, clip_id + 1);
        let media_id = store
            .add_media_file(media("e.mp4", 5.0))
            .expect("media should be added");
        assert_eq!(media_id, 2);
    }

    #[test]
    fn split_outside_or_on_edge_changes_nothing() {
        let (mut store, clip_id) = store_with_clip(0.0, 10.0, 0.0);
        let before = store.project().clone();

        for at in [0.0, 10.0, 12.0, -1.0] {
            assert!(matches!(
                store.split_clip(clip_id, at),
                Err(EngineError::SplitPointOutsideClip { .. })
            ));
        }
        assert_eq!(store.project(), &before);
    }

    #[test]
    fn split_unknown_clip_returns_not_found() {
        let mut store = ProjectStore::default();
        assert!(matches!(
            store.split_clip(9, 1.0),
            Err(EngineError::ClipNotFound { clip_id: 9 })
        ));
    }

    #[test]
    fn resize_clamps_into_media_duration() {
        let (mut store, clip_id) = store_with_clip(2.0, 8.0, 4.0);
        store
            .resize_clip(clip_id, -3.0, 45.0)
            .expect("resize should succeed");

        let clip = &store.project().clips[&clip_id];
        assert_eq!((clip.start_time, clip.end_time), (0.0, 30.0));
        assert_eq!(clip.offset, 4.0);
    }

    #[test]
    fn resize_rejects_inverted_window() {
        let (mut store, clip_id) = store_with_clip(2.0, 8.0, 0.0);
        let before = store.project().clone();

        assert!(matches!(
            store.resize_clip(clip_id, 6.0, 6.0),
            Err(EngineError::InvalidSourceWindow { .. })
        ));
        assert!(store.resize_clip(clip_id, 40.0, 50.0).is_err());
        assert_eq!(store.project(), &before);
    }

    #[test]
    fn trim_start_keeps_right_edge_fixed() {
        let (mut store, clip_id) = store_with_clip(2.0, 8.0, 10.0);
        let right_edge = store.project().clips[&clip_id].timeline_end();

        store
            .trim_clip_start(clip_id, 4.0)
            .expect("trim should succeed");

        let clip = &store.project().clips[&clip_id];
        assert_eq!(clip.start_time, 4.0);
        assert_eq!(clip.offset, 12.0);
        assert_eq!(clip.timeline_end(), right_edge);
    }

    #[test]
    fn trim_start_never_moves_offset_below_zero() {
        let (mut store, clip_id) = store_with_clip(4.0, 8.0, 1.0);
        store
            .trim_clip_start(clip_id, 0.0)
            .expect("trim should succeed");
        assert_eq!(store.project().clips[&clip_id].offset, 0.0);
    }

    #[test]
    fn trim_end_keeps_offset_and_rejects_collapse() {
        let (mut store, clip_id) = store_with_clip(2.0, 8.0, 3.0);
        store.trim_clip_end(clip_id, 5.0).expect("trim should succeed");
        let clip = &store.project().clips[&clip_id];
        assert_eq!((clip.end_time, clip.offset), (5.0, 3.0));

        assert!(store.trim_clip_end(clip_id, 1.0).is_err());
    }

    #[test]
    fn move_clip_clamps_negative_offset_and_allows_overlap() {
        let (mut store, first) = store_with_clip(0.0, 5.0, 0.0);
        let second = store
            .add_clip(NewClip {
                media_id: 1,
                track_id: VIDEO_TRACK,
                name: None,
                start_time: 0.0,
                end_time: 5.0,
                offset: 10.0,
            })
            .expect("clip should be added");

        store.ai_move_clip(second, 2.0).expect("move should succeed");
        store.move_clip(first, -4.0).expect("move should succeed");

        assert_eq!(store.project().clips[&second].offset, 2.0);
        assert_eq!(store.project().clips[&first].offset, 0.0);
    }

    #[test]
    fn move_clip_to_unknown_track_is_rejected() {
        let (mut store, clip_id) = store_with_clip(0.0, 5.0, 0.0);
        assert!(matches!(
            store.move_clip_to_track(clip_id, 40, 1.0),
            Err(EngineError::TrackNotFound { track_id: 40 })
        ));
        assert!(matches!(
            store.move_clip(clip_id, f64::NAN),
            Err(EngineError::InvalidOffset { .. })
        ));
    }

    #[test]
    fn drop_appends_after_furthest_clip() {
        let mut store = ProjectStore::default();
        let media_id = store
            .add_media_file(media("b.mov", 10.0))
            .expect("media should be added");
        for (offset, end) in [(0.0, 5.0), (8.0, 7.0)] {
            store
                .add_clip(NewClip {
                    media_id,
                    track_id: VIDEO_TRACK,
                    name: None,
                    start_time: 0.0,
                    end_time: end,
                    offset,
                })
                .expect("clip should be added");
        }

        let clip_id = store
            .handle_drop_media(
                VIDEO_TRACK,
                DropPayload::LibraryMedia { media_id },
                DropPlacement::Append,
            )
            .expect("drop should succeed");

        let clip = &store.project().clips[&clip_id];
        assert_eq!(clip.offset, 15.0);
        assert_eq!((clip.start_time, clip.end_time), (0.0, 10.0));
    }

    #[test]
    fn drop_on_empty_track_lands_at_zero_and_adds_media() {
        let mut store = ProjectStore::default();
        let clip_id = store
            .handle_drop_media(
                2,
                DropPayload::MediaFile {
                    media_file: media("/music/bed.wav", 42.0),
                },
                DropPlacement::Append,
            )
            .expect("drop should succeed");

        let clip = &store.project().clips[&clip_id];
        assert_eq!(clip.offset, 0.0);
        assert_eq!(clip.name, "bed");
        assert_eq!(store.project().media.len(), 1);
    }

    #[test]
    fn drop_with_explicit_placement_uses_literal_offset() {
        let mut store = ProjectStore::default();
        let clip_id = store
            .handle_drop_media(
                VIDEO_TRACK,
                DropPayload::MediaFile {
                    media_file: media("c.mp4", 3.0),
                },
                DropPlacement::At(7.5),
            )
            .expect("drop should succeed");
        assert_eq!(store.project().clips[&clip_id].offset, 7.5);
    }

    #[test]
    fn rejected_drop_does_not_add_media() {
        let mut store = ProjectStore::default();
        let result = store.handle_drop_media(
            VIDEO_TRACK,
            DropPayload::MediaFile {
                media_file: media("c.mp4", 3.0),
            },
            DropPlacement::At(-1.0),
        );

        assert!(matches!(result, Err(EngineError::InvalidOffset { .. })));
        assert!(store.project().media.is_empty());
        assert!(store.project().clips.is_empty());
    }

    #[test]
    fn drop_payload_from_json_validates_at_boundary() {
        let payload = DropPayload::from_json(
            r#"{"kind":"media-file","media_file":{"path":"x.mp4","duration":4.0}}"#,
        )
        .expect("payload should parse");
        assert!(matches!(payload, DropPayload::MediaFile { .. }));

        let zero = DropPayload::from_json(
            r#"{"kind":"media-file","media_file":{"path":"x.mp4","duration":0.0}}"#,
        );
        assert!(matches!(
            zero,
            Err(EngineError::InvalidMediaDuration { .. })
        ));
        assert!(matches!(
            DropPayload::from_json("[1, 2]"),
            Err(EngineError::InvalidDropPayload { .. })
        ));
    }
}
