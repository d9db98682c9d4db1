use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::project::{MediaId, Project};
use crate::range::Range;

/// Gap below which neighbouring cuts are fused before export.
pub const MERGE_TOLERANCE_SECONDS: f64 = 0.005;

/// Hand-off to the external encoder: which parts of one media file to keep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPlan {
    pub media_id: MediaId,
    pub input: String,
    pub duration: f64,
    /// Normalized cuts, sorted and disjoint.
    pub cuts: Vec<Range>,
    /// Complement of `cuts` over `[0, duration]`, in playback order.
    pub kept: Vec<Range>,
}

impl ExportPlan {
    /// Length of the rendered output.
    pub fn output_duration(&self) -> f64 {
        self.kept.iter().map(Range::duration).sum()
    }
}

/// Builds the export plan for `media_id` with the accepted `cuts`.
pub fn build_export_plan(
    project: &Project,
    media_id: MediaId,
    cuts: &[Range],
    config: &EngineConfig,
) -> Result<ExportPlan> {
    let media = project.media_by_id(media_id).inspect_err(|_| {
        warn!(media_id, "export rejected: media not found");
    })?;

    let cuts = normalize_cuts(cuts, media.duration, config.min_cut_seconds);
    let kept = kept_segments(&cuts, media.duration);
    if kept.is_empty() {
        warn!(media_id, cut_count = cuts.len(), "export rejected: nothing left");
        return Err(EngineError::NothingToKeep { media_id });
    }

    debug!(
        media_id,
        cut_count = cuts.len(),
        kept_count = kept.len(),
        "export plan built"
    );
    Ok(ExportPlan {
        media_id,
        input: media.path.clone(),
        duration: media.duration,
        cuts,
        kept,
    })
}

/// Clamps cuts into `[0, duration]`, drops ones not longer than
/// `min_seconds`, and fuses cuts closer than [`MERGE_TOLERANCE_SECONDS`].
pub fn normalize_cuts(cuts: &[Range], duration: f64, min_seconds: f64) -> Vec<Range> {
    if !(duration > 0.0) {
        return Vec::new();
    }
    let mut clamped: Vec<Range> = cuts
        .iter()
        .map(|cut| Range {
            start: cut.start.min(cut.end).max(0.0),
            end: cut.start.max(cut.end).min(duration),
        })
        .filter(|cut| cut.end > cut.start + min_seconds)
        .collect();
    clamped.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<Range> = Vec::with_capacity(clamped.len());
    for cut in clamped {
        match merged.last_mut() {
            Some(last) if cut.start <= last.end + MERGE_TOLERANCE_SECONDS => {
                last.end = last.end.max(cut.end);
            }
            _ => merged.push(cut),
        }
    }
    merged
}

/// Complement of normalized `cuts` over `[0, duration]`.
pub fn kept_segments(cuts: &[Range], duration: f64) -> Vec<Range> {
    if !(duration > 0.0) {
        return Vec::new();
    }
    let mut kept = Vec::with_capacity(cuts.len() + 1);
    let mut cursor = 0.0;
    for cut in cuts {
        if cut.start > cursor {
            kept.push(Range {
                start: cursor,
                end: cut.start,
            });
        }
        cursor = cut.end;
    }
    if cursor < duration {
        kept.push(Range {
            start: cursor,
            end: duration,
        });
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::{build_export_plan, kept_segments, normalize_cuts};
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::project::{MediaFile, Project};
    use crate::range::Range;

    fn r(start: f64, end: f64) -> Range {
        Range { start, end }
    }

    fn project_with_media(duration: f64) -> Project {
        let mut project = Project::with_default_tracks();
        project.media.insert(
            1,
            MediaFile {
                id: 1,
                path: "/footage/take.mp4".to_string(),
                duration,
                width: 1920,
                height: 1080,
                fps: 30.0,
                audio_channels: 2,
                thumbnail: None,
                preview: None,
            },
        );
        project
    }

    #[test]
    fn normalize_cuts_clamps_swaps_and_fuses_near_neighbours() {
        let cuts = [r(9.0, 12.0), r(3.0, 1.0), r(-2.0, 0.5), r(3.003, 4.0), r(6.0, 6.0005)];
        let normalized = normalize_cuts(&cuts, 10.0, 0.001);

        assert_eq!(normalized, vec![r(0.0, 0.5), r(1.0, 4.0), r(9.0, 10.0)]);
    }

    #[test]
    fn kept_segments_cover_the_complement() {
        let kept = kept_segments(&[r(0.0, 0.5), r(1.0, 4.0), r(9.0, 10.0)], 10.0);
        assert_eq!(kept, vec![r(0.5, 1.0), r(4.0, 9.0)]);
        assert_eq!(kept_segments(&[], 5.0), vec![r(0.0, 5.0)]);
    }

    #[test]
    fn plan_total_equals_duration_minus_cuts() {
        let project = project_with_media(20.0);
        let plan = build_export_plan(
            &project,
            1,
            &[r(2.0, 4.0), r(10.0, 15.0)],
            &EngineConfig::default(),
        )
        .expect("plan should build");

        assert_eq!(plan.input, "/footage/take.mp4");
        assert!((plan.output_duration() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn plan_that_removes_everything_is_rejected() {
        let project = project_with_media(5.0);
        let result = build_export_plan(&project, 1, &[r(0.0, 8.0)], &EngineConfig::default());
        assert!(matches!(
            result,
            Err(EngineError::NothingToKeep { media_id: 1 })
        ));
    }

    #[test]
    fn plan_for_unknown_media_is_not_found() {
        let project = project_with_media(5.0);
        let result = build_export_plan(&project, 9, &[], &EngineConfig::default());
        assert!(matches!(
            result,
            Err(EngineError::MediaNotFound { media_id: 9 })
        ));
    }
}
