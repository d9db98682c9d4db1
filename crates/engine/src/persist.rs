//! Flat JSON project document.
//!
//! ```json
//! {
//!   "tracks_map": { "1": { ... } },
//!   "clips_map": { "7": { ... } },
//!   "media_map": { "3": { ... } },
//!   "timeline": { "zoom": 50.0, "playhead": 0.0, "fps": 30.0 },
//!   "history": [[], [{ "start": 1.0, "end": 2.0 }]],
//!   "history_index": 1
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::history::History;
use crate::project::{
    Clip, ClipId, DanglingReference, IntegrityReport, MediaFile, MediaId, Project, Track, TrackId,
    TrackKind,
};
use crate::range::{Range, merge_ranges, valid_ranges};
use crate::timeline::TimelineSettings;

#[derive(Debug, Serialize, Deserialize)]
struct ProjectDocument {
    tracks_map: BTreeMap<TrackId, Track>,
    clips_map: BTreeMap<ClipId, Clip>,
    #[serde(default)]
    media_map: BTreeMap<MediaId, MediaFile>,
    #[serde(default)]
    timeline: TimelineSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history: Option<Vec<Vec<Range>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history_index: Option<usize>,
}

/// Project aggregate plus cut history read from a document.
#[derive(Debug)]
pub(crate) struct Decoded {
    pub project: Project,
    pub cut_history: History<Vec<Range>>,
    /// Fixes applied to the cut history, reported as import warnings.
    pub repairs: Vec<String>,
}

/// Non-fatal findings from an import.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// Clips whose media file is missing; hosts should offer relinking.
    pub missing_media: Vec<DanglingReference>,
    pub missing_tracks: Vec<DanglingReference>,
    pub out_of_bounds: Vec<ClipId>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub(crate) fn from_integrity(report: &IntegrityReport) -> Self {
        Self {
            missing_media: report.missing_media.clone(),
            missing_tracks: report.missing_tracks.clone(),
            out_of_bounds: report.out_of_bounds.clone(),
            warnings: report.warnings(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub(crate) fn encode(
    project: &Project,
    cut_history: &History<Vec<Range>>,
    path: Option<&Path>,
) -> Result<String> {
    let document = ProjectDocument {
        tracks_map: project.tracks.clone(),
        clips_map: project.clips.clone(),
        media_map: project.media.clone(),
        timeline: project.timeline.clone(),
        history: Some(cut_history.entries().to_vec()),
        history_index: Some(cut_history.index()),
    };
    serde_json::to_string_pretty(&document).map_err(|source| EngineError::ProjectSerialization {
        path: path.map(Path::to_path_buf),
        source,
    })
}

pub(crate) fn decode(json: &str, path: Option<&Path>) -> Result<Decoded> {
    let document: ProjectDocument =
        serde_json::from_str(json).map_err(|source| EngineError::ProjectSerialization {
            path: path.map(Path::to_path_buf),
            source,
        })?;

    check_keys("tracks_map", &document.tracks_map, |track| track.id)?;
    check_keys("clips_map", &document.clips_map, |clip| clip.id)?;
    check_keys("media_map", &document.media_map, |media| media.id)?;
    for track in document.tracks_map.values() {
        let in_range = match track.kind {
            TrackKind::Video => track.order > 0,
            TrackKind::Audio => track.order < 0,
        };
        if !in_range {
            return Err(EngineError::InvalidProjectFile {
                reason: format!(
                    "track {} has order {} outside its kind's range",
                    track.id, track.order
                ),
            });
        }
    }

    let mut repairs = Vec::new();
    let cut_history = match document.history {
        Some(entries) => {
            repair_cut_history(entries, document.history_index.unwrap_or(0), &mut repairs)?
        }
        None => History::new(Vec::new()),
    };

    Ok(Decoded {
        project: Project {
            tracks: document.tracks_map,
            clips: document.clips_map,
            media: document.media_map,
            timeline: document.timeline,
        },
        cut_history,
        repairs,
    })
}

/// Drops invalid ranges, merge-normalizes every entry and makes sure entry 0
/// is the empty cut list.
fn repair_cut_history(
    entries: Vec<Vec<Range>>,
    index: usize,
    repairs: &mut Vec<String>,
) -> Result<History<Vec<Range>>> {
    let mut dropped = 0;
    let mut normalized: Vec<Vec<Range>> = entries
        .into_iter()
        .map(|entry| {
            let count = entry.len();
            let valid = valid_ranges(entry);
            dropped += count - valid.len();
            merge_ranges(&valid)
        })
        .collect();
    if dropped > 0 {
        repairs.push(format!(
            "dropped {dropped} empty or inverted range(s) from the cut history"
        ));
    }

    let mut index = index;
    if normalized.first().is_some_and(|initial| !initial.is_empty()) {
        normalized.insert(0, Vec::new());
        index += 1;
        repairs.push(
            "cut history did not start from an empty cut list; one was inserted".to_string(),
        );
    }

    History::from_entries(normalized, index).ok_or_else(|| EngineError::InvalidProjectFile {
        reason: "history must contain at least one entry".to_string(),
    })
}

fn check_keys<T>(
    section: &str,
    map: &BTreeMap<u64, T>,
    id_of: impl Fn(&T) -> u64,
) -> Result<()> {
    match map.iter().find(|(key, value)| **key != id_of(value)) {
        Some((key, value)) => Err(EngineError::InvalidProjectFile {
            reason: format!("{section} key {key} does not match id {}", id_of(value)),
        }),
        None => Ok(()),
    }
}
