//! Pure functions over timeline ranges: merging, silence detection and
//! silence tightening.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::probe::Probe;

/// Peak amplitude (normalized to `[0, 1]`) below which a sample counts as
/// silent.
pub const SILENCE_THRESHOLD: f32 = 0.02;

/// Audible padding kept around a tightened silence when a command omits it.
pub const DEFAULT_LEAVE_MS: f64 = 150.0;

/// Half-open `[start, end)` interval in timeline seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: f64,
    pub end: f64,
}

impl Range {
    /// Creates a range, returning `None` unless `start < end` and both bounds
    /// are finite.
    ///
    /// # Example
    /// ```
    /// use engine::Range;
    ///
    /// assert!(Range::new(1.0, 2.5).is_some());
    /// assert!(Range::new(2.0, 2.0).is_none());
    /// ```
    pub fn new(start: f64, end: f64) -> Option<Self> {
        (start.is_finite() && end.is_finite() && start < end).then_some(Self { start, end })
    }

    /// Creates a range from two endpoints given in any order.
    pub fn spanning(a: f64, b: f64) -> Option<Self> {
        Self::new(a.min(b), a.max(b))
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Returns true when `other` overlaps or touches this range.
    pub fn touches(&self, other: &Range) -> bool {
        other.start <= self.end && self.start <= other.end
    }
}

/// Keeps the ranges with finite bounds and `start < end`, logging the others.
pub(crate) fn valid_ranges(ranges: impl IntoIterator<Item = Range>) -> Vec<Range> {
    ranges
        .into_iter()
        .filter(|range| {
            let valid = Range::new(range.start, range.end).is_some();
            if !valid {
                warn!(?range, "cut range dropped: empty or inverted");
            }
            valid
        })
        .collect()
}

/// Returns the minimal sorted, non-overlapping, non-touching cover of `ranges`.
///
/// Touching ranges (`a.end == b.start`) are fused.
///
/// # Example
/// ```
/// use engine::{Range, merge_ranges};
///
/// let merged = merge_ranges(&[
///     Range { start: 0.0, end: 2.0 },
///     Range { start: 1.0, end: 3.0 },
///     Range { start: 5.0, end: 6.0 },
/// ]);
/// assert_eq!(
///     merged,
///     vec![Range { start: 0.0, end: 3.0 }, Range { start: 5.0, end: 6.0 }]
/// );
/// ```
pub fn merge_ranges(ranges: &[Range]) -> Vec<Range> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<Range> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(current) if range.start <= current.end => {
                current.end = current.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Detects runs of quiet samples lasting at least `min_duration` seconds.
///
/// `peaks` holds one amplitude per sample, uniformly spread over
/// `probe.duration`. Sample `i` covers `[i * dt, (i + 1) * dt)`.
pub fn detect_silences(probe: &Probe, peaks: &[f32], min_duration: f64) -> Vec<Range> {
    detect_silences_with_threshold(probe, peaks, min_duration, SILENCE_THRESHOLD)
}

/// Same as [`detect_silences`] with an explicit amplitude threshold.
pub fn detect_silences_with_threshold(
    probe: &Probe,
    peaks: &[f32],
    min_duration: f64,
    threshold: f32,
) -> Vec<Range> {
    if peaks.is_empty() || !(probe.duration > 0.0) {
        return Vec::new();
    }

    let sample_seconds = probe.duration / peaks.len() as f64;
    let time_at = |index: usize| {
        if index == peaks.len() {
            probe.duration
        } else {
            index as f64 * sample_seconds
        }
    };

    let mut silences = Vec::new();
    let mut run_start: Option<usize> = None;
    for index in 0..=peaks.len() {
        let quiet = peaks.get(index).is_some_and(|peak| peak.abs() < threshold);
        match (quiet, run_start) {
            (true, None) => run_start = Some(index),
            (false, Some(first)) => {
                run_start = None;
                let (start, end) = (time_at(first), time_at(index));
                if end - start >= min_duration {
                    silences.push(Range { start, end });
                }
            }
            _ => {}
        }
    }

    debug!(
        duration = probe.duration,
        samples = peaks.len(),
        min_duration,
        threshold,
        silence_count = silences.len(),
        "silences detected"
    );
    silences
}

/// Detects silences and shrinks each one by `leave_ms` at both ends.
///
/// Ranges that collapse to zero or negative length are dropped.
pub fn tighten_silences(
    probe: &Probe,
    peaks: &[f32],
    min_duration: f64,
    leave_ms: f64,
) -> Vec<Range> {
    tighten_ranges(&detect_silences(probe, peaks, min_duration), leave_ms)
}

/// Shrinks every range by `leave_ms` on both sides, dropping collapsed ones.
pub fn tighten_ranges(ranges: &[Range], leave_ms: f64) -> Vec<Range> {
    let pad = leave_ms.max(0.0) / 1000.0;
    ranges
        .iter()
        .filter_map(|range| Range::new(range.start + pad, range.end - pad))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        Range, detect_silences, detect_silences_with_threshold, merge_ranges, tighten_silences,
    };
    use crate::probe::Probe;

    fn r(start: f64, end: f64) -> Range {
        Range { start, end }
    }

    #[test]
    fn merge_ranges_fuses_overlapping_pairs() {
        let merged = merge_ranges(&[r(0.0, 2.0), r(1.0, 3.0), r(5.0, 6.0)]);
        assert_eq!(merged, vec![r(0.0, 3.0), r(5.0, 6.0)]);
    }

    #[test]
    fn merge_ranges_fuses_touching_ranges() {
        let merged = merge_ranges(&[r(2.0, 4.0), r(0.0, 2.0)]);
        assert_eq!(merged, vec![r(0.0, 4.0)]);
    }

    #[test]
    fn merge_ranges_keeps_contained_range_inside_outer() {
        let merged = merge_ranges(&[r(0.0, 10.0), r(2.0, 3.0), r(11.0, 12.0)]);
        assert_eq!(merged, vec![r(0.0, 10.0), r(11.0, 12.0)]);
    }

    #[test]
    fn merge_ranges_is_idempotent_and_sorted() {
        let input = [
            r(7.5, 9.0),
            r(0.25, 1.0),
            r(3.0, 4.0),
            r(0.5, 2.0),
            r(8.0, 8.5),
            r(4.0, 4.25),
        ];
        let once = merge_ranges(&input);
        let twice = merge_ranges(&once);

        assert_eq!(once, twice);
        assert_eq!(once, vec![r(0.25, 2.0), r(3.0, 4.25), r(7.5, 9.0)]);
        for pair in once.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
    }

    #[test]
    fn merge_ranges_preserves_union_membership() {
        let input = [r(1.0, 2.0), r(1.5, 3.0), r(6.0, 7.0), r(3.5, 4.0)];
        let merged = merge_ranges(&input);

        for step in 0..80 {
            let t = step as f64 * 0.1 + 0.05;
            let in_input = input.iter().any(|range| range.start <= t && t < range.end);
            let in_merged = merged.iter().any(|range| range.start <= t && t < range.end);
            assert_eq!(in_input, in_merged, "membership differs at {t}");
        }
    }

    #[test]
    fn merge_ranges_of_empty_input_is_empty() {
        assert!(merge_ranges(&[]).is_empty());
    }

    #[test]
    fn detect_silences_finds_leading_and_trailing_runs() {
        let probe = Probe::with_duration(8.0);
        let peaks = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];

        let silences = detect_silences(&probe, &peaks, 2.0);
        assert_eq!(silences, vec![r(0.0, 3.0), r(5.0, 8.0)]);
    }

    #[test]
    fn detect_silences_skips_runs_shorter_than_minimum() {
        let probe = Probe::with_duration(8.0);
        let peaks = [0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

        let silences = detect_silences(&probe, &peaks, 3.0);
        assert_eq!(silences, vec![r(5.0, 8.0)]);
    }

    #[test]
    fn detect_silences_returns_quiet_disjoint_sorted_ranges() {
        let probe = Probe::with_duration(4.0);
        let peaks = [
            0.0, 0.01, 0.5, 0.0, 0.0, 0.0, 0.9, 0.0, 0.0, 0.0, 0.0, 0.3, 0.0, 0.0, 0.0, 0.0,
        ];
        let silences = detect_silences(&probe, &peaks, 0.5);

        assert_eq!(
            silences,
            vec![r(0.0, 0.5), r(0.75, 1.5), r(1.75, 2.75), r(3.0, 4.0)]
        );
        for pair in silences.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        for range in &silences {
            assert!(range.duration() >= 0.5);
            let first = (range.start / 0.25).round() as usize;
            let last = (range.end / 0.25).round() as usize;
            assert!(peaks[first..last].iter().all(|peak| *peak < 0.02));
        }
    }

    #[test]
    fn detect_silences_without_samples_or_duration_is_empty() {
        assert!(detect_silences(&Probe::with_duration(8.0), &[], 0.0).is_empty());
        assert!(detect_silences(&Probe::with_duration(0.0), &[0.0, 0.0], 0.0).is_empty());
    }

    #[test]
    fn detect_silences_honors_custom_threshold() {
        let probe = Probe::with_duration(4.0);
        let peaks = [0.1, 0.1, 0.5, 0.5];

        assert!(detect_silences(&probe, &peaks, 1.0).is_empty());
        assert_eq!(
            detect_silences_with_threshold(&probe, &peaks, 1.0, 0.2),
            vec![r(0.0, 2.0)]
        );
    }

    #[test]
    fn tighten_silences_trims_leave_padding_from_both_sides() {
        let probe = Probe::with_duration(8.0);
        let peaks = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];

        let tightened = tighten_silences(&probe, &peaks, 2.0, 150.0);
        let detected = detect_silences(&probe, &peaks, 2.0);

        assert_eq!(tightened.len(), detected.len());
        for (tight, loose) in tightened.iter().zip(&detected) {
            assert!((tight.start - (loose.start + 0.15)).abs() < 1e-9);
            assert!((tight.end - (loose.end - 0.15)).abs() < 1e-9);
            assert!(loose.duration() - tight.duration() <= 0.3 + 1e-9);
            assert!(tight.duration() > 0.0);
        }
    }

    #[test]
    fn tighten_silences_drops_ranges_that_collapse() {
        let probe = Probe::with_duration(4.0);
        let peaks = [0.0, 1.0, 1.0, 1.0];

        assert_eq!(detect_silences(&probe, &peaks, 1.0), vec![r(0.0, 1.0)]);
        assert!(tighten_silences(&probe, &peaks, 1.0, 500.0).is_empty());
        assert!(tighten_silences(&probe, &peaks, 1.0, 600.0).is_empty());
    }

    #[test]
    fn range_constructors_validate_ordering() {
        assert_eq!(Range::spanning(14.0, 12.5), Some(r(12.5, 14.0)));
        assert!(Range::new(f64::NAN, 1.0).is_none());
        assert!(r(0.0, 1.0).touches(&r(1.0, 2.0)));
        assert!(!r(0.0, 1.0).touches(&r(1.5, 2.0)));
    }
}
