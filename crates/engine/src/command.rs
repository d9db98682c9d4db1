//! Closed text command grammar producing cut ranges.
//!
//! Recognized forms (case-insensitive, surrounding whitespace ignored):
//!
//! - `tighten silence[s] > N [leave M ms]`
//! - `remove silence[s] > N` / `cut silence[s] > N`
//! - `cut S - E`
//!
//! Numbers are seconds, except `M` which is milliseconds.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::probe::Probe;
use crate::range::{Range, detect_silences_with_threshold, tighten_ranges};

const NUMBER: &str = r"(\d+(?:\.\d+)?|\.\d+)";

static TIGHTEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^tighten\s+silences?\s*>\s*{NUMBER}(?:\s+leave\s+{NUMBER}\s*ms)?$"
    ))
    .expect("tighten pattern is valid")
});

static REMOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:remove|cut)\s+silences?\s*>\s*{NUMBER}$"))
        .expect("remove pattern is valid")
});

static CUT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^cut\s+{NUMBER}\s*-\s*{NUMBER}$"))
        .expect("cut pattern is valid")
});

/// Parsed form of a text command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditCommand {
    Tighten {
        min_duration: f64,
        leave_ms: Option<f64>,
    },
    RemoveSilences {
        min_duration: f64,
    },
    CutRange {
        start: f64,
        end: f64,
    },
}

impl EditCommand {
    /// Matches `text` against the grammar. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(captures) = TIGHTEN.captures(text) {
            let min_duration = captures.get(1)?.as_str().parse().ok()?;
            let leave_ms = match captures.get(2) {
                Some(value) => Some(value.as_str().parse().ok()?),
                None => None,
            };
            return Some(Self::Tighten {
                min_duration,
                leave_ms,
            });
        }
        if let Some(captures) = REMOVE.captures(text) {
            let min_duration = captures.get(1)?.as_str().parse().ok()?;
            return Some(Self::RemoveSilences { min_duration });
        }
        if let Some(captures) = CUT_RANGE.captures(text) {
            let a: f64 = captures.get(1)?.as_str().parse().ok()?;
            let b: f64 = captures.get(2)?.as_str().parse().ok()?;
            return Some(Self::CutRange {
                start: a.min(b),
                end: a.max(b),
            });
        }
        None
    }

    /// Produces the ranges this command proposes for `probe` and `peaks`.
    ///
    /// A `cut S - S` command yields no range.
    pub fn evaluate(&self, probe: &Probe, peaks: &[f32], config: &EngineConfig) -> Vec<Range> {
        match *self {
            Self::Tighten {
                min_duration,
                leave_ms,
            } => {
                let silences = detect_silences_with_threshold(
                    probe,
                    peaks,
                    min_duration,
                    config.silence_threshold,
                );
                tighten_ranges(&silences, leave_ms.unwrap_or(config.default_leave_ms))
            }
            Self::RemoveSilences { min_duration } => detect_silences_with_threshold(
                probe,
                peaks,
                min_duration,
                config.silence_threshold,
            ),
            Self::CutRange { start, end } => Range::new(start, end).into_iter().collect(),
        }
    }
}

/// Parses and evaluates `text` with the default [`EngineConfig`].
///
/// # Example
/// ```
/// use engine::{Probe, Range, parse_command};
///
/// let probe = Probe::with_duration(60.0);
/// assert_eq!(
///     parse_command("cut 14 - 12.5", &probe, &[]),
///     Some(vec![Range { start: 12.5, end: 14.0 }])
/// );
/// assert_eq!(parse_command("make it pop", &probe, &[]), None);
/// ```
pub fn parse_command(text: &str, probe: &Probe, peaks: &[f32]) -> Option<Vec<Range>> {
    parse_command_with(text, probe, peaks, &EngineConfig::default())
}

/// Same as [`parse_command`] with explicit tunables.
pub fn parse_command_with(
    text: &str,
    probe: &Probe,
    peaks: &[f32],
    config: &EngineConfig,
) -> Option<Vec<Range>> {
    let command = EditCommand::parse(text)?;
    let ranges = command.evaluate(probe, peaks, config);
    debug!(?command, range_count = ranges.len(), "text command evaluated");
    Some(ranges)
}

#[cfg(test)]
mod tests {
    use super::{EditCommand, parse_command};
    use crate::probe::Probe;
    use crate::range::{Range, detect_silences};

    fn speech_with_gaps() -> (Probe, Vec<f32>) {
        let peaks = vec![0.0, 0.0, 0.0, 0.8, 0.9, 0.0, 0.0, 0.0, 0.0, 0.7];
        (Probe::with_duration(10.0), peaks)
    }

    #[test]
    fn cut_range_orders_its_endpoints() {
        let probe = Probe::with_duration(60.0);
        assert_eq!(
            parse_command("cut 14 - 12.5", &probe, &[]),
            Some(vec![Range {
                start: 12.5,
                end: 14.0
            }])
        );
        assert_eq!(
            parse_command("  CUT 3.25-4  ", &probe, &[]),
            Some(vec![Range {
                start: 3.25,
                end: 4.0
            }])
        );
    }

    #[test]
    fn cut_range_with_equal_endpoints_yields_nothing() {
        let probe = Probe::with_duration(60.0);
        assert_eq!(parse_command("cut 5 - 5", &probe, &[]), Some(Vec::new()));
    }

    #[test]
    fn remove_silence_matches_detect_silences() {
        let (probe, peaks) = speech_with_gaps();
        let expected = detect_silences(&probe, &peaks, 2.0);

        assert_eq!(
            parse_command("remove silence > 2", &probe, &peaks),
            Some(expected.clone())
        );
        assert_eq!(
            parse_command("Cut Silences>2", &probe, &peaks),
            Some(expected)
        );
    }

    #[test]
    fn tighten_defaults_leave_to_150_ms() {
        let (probe, peaks) = speech_with_gaps();
        let ranges = parse_command("tighten silence > 2", &probe, &peaks).expect("recognized");

        assert_eq!(ranges.len(), 2);
        assert!((ranges[0].start - 0.15).abs() < 1e-9);
        assert!((ranges[0].end - 2.85).abs() < 1e-9);
    }

    #[test]
    fn tighten_honors_explicit_leave() {
        let (probe, peaks) = speech_with_gaps();
        let ranges =
            parse_command("tighten silences > 2 leave 500 ms", &probe, &peaks).expect("recognized");

        assert!((ranges[1].start - 5.5).abs() < 1e-9);
        assert!((ranges[1].end - 8.5).abs() < 1e-9);
        assert_eq!(
            EditCommand::parse("tighten silence > 1.5 leave 80ms"),
            Some(EditCommand::Tighten {
                min_duration: 1.5,
                leave_ms: Some(80.0),
            })
        );
    }

    #[test]
    fn unrecognized_input_returns_none() {
        let probe = Probe::with_duration(10.0);
        for text in [
            "",
            "remove silence",
            "tighten silence > two",
            "cut 1 to 2",
            "please cut 1 - 2",
            "remove silence > 2 now",
        ] {
            assert_eq!(parse_command(text, &probe, &[]), None, "input {text:?}");
        }
    }
}
