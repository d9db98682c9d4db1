use serde::{Deserialize, Serialize};

/// Metadata supplied by the external decode service for one media asset.
///
/// The engine never probes files itself; hosts pass this in alongside the
/// asset's amplitude peaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub duration: f64,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub audio_channels: u8,
    #[serde(default)]
    pub audio_rate: u32,
    #[serde(default)]
    pub v_codec: String,
    #[serde(default)]
    pub a_codec: String,
    #[serde(default)]
    pub container: String,
}

impl Probe {
    /// Probe carrying only a duration, for audio analysis on bare peaks.
    ///
    /// # Example
    /// ```
    /// use engine::Probe;
    ///
    /// let probe = Probe::with_duration(8.0);
    /// assert_eq!(probe.duration, 8.0);
    /// ```
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            fps: 0.0,
            width: 0,
            height: 0,
            audio_channels: 0,
            audio_rate: 0,
            v_codec: String::new(),
            a_codec: String::new(),
            container: String::new(),
        }
    }

    /// Returns true when the asset carries a video stream.
    pub fn has_video(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Converts absolute 16-bit peak values into amplitudes in `[0, 1]`.
///
/// The decode service reports one `|sample|` maximum per window; silence
/// detection works on normalized amplitudes.
pub fn normalize_pcm_peaks(peaks: &[i16]) -> Vec<f32> {
    peaks
        .iter()
        .map(|peak| f32::from(peak.unsigned_abs().min(i16::MAX as u16)) / f32::from(i16::MAX))
        .collect()
}
