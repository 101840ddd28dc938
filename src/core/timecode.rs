/// Timecode accumulator — running elapsed time formatted as
/// `HH:MM:SS:FF` at a fixed frame rate.

/// Format `seconds` as `HH:MM:SS:FF`, resolved to the nearest centisecond.
pub fn format_timecode(seconds: f64, frame_rate: u32) -> String {
    format_centiseconds(to_centiseconds(seconds), frame_rate)
}

/// Format a whole number of centiseconds as `HH:MM:SS:FF`. Frames are the
/// floor of the fractional second times `frame_rate`, so never exceed
/// `frame_rate - 1`.
pub fn format_centiseconds(centis: u64, frame_rate: u32) -> String {
    let total = centis / 100;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    let frames = (centis % 100) * frame_rate as u64 / 100;
    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, secs, frames)
}

/// Negative and non-finite inputs map to zero.
fn to_centiseconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 100.0).round() as u64
    } else {
        0
    }
}

/// Running total of elapsed time, kept in whole centiseconds so the
/// formatted timecode is exact for durations rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    centis: u64,
    frame_rate: u32,
}

impl Timecode {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            centis: 0,
            frame_rate,
        }
    }

    /// Elapsed seconds.
    pub fn elapsed(&self) -> f64 {
        self.centis as f64 / 100.0
    }

    pub fn centiseconds(&self) -> u64 {
        self.centis
    }

    /// Advance by `seconds` (ignored if negative or non-finite).
    pub fn advance(&mut self, seconds: f64) {
        self.centis += to_centiseconds(seconds);
    }

    pub fn format(&self) -> String {
        format_centiseconds(self.centis, self.frame_rate)
    }
}
