//! Completion ratio from ffmpeg's stderr log.
//!
//! ffmpeg prints the input duration once (`Duration: 00:03:12.45, ...`) and
//! then refreshes a status line carrying the current output position
//! (`size= 1024kB time=00:00:42.10 bitrate=...`). The ratio is position over
//! duration, clamped to `0.0..=1.0`.

/// Incremental parser fed one stderr line at a time.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    duration_secs: Option<f64>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total duration seen so far, in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.duration_secs
    }

    /// Consume a line; returns the new ratio when the line carries a position
    /// and the duration is known.
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        if self.duration_secs.is_none() {
            if let Some(rest) = line.trim_start().strip_prefix("Duration:") {
                let stamp = rest.split(',').next().unwrap_or_default();
                self.duration_secs = parse_timestamp(stamp).filter(|d| *d > 0.0);
                return None;
            }
        }

        let duration = self.duration_secs?;
        let position = line
            .split_whitespace()
            .find_map(|tok| tok.strip_prefix("time="))
            .and_then(parse_timestamp)?;

        Some((position / duration).clamp(0.0, 1.0))
    }
}

/// Parse `HH:MM:SS(.frac)` into seconds. Negative stamps (ffmpeg prints
/// `-00:00:00.02` before the first frame) parse as zero; `N/A` is `None`.
pub fn parse_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let mut parts = s.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    if negative {
        return Some(0.0);
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
