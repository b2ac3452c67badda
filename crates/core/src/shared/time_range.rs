use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeRangeError {
    #[error("start time must be a finite, non-negative number of seconds, got {0}")]
    InvalidStart(f64),
    #[error("duration must be a finite, non-negative number of seconds, got {0}")]
    InvalidDuration(f64),
    #[error("start frame {start} is beyond the last frame (source has {total} frames)")]
    StartBeyondEnd { start: usize, total: usize },
    #[error("source frame rate is unknown, cannot start at {0}s")]
    UnknownFrameRate(f64),
    #[error("selected range contains no frames")]
    Empty,
}

/// The part of a source the caller asked for, in seconds.
///
/// A missing (or zero) duration means "until the end of the source".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    start_secs: f64,
    duration_secs: Option<f64>,
}

/// A range resolved against a concrete frame rate: `start` is the first
/// frame to process and `len` the number of frames, when known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitSpan {
    pub start: usize,
    pub len: Option<usize>,
}

/// The audio window matching a [`TimeRange`], clipped to the source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioSlice {
    pub start_secs: f64,
    pub duration_secs: Option<f64>,
}

impl TimeRange {
    pub fn new(start_secs: f64, duration_secs: Option<f64>) -> Result<Self, TimeRangeError> {
        if !start_secs.is_finite() || start_secs < 0.0 {
            return Err(TimeRangeError::InvalidStart(start_secs));
        }
        let duration_secs = match duration_secs {
            Some(d) if !d.is_finite() || d < 0.0 => {
                return Err(TimeRangeError::InvalidDuration(d))
            }
            Some(d) if d == 0.0 => None,
            other => other,
        };
        Ok(Self {
            start_secs,
            duration_secs,
        })
    }

    pub fn whole() -> Self {
        Self {
            start_secs: 0.0,
            duration_secs: None,
        }
    }

    pub fn start_secs(&self) -> f64 {
        self.start_secs
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_secs
    }

    pub fn is_whole(&self) -> bool {
        self.start_secs == 0.0 && self.duration_secs.is_none()
    }

    /// Converts the range to frames: `start = floor(start * fps)`,
    /// `end = min(start + floor(duration * fps), total)`.
    ///
    /// `total_units == 0` means the source did not report a frame count;
    /// the span is then left open-ended unless a duration bounds it.
    pub fn unit_span(&self, fps: f64, total_units: usize) -> Result<UnitSpan, TimeRangeError> {
        if fps <= 0.0 {
            if self.is_whole() {
                return Ok(UnitSpan {
                    start: 0,
                    len: (total_units > 0).then_some(total_units),
                });
            }
            return Err(TimeRangeError::UnknownFrameRate(self.start_secs));
        }

        let start = (self.start_secs * fps).floor() as usize;
        if total_units > 0 && start >= total_units {
            return Err(TimeRangeError::StartBeyondEnd {
                start,
                total: total_units,
            });
        }

        let requested = self.duration_secs.map(|d| (d * fps).floor() as usize);
        let len = match (requested, total_units) {
            (Some(n), 0) => Some(n),
            (Some(n), total) => Some(n.min(total - start)),
            (None, 0) => None,
            (None, total) => Some(total - start),
        };
        if len == Some(0) {
            return Err(TimeRangeError::Empty);
        }
        Ok(UnitSpan { start, len })
    }

    /// Audio window for this range, clipped to `source_duration_secs` when known.
    pub fn audio_slice(&self, source_duration_secs: Option<f64>) -> AudioSlice {
        match source_duration_secs {
            Some(total) => {
                let start = self.start_secs.min(total);
                let remaining = total - start;
                AudioSlice {
                    start_secs: start,
                    duration_secs: Some(
                        self.duration_secs
                            .map_or(remaining, |d| d.min(remaining)),
                    ),
                }
            }
            None => AudioSlice {
                start_secs: self.start_secs,
                duration_secs: self.duration_secs,
            },
        }
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::whole()
    }
}
