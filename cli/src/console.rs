//! Per-tick console output: score sparkline and cadence grade.

use std::collections::VecDeque;
use std::fmt;

use clockke_types::TickRecord;

/// Scores kept for the sparkline.
pub const HISTORY_LEN: usize = 24;

/// One sparkline glyph per score.
#[must_use]
pub fn spark_char(a: f64) -> char {
    if a <= -0.40 {
        'v'
    } else if a < -0.10 {
        '/'
    } else if a <= 0.10 {
        '_'
    } else if a <= 0.40 {
        '-'
    } else {
        '^'
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sparkline {
    history: VecDeque<f64>,
}

impl Sparkline {
    pub fn push(&mut self, a: f64) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(a);
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.history.iter().copied().map(spark_char).collect()
    }
}

/// How far a tick landed from the configured cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterGrade {
    /// Under 10% off cadence.
    Ok,
    /// Under 50% off cadence.
    Warn,
    Bad,
}

impl JitterGrade {
    #[must_use]
    pub fn classify(dt_ms: u64, tick_ms: f64) -> Self {
        let deviation = (dt_ms as f64 - tick_ms).abs() / tick_ms;
        if deviation < 0.10 {
            Self::Ok
        } else if deviation < 0.50 {
            Self::Warn
        } else {
            Self::Bad
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Bad => "bad",
        }
    }
}

impl fmt::Display for JitterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[must_use]
pub fn tick_line(record: &TickRecord, grade: JitterGrade, sparkline: &Sparkline) -> String {
    format!(
        "{:04}  {}  align={}  band={:<2}  dt_ms={:>7} {:<4}  history:{}",
        record.tick_index,
        record.time_utc,
        record.a_out_text(),
        record.band,
        record.dt_ms,
        grade,
        sparkline.render()
    )
}
