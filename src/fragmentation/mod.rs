//! Fragmentation reports and the occupancy map derived from them

pub mod map;
pub mod parser;

pub use map::{CellCategory, MapScore, MapSynthesizer, OccupancyGrid};
pub use parser::parse_report;

/// Highest fragmented ratio a report or map will ever carry.
///
/// Defragmentation rarely removes all locality problems, and the map keeps
/// the remaining share for non-fragmented, empty, metadata and unmovable cells.
pub const MAX_FRAGMENTED_RATIO: f64 = 0.55;

/// Fragmentation score reported by the analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Not determined yet: analysis in progress or the output had no score
    Unknown,
    /// 0 (ideal) to 100 (heavily scattered)
    Value(u8),
}

impl Score {
    pub fn value(self) -> Option<u8> {
        match self {
            Self::Unknown => None,
            Self::Value(v) => Some(v),
        }
    }

    /// Band label matching the analyzer's own legend
    pub fn band(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Value(0..=30) => "no problem",
            Self::Value(31..=55) => "a little bit fragmented",
            Self::Value(_) => "needs defrag",
        }
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "?"),
            Self::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Structured result of one analysis run
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentationReport {
    pub score: Score,
    pub total_files: u64,
    pub fragmented_files: u64,
    /// Always within `[0.0, MAX_FRAGMENTED_RATIO]` when present
    pub fragmented_ratio: Option<f64>,
    pub raw_output: String,
}

impl FragmentationReport {
    /// Placeholder held while a task is running on the device
    pub fn pending() -> Self {
        Self {
            score: Score::Unknown,
            total_files: 0,
            fragmented_files: 0,
            fragmented_ratio: None,
            raw_output: String::new(),
        }
    }

    /// Expected state right after a successful defragmentation
    pub fn clean() -> Self {
        Self {
            score: Score::Value(0),
            total_files: 0,
            fragmented_files: 0,
            fragmented_ratio: Some(0.0),
            raw_output: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.score == Score::Unknown
    }
}

/// Clamp a ratio into the displayable range
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return 0.0;
    }
    ratio.clamp(0.0, MAX_FRAGMENTED_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bands_follow_analyzer_legend() {
        assert_eq!(Score::Value(0).band(), "no problem");
        assert_eq!(Score::Value(30).band(), "no problem");
        assert_eq!(Score::Value(31).band(), "a little bit fragmented");
        assert_eq!(Score::Value(55).band(), "a little bit fragmented");
        assert_eq!(Score::Value(56).band(), "needs defrag");
        assert_eq!(Score::Unknown.band(), "unknown");
    }

    #[test]
    fn clamp_ratio_handles_out_of_range() {
        assert_eq!(clamp_ratio(-1.0), 0.0);
        assert_eq!(clamp_ratio(2.0), MAX_FRAGMENTED_RATIO);
        assert_eq!(clamp_ratio(f64::NAN), 0.0);
        assert_eq!(clamp_ratio(0.2), 0.2);
    }
}
