//! Parses the textual output of `e4defrag -c` into a report

use once_cell::sync::Lazy;
use regex::Regex;

use super::{clamp_ratio, FragmentationReport, Score};

// Compile regexes once at startup
static SCORE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fragmentation\s+score\s*:?\s*(\d+)").expect("Invalid score regex")
});

static TOTAL_FILES_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)total\s+files\s*:?\s*(\d+)").expect("Invalid total files regex")
});

static FRAGMENTED_FILES_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)fragmented\s+files\s*:?\s*(\d+)").expect("Invalid fragmented files regex")
});

static NO_FRAGMENTATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)no\s+fragmentation|does\s+not\s+need\s+defragmentation")
        .expect("Invalid no-fragmentation regex")
});

/// Build a report from raw analyzer output.
///
/// Missing lines never fail: a report without a score line keeps
/// `Score::Unknown` and no ratio. The first match of each pattern wins.
pub fn parse_report(raw: &str) -> FragmentationReport {
    let mut score: Option<u8> = None;
    let mut total_files: Option<u64> = None;
    let mut fragmented_files: Option<u64> = None;
    let mut no_fragmentation = false;

    for line in raw.lines() {
        if score.is_none() {
            if let Some(value) = capture_number(&SCORE_REGEX, line) {
                score = Some(value.min(100) as u8);
                continue;
            }
        }
        if total_files.is_none() {
            if let Some(value) = capture_number(&TOTAL_FILES_REGEX, line) {
                total_files = Some(value);
                continue;
            }
        }
        if fragmented_files.is_none() {
            if let Some(value) = capture_number(&FRAGMENTED_FILES_REGEX, line) {
                fragmented_files = Some(value);
                continue;
            }
        }
        if NO_FRAGMENTATION_REGEX.is_match(line) {
            no_fragmentation = true;
        }
    }

    if score.is_none() && no_fragmentation {
        score = Some(0);
    }

    let total_files = total_files.unwrap_or(0);
    let fragmented_files = fragmented_files.unwrap_or(0);
    let score = score.map(Score::Value).unwrap_or(Score::Unknown);

    if score == Score::Unknown {
        tracing::debug!("analyzer output carried no fragmentation score");
    }

    FragmentationReport {
        score,
        total_files,
        fragmented_files,
        fragmented_ratio: derive_ratio(score, total_files, fragmented_files),
        raw_output: raw.to_string(),
    }
}

/// Ratio of the map that should show fragmented cells.
///
/// The file share only scales the score between 50% and 100% of its value,
/// so a high score with few fragmented files still reads as fragmented.
pub fn derive_ratio(score: Score, total_files: u64, fragmented_files: u64) -> Option<f64> {
    let score = score.value()?;
    if score == 0 {
        return Some(0.0);
    }

    let base = f64::from(score) / 100.0;
    if total_files == 0 {
        return Some(clamp_ratio(base));
    }

    let file_share = fragmented_files as f64 / total_files as f64;
    Some(clamp_ratio(base * (0.5 + 0.5 * file_share)))
}

fn capture_number(regex: &Regex, line: &str) -> Option<u64> {
    regex
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}
