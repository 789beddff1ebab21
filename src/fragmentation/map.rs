//! Occupancy map synthesis.
//!
//! The grid is an illustration of how fragmented a filesystem is, built from
//! the score and ratio alone. It is not a picture of real block addresses:
//! the analyzer never reports where extents live, so cell positions are a
//! heuristic. A clean filesystem is drawn as contiguous blocks, a fragmented
//! one with intact and fragmented cells scattered across the data area.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{clamp_ratio, FragmentationReport, Score};

/// Share of cells drawn as free space
pub const EMPTY_RATIO: f64 = 0.15;
/// Share of cells drawn as filesystem metadata
pub const METADATA_RATIO: f64 = 0.03;
/// Share of cells drawn as unmovable extents
pub const UNMOVABLE_RATIO: f64 = 0.07;

/// Length bounds of a contiguous non-fragmented run
const RUN_MIN: usize = 3;
const RUN_MAX: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellCategory {
    Empty,
    Metadata,
    NonFragmented,
    Fragmented,
    Unmovable,
    Unknown,
}

impl CellCategory {
    pub const ALL: [CellCategory; 6] = [
        Self::NonFragmented,
        Self::Fragmented,
        Self::Metadata,
        Self::Unmovable,
        Self::Empty,
        Self::Unknown,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Metadata => "Metadata",
            Self::NonFragmented => "Contiguous",
            Self::Fragmented => "Fragmented",
            Self::Unmovable => "Unmovable",
            Self::Unknown => "Unknown",
        }
    }

    /// Single glyph used by the plain-text map
    pub fn glyph(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Metadata => 'M',
            Self::NonFragmented => '#',
            Self::Fragmented => 'x',
            Self::Unmovable => 'U',
            Self::Unknown => '?',
        }
    }
}

/// Score input of the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapScore {
    /// No analysis has been run for the device
    NotAnalyzed,
    /// A task is running, or the analyzer gave no score
    Unknown,
    Value(u8),
}

impl MapScore {
    pub fn from_report(report: Option<&FragmentationReport>) -> Self {
        match report.map(|r| r.score) {
            None => Self::NotAnalyzed,
            Some(Score::Unknown) => Self::Unknown,
            Some(Score::Value(v)) => Self::Value(v.min(100)),
        }
    }
}

/// Fixed-band ratio used when no measured ratio is available
pub fn band_ratio(score: u8) -> f64 {
    match score {
        0 => 0.0,
        1..=30 => 0.1,
        31..=55 => 0.35,
        _ => 0.55,
    }
}

/// Per-category cell counts; always sums to the grid size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryCounts {
    pub empty: usize,
    pub metadata: usize,
    pub non_fragmented: usize,
    pub fragmented: usize,
    pub unmovable: usize,
}

impl CategoryCounts {
    pub fn for_total(total: usize, fragmented_ratio: f64) -> Self {
        let share = |ratio: f64| (total as f64 * ratio).round() as usize;

        let mut counts = Self {
            empty: share(EMPTY_RATIO),
            metadata: share(METADATA_RATIO),
            non_fragmented: 0,
            fragmented: share(clamp_ratio(fragmented_ratio)),
            unmovable: share(UNMOVABLE_RATIO),
        };

        let assigned = counts.empty + counts.metadata + counts.fragmented + counts.unmovable;
        counts.non_fragmented = total.saturating_sub(assigned);

        // Rounding can overshoot tiny grids; give cells back until the sum fits.
        let mut surplus = assigned.saturating_sub(total);
        for slot in [
            &mut counts.empty,
            &mut counts.unmovable,
            &mut counts.fragmented,
            &mut counts.metadata,
        ] {
            let take = surplus.min(*slot);
            *slot -= take;
            surplus -= take;
        }

        counts
    }

    pub fn total(&self) -> usize {
        self.empty + self.metadata + self.non_fragmented + self.fragmented + self.unmovable
    }
}

/// Row-major grid of categorized cells
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupancyGrid {
    rows: usize,
    cols: usize,
    cells: Vec<CellCategory>,
}

impl OccupancyGrid {
    pub fn empty() -> Self {
        Self::default()
    }

    fn filled(rows: usize, cols: usize, category: CellCategory) -> Self {
        Self {
            rows,
            cols,
            cells: vec![category; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<CellCategory> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> &[CellCategory] {
        if row >= self.rows {
            return &[];
        }
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn count(&self, category: CellCategory) -> usize {
        self.cells.iter().filter(|&&c| c == category).count()
    }

    /// Plain-text rendering, one line per row
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.rows * (self.cols + 1));
        for row in 0..self.rows {
            out.extend(self.row(row).iter().map(|c| c.glyph()));
            out.push('\n');
        }
        out
    }
}

/// Build a grid for a surface of `width` x `height` units.
///
/// Layout is illustrative only. With score 0 the result is deterministic;
/// otherwise arrangement depends on `rng` while category counts do not.
pub fn synthesize<R: Rng>(
    score: MapScore,
    ratio: Option<f64>,
    width: u32,
    height: u32,
    cell_edge: u32,
    rng: &mut R,
) -> OccupancyGrid {
    let cell_edge = cell_edge.max(1);
    let cols = (width / cell_edge) as usize;
    let rows = (height / cell_edge) as usize;
    if cols == 0 || rows == 0 {
        return OccupancyGrid::empty();
    }

    let score = match score {
        MapScore::NotAnalyzed => return OccupancyGrid::filled(rows, cols, CellCategory::Empty),
        MapScore::Unknown => return OccupancyGrid::filled(rows, cols, CellCategory::Unknown),
        MapScore::Value(v) => v,
    };

    let total = rows * cols;
    let fragmented_ratio = ratio.map(clamp_ratio).unwrap_or_else(|| band_ratio(score));
    let counts = CategoryCounts::for_total(total, fragmented_ratio);

    let mut cells = if score == 0 {
        clean_sequence(&counts)
    } else {
        scattered_sequence(&counts, rng)
    };

    cells.truncate(total);
    cells.resize(total, CellCategory::Unknown);

    OccupancyGrid { rows, cols, cells }
}

fn clean_sequence(counts: &CategoryCounts) -> Vec<CellCategory> {
    let mut cells = Vec::with_capacity(counts.total());
    push_block(&mut cells, CellCategory::Metadata, counts.metadata);
    push_block(&mut cells, CellCategory::Unmovable, counts.unmovable);
    push_block(&mut cells, CellCategory::NonFragmented, counts.non_fragmented);
    // Only reachable when a caller pairs score 0 with a measured ratio above zero
    push_block(&mut cells, CellCategory::Fragmented, counts.fragmented);
    push_block(&mut cells, CellCategory::Empty, counts.empty);
    cells
}

fn scattered_sequence<R: Rng>(counts: &CategoryCounts, rng: &mut R) -> Vec<CellCategory> {
    let mut body = Vec::with_capacity(counts.non_fragmented + counts.fragmented);
    let mut remaining = counts.non_fragmented;
    while remaining > 0 {
        let run = rng.gen_range(RUN_MIN..=RUN_MAX).min(remaining);
        push_block(&mut body, CellCategory::NonFragmented, run);
        remaining -= run;
    }
    push_block(&mut body, CellCategory::Fragmented, counts.fragmented);
    body.shuffle(rng);

    for _ in 0..counts.unmovable {
        let at = rng.gen_range(0..=body.len());
        body.insert(at, CellCategory::Unmovable);
    }

    let mut cells = Vec::with_capacity(counts.total());
    push_block(&mut cells, CellCategory::Metadata, counts.metadata);
    cells.append(&mut body);
    push_block(&mut cells, CellCategory::Empty, counts.empty);
    cells
}

fn push_block(cells: &mut Vec<CellCategory>, category: CellCategory, count: usize) {
    cells.extend(std::iter::repeat(category).take(count));
}

/// Owns the generator used for map layout
pub struct MapSynthesizer {
    rng: StdRng,
    cell_edge: u32,
}

impl MapSynthesizer {
    pub fn new(seed: Option<u64>, cell_edge: u32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            cell_edge: cell_edge.max(1),
        }
    }

    pub fn cell_edge(&self) -> u32 {
        self.cell_edge
    }

    pub fn grid_for(
        &mut self,
        report: Option<&FragmentationReport>,
        width: u32,
        height: u32,
    ) -> OccupancyGrid {
        synthesize(
            MapScore::from_report(report),
            report.and_then(|r| r.fragmented_ratio),
            width,
            height,
            self.cell_edge,
            &mut self.rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn counts_of(grid: &OccupancyGrid) -> CategoryCounts {
        CategoryCounts {
            empty: grid.count(CellCategory::Empty),
            metadata: grid.count(CellCategory::Metadata),
            non_fragmented: grid.count(CellCategory::NonFragmented),
            fragmented: grid.count(CellCategory::Fragmented),
            unmovable: grid.count(CellCategory::Unmovable),
        }
    }

    #[test]
    fn band_ratio_boundaries() {
        let expected = [
            (0u8, 0.0),
            (1, 0.1),
            (30, 0.1),
            (31, 0.35),
            (55, 0.35),
            (56, 0.55),
            (100, 0.55),
        ];
        for (score, ratio) in expected {
            assert_eq!(band_ratio(score), ratio, "score {score}");
        }
    }

    #[test]
    fn derived_band_drives_fragmented_count() {
        let grid = synthesize(MapScore::Value(40), None, 200, 100, 10, &mut rng(1));
        let total = grid.len();
        assert_eq!(total, 200);
        assert_eq!(
            grid.count(CellCategory::Fragmented),
            (total as f64 * 0.35).round() as usize
        );
    }

    #[test]
    fn explicit_ratio_overrides_band() {
        let grid = synthesize(MapScore::Value(90), Some(0.2), 100, 100, 10, &mut rng(2));
        assert_eq!(grid.count(CellCategory::Fragmented), 20);

        let capped = synthesize(MapScore::Value(90), Some(0.9), 100, 100, 10, &mut rng(2));
        assert_eq!(capped.count(CellCategory::Fragmented), 55);
    }

    #[test]
    fn cell_count_matches_dimensions() {
        let sizes = [(1u32, 1u32), (3, 7), (17, 5), (80, 24), (157, 43), (640, 480)];
        for (w, h) in sizes {
            for score in [0u8, 1, 30, 31, 56, 100] {
                let grid = synthesize(MapScore::Value(score), None, w, h, 1, &mut rng(7));
                assert_eq!(grid.len(), grid.rows() * grid.cols());
                assert_eq!((grid.cols(), grid.rows()), (w as usize, h as usize));
                assert_eq!(counts_of(&grid).total(), grid.len());
                assert_eq!(grid.count(CellCategory::Unknown), 0);
            }
        }
    }

    #[test]
    fn degenerate_surfaces_yield_empty_grid() {
        assert!(synthesize(MapScore::Value(10), None, 0, 100, 4, &mut rng(0)).is_empty());
        assert!(synthesize(MapScore::Value(10), None, 100, 3, 4, &mut rng(0)).is_empty());
        assert!(synthesize(MapScore::Unknown, None, 3, 3, 4, &mut rng(0)).is_empty());
    }

    #[test]
    fn unknown_score_marks_every_cell_unknown() {
        let grid = synthesize(MapScore::Unknown, Some(0.3), 40, 20, 2, &mut rng(3));
        assert_eq!(grid.len(), 200);
        assert_eq!(grid.count(CellCategory::Unknown), 200);
    }

    #[test]
    fn not_analyzed_is_distinct_from_busy() {
        let grid = synthesize(MapScore::NotAnalyzed, None, 40, 20, 2, &mut rng(3));
        assert_eq!(grid.count(CellCategory::Empty), grid.len());
        assert_eq!(grid.count(CellCategory::Unknown), 0);
    }

    #[test]
    fn clean_layout_is_deterministic() {
        let a = synthesize(MapScore::Value(0), None, 120, 60, 3, &mut rng(11));
        let b = synthesize(MapScore::Value(0), None, 120, 60, 3, &mut rng(9999));
        assert_eq!(a, b);
    }

    #[test]
    fn clean_layout_is_ordered_blocks() {
        let grid = synthesize(MapScore::Value(0), Some(0.0), 10, 10, 1, &mut rng(5));
        let cells: Vec<CellCategory> = (0..grid.rows()).flat_map(|r| grid.row(r).to_vec()).collect();

        let mut expected = vec![CellCategory::Metadata; 3];
        expected.extend(vec![CellCategory::Unmovable; 7]);
        expected.extend(vec![CellCategory::NonFragmented; 75]);
        expected.extend(vec![CellCategory::Empty; 15]);
        assert_eq!(cells, expected);
    }

    #[test]
    fn scattered_layout_keeps_counts_across_seeds() {
        let reference = counts_of(&synthesize(
            MapScore::Value(42),
            Some(0.273),
            90,
            40,
            2,
            &mut rng(0),
        ));
        let mut layouts = Vec::new();
        for seed in 1..20 {
            let grid = synthesize(MapScore::Value(42), Some(0.273), 90, 40, 2, &mut rng(seed));
            assert_eq!(counts_of(&grid), reference);
            layouts.push(grid);
        }
        assert!(
            layouts.windows(2).any(|w| w[0] != w[1]),
            "different seeds should produce different arrangements"
        );
    }

    #[test]
    fn scattered_layout_frames_body_with_metadata_and_free_space() {
        let grid = synthesize(MapScore::Value(70), None, 50, 20, 1, &mut rng(21));
        let counts = counts_of(&grid);
        let cells: Vec<CellCategory> = (0..grid.rows()).flat_map(|r| grid.row(r).to_vec()).collect();

        assert!(cells[..counts.metadata]
            .iter()
            .all(|&c| c == CellCategory::Metadata));
        assert!(cells[cells.len() - counts.empty..]
            .iter()
            .all(|&c| c == CellCategory::Empty));
    }

    #[test]
    fn tiny_grids_never_overflow_counts() {
        for total in 1..40 {
            for ratio in [0.0, 0.1, 0.35, 0.55] {
                let counts = CategoryCounts::for_total(total, ratio);
                assert_eq!(counts.total(), total, "total={total} ratio={ratio}");
            }
        }
    }

    #[test]
    fn synthesizer_reads_score_and_ratio_from_report() {
        let mut synth = MapSynthesizer::new(Some(4), 2);
        let report = crate::fragmentation::parse_report(
            "Fragmentation score 42\nTotal files: 1000\nFragmented files: 300",
        );

        let ratio = report.fragmented_ratio.expect("ratio");

        let grid = synth.grid_for(Some(&report), 100, 20);
        assert_eq!((grid.cols(), grid.rows()), (50, 10));
        assert_eq!(
            grid.count(CellCategory::Fragmented),
            CategoryCounts::for_total(500, ratio).fragmented
        );

        let pending = synth.grid_for(Some(&FragmentationReport::pending()), 100, 20);
        assert_eq!(pending.count(CellCategory::Unknown), 500);
    }

    #[test]
    fn text_rendering_has_one_line_per_row() {
        let grid = synthesize(MapScore::Value(0), None, 6, 3, 1, &mut rng(0));
        let text = grid.to_text();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.chars().count() == 6));
    }
}
