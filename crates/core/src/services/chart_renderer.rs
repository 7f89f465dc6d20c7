use crate::errors::RenderError;
use crate::models::price::PriceSeries;

/// Default plot size when the terminal size is unknown.
pub const DEFAULT_WIDTH: usize = 40;
pub const DEFAULT_HEIGHT: usize = 10;

/// Anything smaller cannot show a trend.
pub const MIN_WIDTH: usize = 10;
pub const MIN_HEIGHT: usize = 3;

/// Row shown instead of a plot when the series is empty.
pub const NO_DATA: &str = "no data";

const FLAT: char = '─';
const VERTICAL: char = '│';
const RISE_FROM: char = '╯';
const RISE_TO: char = '╭';
const FALL_FROM: char = '╮';
const FALL_TO: char = '╰';

/// Turns a price series into a fixed-size line plot made of box-drawing
/// characters.
///
/// The series is resampled to exactly one value per column by linear
/// interpolation, each value is scaled to a level between 0 (bottom row) and
/// `height - 1` (top row), and vertical gaps between neighbouring columns are
/// bridged so the line reads as continuous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRenderer {
    width: usize,
    height: usize,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl ChartRenderer {
    /// Sizes below `MIN_WIDTH` × `MIN_HEIGHT` are raised to the minimum.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width: width.max(MIN_WIDTH),
            height: height.max(MIN_HEIGHT),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Resample `values` to exactly `target` points using linear interpolation.
    pub fn resample(values: &[f64], target: usize) -> Vec<f64> {
        if values.is_empty() || target == 0 {
            return Vec::new();
        }
        if values.len() == 1 || target == 1 {
            return vec![values[0]; target];
        }
        if values.len() == target {
            return values.to_vec();
        }

        let last = values.len() - 1;
        (0..target)
            .map(|i| {
                let src_pos = i as f64 * last as f64 / (target - 1) as f64;
                let src_idx = src_pos.floor() as usize;
                if src_idx >= last {
                    values[last]
                } else {
                    let frac = src_pos - src_idx as f64;
                    values[src_idx] + frac * (values[src_idx + 1] - values[src_idx])
                }
            })
            .collect()
    }

    /// Plotted level per column, 0 = bottom row. Empty for an empty series.
    pub fn levels(&self, series: &PriceSeries) -> Vec<usize> {
        let Some((min, max)) = series.bounds() else {
            return Vec::new();
        };
        let samples = Self::resample(&series.prices(), self.width);
        let top = self.height - 1;

        match scale(min, max) {
            Ok(span) => samples
                .iter()
                .map(|v| {
                    let ratio = ((v - min) / span).clamp(0.0, 1.0);
                    ((ratio * top as f64).round() as usize).min(top)
                })
                .collect(),
            Err(RenderError::DegenerateSeries) => vec![top / 2; samples.len()],
        }
    }

    /// Render the plot: `height` rows of exactly `width` characters, top row
    /// first. An empty series renders the single row `"no data"`.
    pub fn render(&self, series: &PriceSeries) -> Vec<String> {
        let levels = self.levels(series);
        if levels.is_empty() {
            return vec![NO_DATA.chars().take(self.width).collect()];
        }

        let top = self.height - 1;
        let row_of = |level: usize| top - level;
        let mut grid = vec![vec![' '; self.width]; self.height];

        grid[row_of(levels[0])][0] = FLAT;
        for x in 1..levels.len() {
            let (prev, cur) = (levels[x - 1], levels[x]);
            if cur == prev {
                grid[row_of(cur)][x] = FLAT;
                continue;
            }
            let (from_glyph, to_glyph) = if cur > prev {
                (RISE_FROM, RISE_TO)
            } else {
                (FALL_FROM, FALL_TO)
            };
            grid[row_of(prev)][x] = from_glyph;
            grid[row_of(cur)][x] = to_glyph;
            for level in prev.min(cur) + 1..prev.max(cur) {
                grid[row_of(level)][x] = VERTICAL;
            }
        }

        grid.into_iter().map(|row| row.into_iter().collect()).collect()
    }
}

/// Price span used as the scaling denominator.
fn scale(min: f64, max: f64) -> Result<f64, RenderError> {
    let span = max - min;
    if span.abs() < f64::EPSILON || !span.is_finite() {
        return Err(RenderError::DegenerateSeries);
    }
    Ok(span)
}
