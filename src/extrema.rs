//! Local extrema extraction.
//!
//! A bar is a local maximum when its high is the highest in the surrounding
//! `order` bars on each side and strictly above every high to its left in that
//! window, so a flat top resolves to its first bar. Minima are symmetric on
//! lows. The output is filtered by prominence, thinned by `min_separation` and
//! forced to strictly alternate between maxima and minima.

use chrono::NaiveDate;

use crate::{Period, PriceSeries, Ratio, OHLCV};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ExtremumKind {
    LocalMax,
    LocalMin,
}

/// A turning point in a price series
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExtremumPoint {
    pub index: usize,
    pub date: NaiveDate,
    pub price: f64,
    pub kind: ExtremumKind,
}

impl ExtremumPoint {
    #[inline]
    pub fn is_max(&self) -> bool {
        self.kind == ExtremumKind::LocalMax
    }

    #[inline]
    pub fn is_min(&self) -> bool {
        self.kind == ExtremumKind::LocalMin
    }

    /// True if `self` is at least as extreme as `other` (same kind assumed)
    fn dominates(&self, other: &ExtremumPoint) -> bool {
        match self.kind {
            ExtremumKind::LocalMax => self.price >= other.price,
            ExtremumKind::LocalMin => self.price <= other.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtremaConfig {
    /// Window half-width
    pub order: Period,
    /// Same-kind extrema closer than this are merged
    pub min_separation: Period,
    /// Minimum (extreme - opposite extreme in window) / extreme
    pub min_prominence: Ratio,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        Self {
            order: Period::new_const(5),
            min_separation: Period::new_const(5),
            min_prominence: Ratio::new_const(0.0),
        }
    }
}

impl ExtremaConfig {
    /// Shortest series that can contain an extremum
    #[inline]
    pub fn min_span(&self) -> usize {
        2 * self.order.get() + 1
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtremaDetector {
    config: ExtremaConfig,
}

impl ExtremaDetector {
    pub fn new(config: ExtremaConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, series: &PriceSeries) -> Vec<ExtremumPoint> {
        let bars = series.bars();
        let order = self.config.order.get();
        if bars.len() < self.config.min_span() {
            return Vec::new();
        }

        let prominence = self.config.min_prominence.get();
        let mut raw = Vec::new();
        for i in order..bars.len() - order {
            let window = &bars[i - order..=i + order];
            let (left, right) = (&bars[i - order..i], &bars[i + 1..=i + order]);
            let high = bars[i].high();
            let low = bars[i].low();

            let is_max = left.iter().all(|b| b.high() < high) && right.iter().all(|b| b.high() <= high);
            if is_max {
                let floor = window.iter().map(|b| b.low()).fold(f64::INFINITY, f64::min);
                if (high - floor) / high >= prominence {
                    raw.push(point(series, i, high, ExtremumKind::LocalMax));
                }
            }

            let is_min = left.iter().all(|b| b.low() > low) && right.iter().all(|b| b.low() >= low);
            if is_min {
                let ceiling = window.iter().map(|b| b.high()).fold(f64::NEG_INFINITY, f64::max);
                if (ceiling - low) / low >= prominence {
                    raw.push(point(series, i, low, ExtremumKind::LocalMin));
                }
            }
        }

        let separated = self.separate(raw);
        alternate(separated)
    }

    /// Merge same-kind points closer than `min_separation`, keeping the more extreme
    fn separate(&self, points: Vec<ExtremumPoint>) -> Vec<ExtremumPoint> {
        let min_sep = self.config.min_separation.get();
        let mut out: Vec<ExtremumPoint> = Vec::with_capacity(points.len());
        for p in points {
            let close_twin = out
                .iter()
                .rposition(|q| q.kind == p.kind)
                .filter(|&j| p.index - out[j].index < min_sep);
            match close_twin {
                Some(j) => {
                    if !out[j].dominates(&p) {
                        out[j] = p;
                    }
                }
                None => out.push(p),
            }
        }
        out.sort_by_key(|p| p.index);
        out
    }
}

fn point(series: &PriceSeries, index: usize, price: f64, kind: ExtremumKind) -> ExtremumPoint {
    ExtremumPoint {
        index,
        date: series.bars()[index].date,
        price,
        kind,
    }
}

/// Collapse runs of same-kind points to their most extreme member.
fn alternate(points: Vec<ExtremumPoint>) -> Vec<ExtremumPoint> {
    let mut out: Vec<ExtremumPoint> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if last.kind == p.kind => {
                if !last.dominates(&p) {
                    *last = p;
                }
            }
            _ => out.push(p),
        }
    }
    out
}
