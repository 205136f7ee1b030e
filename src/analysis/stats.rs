//! Descriptive statistics and fixed-range histograms over reward and
//! advantage samples.

use serde::Serialize;

/// Summary of a sample: count, range, mean and population standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

/// Arithmetic mean, 0.0 for an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0.0 for an empty sample.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Describe a sample. Returns `None` for an empty one since its range is
/// undefined.
pub fn describe(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(Summary {
        count: values.len(),
        min,
        max,
        mean: mean(values),
        std: std_dev(values),
    })
}

/// Equal-width histogram over a fixed range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub lo: f64,
    pub hi: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Bin `samples` into `bins` equal-width bins spanning `[lo, hi]`.
    ///
    /// Samples outside the range (and NaNs) are dropped; `hi` itself falls in
    /// the last bin.
    pub fn from_samples(samples: &[f64], bins: usize, lo: f64, hi: f64) -> Self {
        let bins = bins.max(1);
        let mut counts = vec![0usize; bins];
        let width = (hi - lo) / bins as f64;
        if width > 0.0 {
            for &x in samples {
                if !(lo..=hi).contains(&x) {
                    continue;
                }
                let idx = (((x - lo) / width).floor() as usize).min(bins - 1);
                counts[idx] += 1;
            }
        }
        Self { lo, hi, counts }
    }

    /// Histogram whose range is the sample's own range (a degenerate range is
    /// widened by 0.5 on each side).
    pub fn auto_range(samples: &[f64], bins: usize) -> Self {
        match describe(samples) {
            Some(s) if s.max > s.min => Self::from_samples(samples, bins, s.min, s.max),
            Some(s) => Self::from_samples(samples, bins, s.min - 0.5, s.max + 0.5),
            None => Self::from_samples(samples, bins, -1.0, 1.0),
        }
    }

    pub fn bin_width(&self) -> f64 {
        (self.hi - self.lo) / self.counts.len() as f64
    }

    /// `(left edge, right edge, count)` for every bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        let w = self.bin_width();
        self.counts
            .iter()
            .enumerate()
            .map(move |(i, &c)| (self.lo + i as f64 * w, self.lo + (i + 1) as f64 * w, c))
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert!(describe(&[]).is_none());
        let s = describe(&[1.0, 3.0, -1.0, 5.0]).unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.min, -1.0);
        assert_eq!(s.max, 5.0);
        assert!((s.mean - 2.0).abs() < 1e-12);
        // Population variance = (1 + 1 + 9 + 9) / 4 = 5.
        assert!((s.std - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_mean_and_std() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[]), 0.0);
    }

    #[test]
    fn test_histogram_binning() {
        let h = Histogram::from_samples(&[-3.0, -2.9, 0.0, 0.01, 2.99, 3.0, 3.5, -4.0], 20, -3.0, 3.0);
        assert_eq!(h.counts.len(), 20);
        assert_eq!(h.total(), 6);
        assert_eq!(h.counts[0], 2);
        assert_eq!(h.counts[10], 2);
        assert_eq!(h.counts[19], 2);
        assert!((h.bin_width() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_bins_iter() {
        let h = Histogram::from_samples(&[0.1, 0.6, 0.7], 2, 0.0, 1.0);
        let bins: Vec<_> = h.bins().collect();
        assert_eq!(bins, vec![(0.0, 0.5, 1), (0.5, 1.0, 2)]);
        assert_eq!(h.max_count(), 2);
    }

    #[test]
    fn test_auto_range_degenerate() {
        let h = Histogram::auto_range(&[0.0, 0.0, 0.0], 4);
        assert_eq!(h.lo, -0.5);
        assert_eq!(h.hi, 0.5);
        assert_eq!(h.total(), 3);
    }
}
