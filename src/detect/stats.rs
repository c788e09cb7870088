use crate::dataset::Column;
use crate::policy::OutlierSettings;

/// Nearest-rank quantile over sorted values: index `round((n - 1) * q)`,
/// rounding half away from zero. For `[1,2,2,3,4,5,100]` this gives
/// Q1 = 2 and Q3 = 5.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted.get(idx.min(sorted.len() - 1)).copied()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Middle value, or the average of the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundsMethod {
    Iqr { q1: f64, q3: f64 },
    ZScore { mean: f64, std_dev: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
    pub method: BoundsMethod,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    /// How far `value` lies outside the bounds, or `None` when inside.
    pub fn deviation(&self, value: f64) -> Option<f64> {
        if value > self.upper {
            Some(value - self.upper)
        } else if value < self.lower {
            Some(self.lower - value)
        } else {
            None
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        clamp_between(value, self.lower, self.upper)
    }

    pub fn describe(&self) -> String {
        match self.method {
            BoundsMethod::Iqr { q1, q3 } => format!(
                "[{}, {}] (Q1={}, Q3={}, IQR={})",
                self.lower, self.upper, q1, q3, q3 - q1
            ),
            BoundsMethod::ZScore { mean, std_dev } => format!(
                "[{:.4}, {:.4}] (z-score, mean={:.4}, sd={:.4})",
                self.lower, self.upper, mean, std_dev
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutlierFit {
    Bounds(OutlierBounds),
    /// Every value is identical; nothing can be an outlier.
    Constant,
    TooFewValues(usize),
}

/// Outlier bounds for a numeric column: IQR fences, falling back to a
/// z-score band when the IQR is zero but the values still vary.
pub fn fit_outlier_bounds(column: &Column, settings: &OutlierSettings) -> OutlierFit {
    let values: Vec<f64> = column.numeric_values().into_iter().map(|(_, v)| v).collect();
    if values.len() < settings.min_values.max(1) {
        return OutlierFit::TooFewValues(values.len());
    }

    let sorted = sorted(&values);
    let (q1, q3) = match (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) {
        (Some(q1), Some(q3)) => (q1, q3),
        _ => return OutlierFit::TooFewValues(values.len()),
    };
    let iqr = q3 - q1;
    if iqr > 0.0 {
        let k = settings.multiplier;
        return OutlierFit::Bounds(OutlierBounds {
            lower: q1 - k * iqr,
            upper: q3 + k * iqr,
            method: BoundsMethod::Iqr { q1, q3 },
        });
    }

    match (mean(&values), std_dev(&values)) {
        (Some(m), Some(sd)) if sd > 0.0 => {
            let t = settings.zscore_threshold;
            OutlierFit::Bounds(OutlierBounds {
                lower: m - t * sd,
                upper: m + t * sd,
                method: BoundsMethod::ZScore { mean: m, std_dev: sd },
            })
        }
        _ => OutlierFit::Constant,
    }
}

/// Clamp that tolerates inverted or NaN bounds instead of panicking:
/// the upper bound wins when they cross, and a NaN bound is ignored.
pub fn clamp_between(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    fn column(values: &[f64]) -> Column {
        Column::new("x", values.iter().map(|v| Value::number(*v)).collect())
    }

    #[test]
    fn test_quartiles_of_reference_column() {
        let sorted = [1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 100.0];
        assert_eq!(quantile(&sorted, 0.25), Some(2.0));
        assert_eq!(quantile(&sorted, 0.75), Some(5.0));
    }

    #[test]
    fn test_iqr_bounds() {
        let col = column(&[1.0, 2.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        match fit_outlier_bounds(&col, &OutlierSettings::default()) {
            OutlierFit::Bounds(b) => {
                assert!((b.upper - 9.5).abs() < 1e-9);
                assert!((b.lower - -2.5).abs() < 1e-9);
                assert_eq!(b.deviation(100.0), Some(90.5));
                assert_eq!(b.deviation(5.0), None);
            }
            other => panic!("Expected bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_column() {
        let col = column(&[7.0; 6]);
        assert_eq!(fit_outlier_bounds(&col, &OutlierSettings::default()), OutlierFit::Constant);
    }

    #[test]
    fn test_zero_iqr_uses_zscore() {
        let mut values = vec![5.0; 20];
        values.push(100.0);
        let col = column(&values);
        match fit_outlier_bounds(&col, &OutlierSettings::default()) {
            OutlierFit::Bounds(b) => {
                assert!(matches!(b.method, BoundsMethod::ZScore { .. }));
                assert!(!b.contains(100.0));
                assert!(b.contains(5.0));
            }
            other => panic!("Expected z-score bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_values() {
        let col = column(&[1.0, 2.0]);
        assert_eq!(
            fit_outlier_bounds(&col, &OutlierSettings::default()),
            OutlierFit::TooFewValues(2)
        );
    }

    #[test]
    fn test_clamp_between_tolerates_bad_bounds() {
        assert_eq!(clamp_between(15.0, 0.0, 10.0), 10.0);
        assert_eq!(clamp_between(-3.0, 0.0, f64::INFINITY), 0.0);
        assert_eq!(clamp_between(5.0, 10.0, 0.0), 0.0);
        assert_eq!(clamp_between(5.0, f64::NAN, 3.0), 3.0);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[]), None);
    }
}
