//! Small numeric toolkit shared by the analysis modules

/// Arithmetic mean; 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); 0 with fewer than two values
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Percentile with linear interpolation between order statistics.
/// `q` is a fraction in [0, 1]. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Inverse of the standard normal CDF.
///
/// Acklam's rational approximation; relative error below 1.2e-9 over (0, 1).
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Ordinary least squares fit of `y = intercept + slope * t` over t = 0, 1, ...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; `None` when the series is constant
    pub r_squared: Option<f64>,
}

impl LinearFit {
    pub fn predict(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }
}

/// Returns `None` with fewer than two points
pub fn fit_linear_trend(ys: &[f64]) -> Option<LinearFit> {
    let n = ys.len();
    if n < 2 {
        return None;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys);

    let mut s_ty = 0.0;
    let mut s_tt = 0.0;
    for (t, y) in ys.iter().enumerate() {
        let dt = t as f64 - t_mean;
        s_ty += dt * (y - y_mean);
        s_tt += dt * dt;
    }
    let slope = s_ty / s_tt;
    let intercept = y_mean - slope * t_mean;

    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = ys
        .iter()
        .enumerate()
        .map(|(t, y)| (y - (intercept + slope * t as f64)).powi(2))
        .sum();
    let r_squared = if ss_tot > f64::EPSILON {
        Some(1.0 - ss_res / ss_tot)
    } else {
        None
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}

/// Forecast error metrics over paired actual/predicted values
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; computed over non-zero actuals only
    pub mape: Option<f64>,
}

pub fn error_metrics(actual: &[f64], predicted: &[f64]) -> Option<ErrorMetrics> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let n = actual.len() as f64;
    let mae = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let rmse = (actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / n).sqrt();

    let pct: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| a.abs() > f64::EPSILON)
        .map(|(a, p)| ((a - p) / a).abs() * 100.0)
        .collect();
    let mape = if pct.is_empty() { None } else { Some(mean(&pct)) };

    Some(ErrorMetrics { mae, rmse, mape })
}

/// Round for display
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), 5.0);
        assert!((sample_variance(&v) - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(std_dev(&[3.0]), 0.0);
    }

    #[test]
    fn percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.5), Some(3.0));
        assert_eq!(percentile(&v, 1.0), Some(5.0));
        assert!((percentile(&v, 0.95).unwrap() - 4.8).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn inverse_normal_matches_tables() {
        assert!((inverse_normal_cdf(0.5)).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.90) - 1.2815515655).abs() < 1e-6);
        assert!((inverse_normal_cdf(0.95) - 1.6448536270).abs() < 1e-6);
        assert!((inverse_normal_cdf(0.99) - 2.3263478740).abs() < 1e-6);
        assert!((inverse_normal_cdf(0.01) + 2.3263478740).abs() < 1e-6);
    }

    #[test]
    fn linear_fit_recovers_line() {
        let ys: Vec<f64> = (0..10).map(|t| 3.0 + 2.0 * t as f64).collect();
        let fit = fit_linear_trend(&ys).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.r_squared.unwrap() - 1.0).abs() < 1e-9);
        assert!((fit.predict(10.0) - 23.0).abs() < 1e-9);
    }

    #[test]
    fn constant_series_has_no_r_squared() {
        let fit = fit_linear_trend(&[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(fit.r_squared, None);
        assert!(fit_linear_trend(&[1.0]).is_none());
    }

    #[test]
    fn error_metrics_skip_zero_actuals_for_mape() {
        let m = error_metrics(&[0.0, 10.0], &[1.0, 8.0]).unwrap();
        assert!((m.mae - 1.5).abs() < 1e-12);
        assert!((m.mape.unwrap() - 20.0).abs() < 1e-12);
    }
}
