//! P-value calculation from test statistics

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

/// Two-sided p-value of a standard normal statistic
pub fn calculate_pvalue(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }

    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.cdf(-z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail chi-squared probability of `stat` with `df` degrees of freedom.
///
/// Small negative statistics from optimizer noise are treated as 0.
pub fn chi_squared_sf(stat: f64, df: f64) -> f64 {
    if !stat.is_finite() || !(df > 0.0) {
        return f64::NAN;
    }

    match ChiSquared::new(df) {
        Ok(chi2) => chi2.sf(stat.max(0.0)),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = calculate_pvalue(2.0);
        let p2 = calculate_pvalue(-2.0);
        assert!((p1 - p2).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_zero() {
        assert!((calculate_pvalue(0.0) - 1.0).abs() < 1e-10);
        assert!(calculate_pvalue(f64::INFINITY).is_nan());
    }

    #[test]
    fn test_chi_squared_known_values() {
        // 95th percentile of chi2(1) and chi2(2)
        assert_relative_eq!(chi_squared_sf(3.841458820694124, 1.0), 0.05, epsilon = 1e-9);
        assert_relative_eq!(chi_squared_sf(5.991464547107979, 2.0), 0.05, epsilon = 1e-9);
        assert_relative_eq!(chi_squared_sf(0.0, 1.0), 1.0);
    }

    #[test]
    fn test_chi_squared_edge_cases() {
        assert_relative_eq!(chi_squared_sf(-1e-9, 1.0), 1.0);
        assert!(chi_squared_sf(f64::NAN, 1.0).is_nan());
        assert!(chi_squared_sf(2.0, 0.0).is_nan());
    }
}
