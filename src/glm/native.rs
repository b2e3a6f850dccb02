//! In-process NB / ZINB backend for the significance test

use super::fitting::{fit_nb_groups, group_information, FitParams, GroupDesign};
use super::zinb::fit_zinb_groups;
use super::{FitError, FittedModel, ModelFamily, ModelFitter, ModelSpec, ModelTerms};
use crate::data::MeltedGene;
use crate::testing::calculate_pvalue;

/// Native maximum-likelihood fitter.
///
/// Holds no mutable state, so concurrent calls are safe.
#[derive(Debug, Clone, Default)]
pub struct NativeFitter {
    params: FitParams,
}

impl NativeFitter {
    pub fn new(params: FitParams) -> Self {
        Self { params }
    }
}

/// Two-sided Wald p-value of a coefficient given its expected information
fn wald_pvalue(coef: f64, information: f64) -> f64 {
    if !(information > 0.0) || !information.is_finite() || !coef.is_finite() {
        return f64::NAN;
    }
    calculate_pvalue(coef * information.sqrt())
}

impl ModelFitter for NativeFitter {
    fn name(&self) -> &str {
        "native"
    }

    fn fit(&self, data: &MeltedGene, spec: &ModelSpec) -> Result<FittedModel, FitError> {
        if data.is_empty() {
            return Err(FitError::EmptyObservations);
        }

        let (groups, n_groups) = match spec.terms {
            ModelTerms::ByCondition => (data.groups.clone(), data.n_groups()),
            ModelTerms::InterceptOnly => (vec![0; data.len()], 1),
        };
        if let Some(&bad) = groups.iter().find(|&&g| g >= n_groups) {
            return Err(FitError::InvalidDesign {
                reason: format!("condition index {} out of range", bad),
            });
        }

        let y: Vec<f64> = data.counts.iter().map(|&c| c as f64).collect();
        let (count_offset, zero_offset): (Vec<f64>, Vec<f64>) = if spec.use_offsets {
            if let Some(bad) = data.nz_mean.iter().find(|&&m| !(m > 0.0) || !m.is_finite()) {
                return Err(FitError::InvalidDesign {
                    reason: format!("non-positive exposure {}", bad),
                });
            }
            (
                data.nz_mean.iter().map(|m| m.ln()).collect(),
                data.logit_zero_perc.clone(),
            )
        } else {
            (vec![0.0; data.len()], vec![0.0; data.len()])
        };

        let design = GroupDesign::new(&y, &count_offset, &groups, n_groups);

        let fitted = match spec.family {
            ModelFamily::NegativeBinomial => {
                let weights = vec![1.0; y.len()];
                let nb = fit_nb_groups(&design, &weights, None, &self.params);
                let info = group_information(&design, &weights, &nb.beta, nb.theta);
                FittedModel {
                    count_pvalues: nb
                        .beta
                        .iter()
                        .zip(info.iter())
                        .map(|(&b, &i)| wald_pvalue(b, i))
                        .collect(),
                    count_coefficients: nb.beta,
                    zero_coefficients: Vec::new(),
                    theta: nb.theta,
                    log_likelihood: nb.log_likelihood,
                    n_params: n_groups + 1,
                    converged: nb.converged,
                }
            }
            ModelFamily::ZeroInflatedNegativeBinomial => {
                let fit = fit_zinb_groups(&design, &groups, &zero_offset, &self.params);
                let info = group_information(&design, &fit.count_weights, &fit.beta, fit.theta);
                FittedModel {
                    count_pvalues: fit
                        .beta
                        .iter()
                        .zip(info.iter())
                        .map(|(&b, &i)| wald_pvalue(b, i))
                        .collect(),
                    count_coefficients: fit.beta,
                    zero_coefficients: fit.gamma,
                    theta: fit.theta,
                    log_likelihood: fit.log_likelihood,
                    n_params: 2 * n_groups + 1,
                    converged: fit.converged,
                }
            }
        };

        if !fitted.log_likelihood.is_finite() {
            return Err(FitError::NonFiniteLikelihood);
        }
        if fitted
            .count_coefficients
            .iter()
            .chain(fitted.zero_coefficients.iter())
            .any(|c| !c.is_finite())
            || !fitted.theta.is_finite()
        {
            return Err(FitError::NonFiniteCoefficients);
        }
        if !fitted.converged {
            log::debug!(
                "{:?} fit stopped after {} iterations without converging",
                spec.family,
                self.params.max_iter
            );
        }

        Ok(fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn melted(counts: Vec<u64>, groups: Vec<usize>) -> MeltedGene {
        let n = counts.len();
        MeltedGene {
            counts,
            groups,
            nz_mean: vec![20.0; n],
            logit_zero_perc: vec![-1.0; n],
            levels: vec!["A".to_string(), "B".to_string()],
        }
    }

    #[test]
    fn test_parameter_counts() {
        let data = melted(vec![5, 0, 7, 3, 0, 9, 12, 0], vec![0, 0, 0, 0, 1, 1, 1, 1]);
        let fitter = NativeFitter::default();

        let nb_full = fitter.fit(&data, &ModelSpec::full(ModelFamily::NegativeBinomial, true)).unwrap();
        let nb_null = fitter.fit(&data, &ModelSpec::null(ModelFamily::NegativeBinomial, true)).unwrap();
        assert_eq!(nb_full.n_params, 3);
        assert_eq!(nb_null.n_params, 2);

        let zi_full = fitter
            .fit(&data, &ModelSpec::full(ModelFamily::ZeroInflatedNegativeBinomial, true))
            .unwrap();
        let zi_null = fitter
            .fit(&data, &ModelSpec::null(ModelFamily::ZeroInflatedNegativeBinomial, true))
            .unwrap();
        assert_eq!(zi_full.n_params, 5);
        assert_eq!(zi_null.n_params, 3);
        assert_eq!(zi_full.zero_coefficients.len(), 2);
        assert_eq!(zi_full.count_pvalues.len(), 2);
    }

    #[test]
    fn test_full_model_not_worse_than_null() {
        let data = melted(
            vec![10, 12, 9, 11, 10, 40, 38, 45, 41, 39],
            vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        );
        let fitter = NativeFitter::default();
        let full = fitter.fit(&data, &ModelSpec::full(ModelFamily::NegativeBinomial, true)).unwrap();
        let null = fitter.fit(&data, &ModelSpec::null(ModelFamily::NegativeBinomial, true)).unwrap();
        assert!(full.log_likelihood >= null.log_likelihood - 1e-9);
        assert!(full.count_pvalues.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_iteration_limit_comes_from_fitter() {
        let data = melted(
            vec![10, 12, 9, 11, 10, 40, 38, 45, 41, 39],
            vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        );
        let spec = ModelSpec::full(ModelFamily::NegativeBinomial, true);

        let capped = NativeFitter::new(FitParams { max_iter: 0, tol: 1e-8 });
        assert!(!capped.fit(&data, &spec).unwrap().converged);
        assert!(NativeFitter::default().fit(&data, &spec).unwrap().converged);
    }

    #[test]
    fn test_empty_observations_fail() {
        let data = melted(Vec::new(), Vec::new());
        let res = NativeFitter::default().fit(&data, &ModelSpec::full(ModelFamily::NegativeBinomial, true));
        assert!(matches!(res, Err(FitError::EmptyObservations)));
    }

    #[test]
    fn test_wald_pvalue_edge_cases() {
        assert!(wald_pvalue(1.0, 0.0).is_nan());
        assert!(wald_pvalue(f64::NAN, 4.0).is_nan());
        assert!((wald_pvalue(0.0, 4.0) - 1.0).abs() < 1e-12);
    }
}
