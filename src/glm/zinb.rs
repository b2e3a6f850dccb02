//! Zero-inflated negative binomial fitting by EM
//!
//! Each observation is either a structural zero (probability pi) or a draw
//! from NB(mu, theta). Both parts use the same group design:
//!   ln(mu_i)      = beta[group(i)]  + count_offset(i)
//!   logit(pi_i)   = gamma[group(i)] + zero_offset(i)
//!
//! EM alternates:
//! - E-step: z_i = P(structural zero | y_i), nonzero counts have z_i = 0
//! - M-step: weighted logistic fit of gamma on z, weighted NB fit of
//!   (beta, theta) with weights 1 - z

use super::fitting::{fit_nb_groups, FitParams, GroupDesign, NbFit};
use super::negative_binomial::{
    inv_logit, log1p_exp, log_add_exp, nb_log_likelihood, nb_log_zero_prob, nb_mean, MAX_COEF,
};

/// Inner NB iterations per M-step
const M_STEP_NB_ITER: usize = 3;

/// Result of a ZINB fit
#[derive(Debug, Clone)]
pub(crate) struct ZinbFit {
    pub beta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub theta: f64,
    pub log_likelihood: f64,
    /// Final weights of the count component (1 - z)
    pub count_weights: Vec<f64>,
    pub converged: bool,
}

/// Linear predictor of the zero component
fn zero_eta(gamma: &[f64], groups: &[usize], zero_offset: &[f64], i: usize) -> f64 {
    gamma[groups[i]] + zero_offset[i]
}

/// Observed-data ZINB log-likelihood
pub(crate) fn zinb_log_likelihood(
    design: &GroupDesign,
    groups: &[usize],
    zero_offset: &[f64],
    beta: &[f64],
    gamma: &[f64],
    theta: f64,
) -> f64 {
    (0..design.y.len())
        .map(|i| {
            let y = design.y[i];
            let mu = nb_mean(beta[groups[i]] + design.offset[i]);
            let eta = zero_eta(gamma, groups, zero_offset, i);
            let ln_pi = -log1p_exp(-eta);
            let ln_1m_pi = -log1p_exp(eta);
            if y == 0.0 {
                log_add_exp(ln_pi, ln_1m_pi + nb_log_zero_prob(mu, theta))
            } else {
                ln_1m_pi + nb_log_likelihood(y, mu, theta)
            }
        })
        .sum()
}

/// Posterior probability that each observation is a structural zero
fn e_step(
    design: &GroupDesign,
    groups: &[usize],
    zero_offset: &[f64],
    beta: &[f64],
    gamma: &[f64],
    theta: f64,
) -> Vec<f64> {
    (0..design.y.len())
        .map(|i| {
            if design.y[i] > 0.0 {
                return 0.0;
            }
            let mu = nb_mean(beta[groups[i]] + design.offset[i]);
            let eta = zero_eta(gamma, groups, zero_offset, i);
            let ln_pi = -log1p_exp(-eta);
            let ln_nb_zero = -log1p_exp(eta) + nb_log_zero_prob(mu, theta);
            (ln_pi - log_add_exp(ln_pi, ln_nb_zero)).exp()
        })
        .collect()
}

/// Newton fit of one logistic coefficient per group against soft targets `z`
pub(crate) fn fit_logistic_groups(
    z: &[f64],
    members: &[Vec<usize>],
    zero_offset: &[f64],
    gamma: &mut [f64],
) {
    for (g, idx) in members.iter().enumerate() {
        // no interior optimum when every target sits at the same extreme
        if idx.iter().all(|&i| z[i] <= 0.0) {
            gamma[g] = -MAX_COEF;
            continue;
        }
        if idx.iter().all(|&i| z[i] >= 1.0) {
            gamma[g] = MAX_COEF;
            continue;
        }
        let mut c = gamma[g];
        for _ in 0..50 {
            let mut score = 0.0;
            let mut info = 0.0;
            for &i in idx {
                let pi = inv_logit(c + zero_offset[i]);
                score += z[i] - pi;
                info += pi * (1.0 - pi);
            }
            if score == 0.0 {
                break;
            }
            // flat likelihood: full-length step in the score's direction
            let step = if info > 1e-12 {
                (score / info).clamp(-5.0, 5.0)
            } else {
                score.signum() * 5.0
            };
            let next = (c + step).clamp(-MAX_COEF, MAX_COEF);
            let moved = (next - c).abs();
            c = next;
            if moved < 1e-10 {
                break;
            }
        }
        gamma[g] = c;
    }
}

/// Fit a ZINB model, starting from an NB fit and a logistic fit of the zero indicator
pub(crate) fn fit_zinb_groups(
    design: &GroupDesign,
    groups: &[usize],
    zero_offset: &[f64],
    params: &FitParams,
) -> ZinbFit {
    let n = design.y.len();
    let n_groups = design.n_groups();

    let ones = vec![1.0; n];
    let start: NbFit = fit_nb_groups(design, &ones, None, params);
    let mut beta = start.beta;
    let mut theta = start.theta;

    let is_zero: Vec<f64> = design
        .y
        .iter()
        .map(|&y| if y == 0.0 { 1.0 } else { 0.0 })
        .collect();
    let mut gamma = vec![0.0; n_groups];
    fit_logistic_groups(&is_zero, &design.members, zero_offset, &mut gamma);

    let mut ll = zinb_log_likelihood(design, groups, zero_offset, &beta, &gamma, theta);
    let mut weights = ones;
    let mut converged = false;
    let inner = FitParams {
        max_iter: M_STEP_NB_ITER,
        tol: params.tol,
    };

    for iter in 0..params.max_iter {
        let z = e_step(design, groups, zero_offset, &beta, &gamma, theta);
        fit_logistic_groups(&z, &design.members, zero_offset, &mut gamma);

        weights = z.iter().map(|&zi| 1.0 - zi).collect();
        let nb = fit_nb_groups(design, &weights, Some((&beta, theta)), &inner);
        beta = nb.beta;
        theta = nb.theta;

        let new_ll = zinb_log_likelihood(design, groups, zero_offset, &beta, &gamma, theta);
        let change = (new_ll - ll).abs() / (new_ll.abs() + params.tol);
        ll = new_ll;
        if change < params.tol {
            log::trace!("ZINB EM converged after {} iterations", iter + 1);
            converged = true;
            break;
        }
    }

    ZinbFit {
        beta,
        gamma,
        theta,
        log_likelihood: ll,
        count_weights: weights,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logistic_groups_recovers_proportion() {
        // group 0: 1 of 4 zeros, group 1: 3 of 4 zeros
        let z = [1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let members = vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]];
        let offset = [0.0; 8];
        let mut gamma = vec![0.0; 2];
        fit_logistic_groups(&z, &members, &offset, &mut gamma);

        assert!((inv_logit(gamma[0]) - 0.25).abs() < 1e-8);
        assert!((inv_logit(gamma[1]) - 0.75).abs() < 1e-8);
    }

    #[test]
    fn test_logistic_groups_no_zeros_goes_to_bound() {
        let z = [0.0; 4];
        let members = vec![vec![0, 1, 2, 3]];
        let mut gamma = vec![0.0];
        fit_logistic_groups(&z, &members, &[0.0; 4], &mut gamma);
        assert_eq!(gamma[0], -MAX_COEF);
    }

    #[test]
    fn test_logistic_groups_all_zeros_goes_to_upper_bound() {
        // second group is all structural zeros; first keeps an interior fit
        let z = [1.0, 0.0, 1.0, 1.0, 1.0];
        let members = vec![vec![0, 1], vec![2, 3, 4]];
        let mut gamma = vec![0.0, 0.0];
        fit_logistic_groups(&z, &members, &[0.0; 5], &mut gamma);
        assert!((inv_logit(gamma[0]) - 0.5).abs() < 1e-8);
        assert_eq!(gamma[1], MAX_COEF);
    }

    #[test]
    fn test_logistic_groups_flat_start_follows_score() {
        // start deep in the tail where pi(1 - pi) underflows the information guard
        let z = [0.0, 0.0, 0.0, 1e-3];
        let members = vec![vec![0, 1, 2, 3]];
        let mut gamma = vec![-29.2];
        fit_logistic_groups(&z, &members, &[0.0; 4], &mut gamma);
        assert!((inv_logit(gamma[0]) - 2.5e-4).abs() < 1e-8);
    }

    #[test]
    fn test_zinb_beats_nb_on_excess_zeros() {
        // half structural zeros, the rest around 50
        let y: Vec<f64> = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 48.0, 52.0, 55.0, 45.0, 50.0, 47.0,
            53.0, 51.0, 49.0, 50.0,
        ];
        let groups = vec![0; y.len()];
        let offset = vec![0.0; y.len()];
        let design = GroupDesign::new(&y, &offset, &groups, 1);

        let zinb = fit_zinb_groups(&design, &groups, &offset, &FitParams::default());
        let nb = fit_nb_groups(&design, &vec![1.0; y.len()], None, &FitParams::default());

        assert!(zinb.log_likelihood.is_finite());
        assert!(zinb.log_likelihood > nb.log_likelihood);
        // count component mean near 50, zero probability near one half
        assert!((zinb.beta[0].exp() - 50.0).abs() < 2.0);
        assert!((inv_logit(zinb.gamma[0]) - 0.5).abs() < 0.05);
    }
}
