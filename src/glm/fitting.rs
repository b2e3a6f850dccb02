//! Weighted negative binomial fitting for condition-group designs
//!
//! Every design used by the significance test is a set of disjoint groups:
//! one group per condition for the full model, a single group for the
//! intercept-only model. The linear predictor of observation i is
//! `beta[group(i)] + offset(i)`, so each coefficient only sees its own
//! group's observations and can be updated with a one-dimensional Newton
//! step. The size parameter theta is shared and updated on the ln scale.
//!
//! Algorithm:
//! 1. Start from the weighted Poisson solution beta_g = ln(sum w*y / sum w*exp(offset))
//!    and a moment estimate of theta
//! 2. Newton steps for each beta_g given theta (concave in the linear predictor)
//! 3. Newton steps for ln(theta) given beta, with step halving
//! 4. Repeat 2-3 until the log-likelihood changes by less than `tol`

use serde::{Deserialize, Serialize};

use super::negative_binomial::{
    nb_log_likelihood, nb_mean, nb_theta_hessian, nb_theta_score, LN_THETA_MAX, LN_THETA_MIN,
    MAX_COEF,
};

/// Iteration controls for the native fitters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    /// Maximum outer iterations (alternations for NB, EM steps for ZINB)
    pub max_iter: usize,
    /// Relative log-likelihood convergence tolerance
    pub tol: f64,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol: 1e-8,
        }
    }
}

/// Observations split into disjoint coefficient groups
pub(crate) struct GroupDesign<'a> {
    pub y: &'a [f64],
    pub offset: &'a [f64],
    /// Observation indices of each group
    pub members: Vec<Vec<usize>>,
}

impl<'a> GroupDesign<'a> {
    pub fn new(y: &'a [f64], offset: &'a [f64], groups: &[usize], n_groups: usize) -> Self {
        let mut members = vec![Vec::new(); n_groups];
        for (i, &g) in groups.iter().enumerate() {
            members[g].push(i);
        }
        Self { y, offset, members }
    }

    pub fn n_groups(&self) -> usize {
        self.members.len()
    }

    /// Fitted means for coefficients `beta`
    pub fn mu(&self, beta: &[f64]) -> Vec<f64> {
        let mut mu = vec![0.0; self.y.len()];
        for (g, idx) in self.members.iter().enumerate() {
            for &i in idx {
                mu[i] = nb_mean(beta[g] + self.offset[i]);
            }
        }
        mu
    }
}

/// Result of a weighted NB fit
#[derive(Debug, Clone)]
pub(crate) struct NbFit {
    pub beta: Vec<f64>,
    pub theta: f64,
    /// Weighted log-likelihood
    pub log_likelihood: f64,
    pub converged: bool,
}

/// Weighted NB log-likelihood
pub(crate) fn weighted_nb_log_likelihood(y: &[f64], mu: &[f64], weights: &[f64], theta: f64) -> f64 {
    y.iter()
        .zip(mu.iter())
        .zip(weights.iter())
        .filter(|(_, &w)| w > 0.0)
        .map(|((&yi, &mi), &w)| w * nb_log_likelihood(yi, mi, theta))
        .sum()
}

/// Fit a weighted NB model on a group design.
///
/// `init` warm-starts from previous coefficients and theta.
pub(crate) fn fit_nb_groups(
    design: &GroupDesign,
    weights: &[f64],
    init: Option<(&[f64], f64)>,
    params: &FitParams,
) -> NbFit {
    let (mut beta, mut theta) = match init {
        Some((b, t)) => (b.to_vec(), t),
        None => {
            let beta = poisson_start(design, weights);
            let mu = design.mu(&beta);
            (beta, moment_theta(design.y, &mu, weights))
        }
    };

    let mut mu = design.mu(&beta);
    let mut ll = weighted_nb_log_likelihood(design.y, &mu, weights, theta);
    let mut converged = false;

    for _iter in 0..params.max_iter {
        for g in 0..design.n_groups() {
            beta[g] = newton_group_beta(design, weights, g, beta[g], theta);
        }
        mu = design.mu(&beta);
        theta = newton_theta(design.y, &mu, weights, theta);

        let new_ll = weighted_nb_log_likelihood(design.y, &mu, weights, theta);
        let change = (new_ll - ll).abs() / (new_ll.abs() + params.tol);
        ll = new_ll;
        if change < params.tol {
            converged = true;
            break;
        }
    }

    NbFit {
        beta,
        theta,
        log_likelihood: ll,
        converged,
    }
}

/// Expected information of each group coefficient, sum w * mu * theta / (theta + mu)
pub(crate) fn group_information(
    design: &GroupDesign,
    weights: &[f64],
    beta: &[f64],
    theta: f64,
) -> Vec<f64> {
    design
        .members
        .iter()
        .enumerate()
        .map(|(g, idx)| {
            idx.iter()
                .map(|&i| {
                    let mu = nb_mean(beta[g] + design.offset[i]);
                    weights[i] * mu * theta / (theta + mu)
                })
                .sum()
        })
        .collect()
}

/// Weighted Poisson MLE per group
fn poisson_start(design: &GroupDesign, weights: &[f64]) -> Vec<f64> {
    design
        .members
        .iter()
        .map(|idx| {
            let wy: f64 = idx.iter().map(|&i| weights[i] * design.y[i]).sum();
            let wexp: f64 = idx.iter().map(|&i| weights[i] * nb_mean(design.offset[i])).sum();
            if wy > 0.0 && wexp > 0.0 {
                (wy / wexp).ln().clamp(-MAX_COEF, MAX_COEF)
            } else {
                -MAX_COEF
            }
        })
        .collect()
}

/// Method-of-moments theta, Var = mu + mu^2/theta
fn moment_theta(y: &[f64], mu: &[f64], weights: &[f64]) -> f64 {
    let mut num = 0.0;
    let mut den = 0.0;
    for ((&yi, &mi), &w) in y.iter().zip(mu.iter()).zip(weights.iter()) {
        num += w * mi * mi;
        den += w * ((yi - mi).powi(2) - mi);
    }
    let theta = if den > 0.0 && num > 0.0 {
        num / den
    } else {
        LN_THETA_MAX.exp()
    };
    theta.clamp(LN_THETA_MIN.exp(), LN_THETA_MAX.exp())
}

/// Log-likelihood contribution of one group as a function of its coefficient
fn group_log_likelihood(design: &GroupDesign, weights: &[f64], g: usize, b: f64, theta: f64) -> f64 {
    design.members[g]
        .iter()
        .filter(|&&i| weights[i] > 0.0)
        .map(|&i| weights[i] * nb_log_likelihood(design.y[i], nb_mean(b + design.offset[i]), theta))
        .sum()
}

/// Newton iterations for one group coefficient, with step halving
fn newton_group_beta(design: &GroupDesign, weights: &[f64], g: usize, start: f64, theta: f64) -> f64 {
    let mut b = start;
    let mut ll = group_log_likelihood(design, weights, g, b, theta);

    for _ in 0..25 {
        let mut score = 0.0;
        let mut info = 0.0;
        for &i in &design.members[g] {
            let w = weights[i];
            if w <= 0.0 {
                continue;
            }
            let y = design.y[i];
            let mu = nb_mean(b + design.offset[i]);
            let denom = theta + mu;
            score += w * theta * (y - mu) / denom;
            info += w * theta * mu * (theta + y) / (denom * denom);
        }
        if !(info > 0.0) || !score.is_finite() {
            break;
        }

        let mut step = (score / info).clamp(-5.0, 5.0);
        let mut accepted = false;
        for _ in 0..30 {
            let candidate = (b + step).clamp(-MAX_COEF, MAX_COEF);
            let cand_ll = group_log_likelihood(design, weights, g, candidate, theta);
            if cand_ll >= ll {
                let moved = (candidate - b).abs();
                b = candidate;
                ll = cand_ll;
                accepted = moved > 0.0;
                break;
            }
            step *= 0.5;
        }
        if !accepted || step.abs() < 1e-10 {
            break;
        }
    }

    b
}

/// Newton iterations for ln(theta) given fitted means, with step halving
fn newton_theta(y: &[f64], mu: &[f64], weights: &[f64], start: f64) -> f64 {
    let mut phi = start.ln().clamp(LN_THETA_MIN, LN_THETA_MAX);
    let mut ll = weighted_nb_log_likelihood(y, mu, weights, phi.exp());

    for _ in 0..30 {
        let theta = phi.exp();
        let mut g = 0.0;
        let mut h = 0.0;
        for ((&yi, &mi), &w) in y.iter().zip(mu.iter()).zip(weights.iter()) {
            if w > 0.0 {
                g += w * nb_theta_score(yi, mi, theta);
                h += w * nb_theta_hessian(yi, mi, theta);
            }
        }

        // derivatives with respect to phi = ln(theta)
        let d1 = theta * g;
        let d2 = theta * theta * h + theta * g;
        if !d1.is_finite() || !d2.is_finite() {
            break;
        }

        let mut step = if d2 < 0.0 { -d1 / d2 } else { d1.signum() };
        step = step.clamp(-2.0, 2.0);

        let mut accepted = false;
        for _ in 0..30 {
            let candidate = (phi + step).clamp(LN_THETA_MIN, LN_THETA_MAX);
            let cand_ll = weighted_nb_log_likelihood(y, mu, weights, candidate.exp());
            if cand_ll >= ll {
                accepted = candidate != phi;
                phi = candidate;
                ll = cand_ll;
                break;
            }
            step *= 0.5;
        }
        if !accepted || step.abs() < 1e-8 {
            break;
        }
    }

    phi.exp()
}
