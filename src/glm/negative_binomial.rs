//! Negative binomial and logistic helpers shared by the count models
//!
//! The negative binomial is parameterized by its mean `mu` and size `theta`:
//! Var(Y) = mu + mu^2 / theta.

use statrs::function::gamma::{digamma, ln_gamma};

/// Bound on the absolute value of any linear-model coefficient
pub const MAX_COEF: f64 = 30.0;

/// Maximum eta to prevent exp() overflow
pub const MAX_ETA: f64 = 700.0;

/// Search range for ln(theta)
pub const LN_THETA_MIN: f64 = -9.210340371976182; // ln(1e-4)
pub const LN_THETA_MAX: f64 = 13.815510557964274; // ln(1e6)

/// mu = exp(eta), clamped against overflow
pub fn nb_mean(eta: f64) -> f64 {
    eta.clamp(-MAX_ETA, MAX_ETA).exp()
}

/// Log-probability of count `y` under NB(mu, theta).
///
/// Matches R's dnbinom(y, size=theta, mu=mu, log=TRUE):
///   lgamma(y + theta) - lgamma(theta) - lgamma(y + 1)
///     + theta * ln(theta / (theta + mu)) + y * ln(mu / (theta + mu))
pub fn nb_log_likelihood(y: f64, mu: f64, theta: f64) -> f64 {
    if theta <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if y == 0.0 && mu == 0.0 {
        return 0.0;
    }
    if mu <= 0.0 {
        return f64::NEG_INFINITY;
    }

    ln_gamma(y + theta) - ln_gamma(theta) - ln_gamma(y + 1.0)
        + theta * (theta / (theta + mu)).ln()
        + y * (mu / (theta + mu)).ln()
}

/// ln P(Y = 0) under NB(mu, theta)
pub fn nb_log_zero_prob(mu: f64, theta: f64) -> f64 {
    theta * (theta / (theta + mu)).ln()
}

/// d/dtheta of the NB log-likelihood of one observation
pub fn nb_theta_score(y: f64, mu: f64, theta: f64) -> f64 {
    digamma(y + theta) - digamma(theta) + theta.ln() + 1.0
        - (theta + mu).ln()
        - (y + theta) / (theta + mu)
}

/// d2/dtheta2 of the NB log-likelihood of one observation
pub fn nb_theta_hessian(y: f64, mu: f64, theta: f64) -> f64 {
    trigamma(y + theta) - trigamma(theta) + 1.0 / theta - 2.0 / (theta + mu)
        + (y + theta) / ((theta + mu) * (theta + mu))
}

/// Trigamma function via recurrence and the asymptotic series
pub fn trigamma(x: f64) -> f64 {
    if x <= 0.0 {
        return f64::NAN;
    }
    let mut x = x;
    let mut acc = 0.0;
    while x < 10.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }
    let inv = 1.0 / x;
    let t = inv * inv;
    acc + inv + 0.5 * t + inv * t * (1.0 / 6.0 - t * (1.0 / 30.0 - t * (1.0 / 42.0 - t / 30.0)))
}

/// ln(1 + exp(x)) without overflow
pub fn log1p_exp(x: f64) -> f64 {
    if x > 35.0 {
        x
    } else if x < -35.0 {
        x.exp()
    } else {
        x.exp().ln_1p()
    }
}

/// ln(exp(a) + exp(b))
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Logistic function
pub fn inv_logit(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}
