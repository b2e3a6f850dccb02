//! Count-model fitting for the per-gene significance test
//!
//! The significance engine only talks to the [`ModelFitter`] trait. The
//! crate ships one backend, [`NativeFitter`], which fits negative binomial
//! and zero-inflated negative binomial models by maximum likelihood.

mod fitting;
mod native;
mod negative_binomial;
mod zinb;

use thiserror::Error;

use crate::data::MeltedGene;

pub use fitting::FitParams;
pub use native::NativeFitter;
pub use negative_binomial::{nb_log_likelihood, nb_mean, MAX_COEF};

/// Distribution family of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    NegativeBinomial,
    ZeroInflatedNegativeBinomial,
}

impl ModelFamily {
    /// ZINB when any count is zero, NB otherwise
    pub fn for_min_count(min_count: u64) -> Self {
        if min_count == 0 {
            ModelFamily::ZeroInflatedNegativeBinomial
        } else {
            ModelFamily::NegativeBinomial
        }
    }
}

/// Right-hand side of the model formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTerms {
    /// One coefficient per condition level (full model)
    ByCondition,
    /// A single intercept (null model)
    InterceptOnly,
}

/// What to fit: family, terms, and whether per-replicate offsets apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub family: ModelFamily,
    pub terms: ModelTerms,
    /// ln(NZmean) offset on the count part, logit(Zperc) on the zero part
    pub use_offsets: bool,
}

impl ModelSpec {
    pub fn full(family: ModelFamily, use_offsets: bool) -> Self {
        Self {
            family,
            terms: ModelTerms::ByCondition,
            use_offsets,
        }
    }

    pub fn null(family: ModelFamily, use_offsets: bool) -> Self {
        Self {
            family,
            terms: ModelTerms::InterceptOnly,
            use_offsets,
        }
    }
}

/// Summary of one fitted model
#[derive(Debug, Clone)]
pub struct FittedModel {
    /// Count-part coefficients (log scale), one per term
    pub count_coefficients: Vec<f64>,
    /// Wald p-values of the count-part coefficients, NaN when undefined
    pub count_pvalues: Vec<f64>,
    /// Zero-part coefficients (logit scale), empty for NB
    pub zero_coefficients: Vec<f64>,
    /// NB size parameter
    pub theta: f64,
    pub log_likelihood: f64,
    /// Estimated parameters including theta
    pub n_params: usize,
    pub converged: bool,
}

/// Failure of a single model fit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("no observations to fit")]
    EmptyObservations,

    #[error("invalid design: {reason}")]
    InvalidDesign { reason: String },

    #[error("log-likelihood is not finite")]
    NonFiniteLikelihood,

    #[error("fitted coefficients are not finite")]
    NonFiniteCoefficients,

    #[error("{0}")]
    Backend(String),
}

/// A backend able to fit the NB and ZINB models of the significance test.
///
/// Backends that are not safe to call concurrently return `false` from
/// [`ModelFitter::is_reentrant`]; the engine then serializes their calls.
pub trait ModelFitter: Send + Sync {
    fn fit(&self, data: &MeltedGene, spec: &ModelSpec) -> Result<FittedModel, FitError>;

    fn is_reentrant(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}
