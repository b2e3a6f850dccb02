//! Per-gene likelihood ratio test between a by-condition and an intercept-only model
//!
//! Algorithm:
//! 1. Genes with at most one site, or no reads at all, are not tested
//! 2. If a condition sums to zero, add one pseudocount observation per condition
//! 3. Fit ZINB if any count is zero, NB otherwise, for both models
//! 4. LRT_stat = 2 * (logLike_full - logLike_null)
//! 5. pvalue = pchisq(LRT_stat, df = params_full - params_null, lower.tail = FALSE)
//!
//! Genes that cannot be tested get p = 1 and a status describing why.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::pvalue::chi_squared_sf;
use crate::data::MeltedGene;
use crate::glm::{FitError, FittedModel, ModelFamily, ModelFitter, ModelSpec};

/// p-value recorded for genes without a valid test
pub const UNTESTABLE_PVALUE: f64 = 1.0;

/// Outcome of the significance test for one gene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    Tested,
    InsufficientSites,
    NoCounts,
    ModelError(String),
    UndefinedPvalues,
}

impl TestStatus {
    /// Whether the p-value comes from an actual likelihood ratio test
    pub fn is_testable(&self) -> bool {
        matches!(self, TestStatus::Tested)
    }

    /// Parse the text of a status column
    pub fn from_label(label: &str) -> Self {
        match label {
            "-" => TestStatus::Tested,
            "insufficient sites" => TestStatus::InsufficientSites,
            "no counts in any condition" => TestStatus::NoCounts,
            "has coefficients but undefined p-values" => TestStatus::UndefinedPvalues,
            other => TestStatus::ModelError(other.to_string()),
        }
    }

    /// Short key used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            TestStatus::Tested => "tested",
            TestStatus::InsufficientSites => "insufficient_sites",
            TestStatus::NoCounts => "no_counts",
            TestStatus::ModelError(_) => "model_error",
            TestStatus::UndefinedPvalues => "undefined_pvalues",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Tested => write!(f, "-"),
            TestStatus::InsufficientSites => write!(f, "insufficient sites"),
            TestStatus::NoCounts => write!(f, "no counts in any condition"),
            TestStatus::ModelError(msg) => write!(f, "{}", msg),
            TestStatus::UndefinedPvalues => write!(f, "has coefficients but undefined p-values"),
        }
    }
}

/// p-value and status of one gene
#[derive(Debug, Clone, PartialEq)]
pub struct GeneTestResult {
    pub pvalue: f64,
    pub status: TestStatus,
}

impl GeneTestResult {
    fn untestable(status: TestStatus) -> Self {
        Self {
            pvalue: UNTESTABLE_PVALUE,
            status,
        }
    }
}

/// LRT p-value of a full model against its nested null model
pub fn likelihood_ratio_test(full: &FittedModel, null: &FittedModel) -> f64 {
    let stat = 2.0 * (full.log_likelihood - null.log_likelihood);
    let df = full.n_params as f64 - null.n_params as f64;
    chi_squared_sf(stat, df)
}

/// Runs the per-gene test against a model-fitting backend.
///
/// Shared across worker threads. Calls into a backend that reports itself
/// as not reentrant are serialized through an internal lock.
pub struct SignificanceTest<'a> {
    fitter: &'a dyn ModelFitter,
    sat_adjust: bool,
    lock: Mutex<()>,
}

impl<'a> SignificanceTest<'a> {
    pub fn new(fitter: &'a dyn ModelFitter, sat_adjust: bool) -> Self {
        Self {
            fitter,
            sat_adjust,
            lock: Mutex::new(()),
        }
    }

    fn fit(&self, data: &MeltedGene, spec: &ModelSpec) -> Result<FittedModel, FitError> {
        if self.fitter.is_reentrant() {
            self.fitter.fit(data, spec)
        } else {
            let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.fitter.fit(data, spec)
        }
    }

    /// Test one gene given its site count and melted observations
    pub fn zinb_signif(&self, n_sites: usize, mut melted: MeltedGene) -> GeneTestResult {
        if n_sites <= 1 {
            return GeneTestResult::untestable(TestStatus::InsufficientSites);
        }
        if melted.total_count() == 0 {
            return GeneTestResult::untestable(TestStatus::NoCounts);
        }

        if melted.add_pseudocounts_if_singular() {
            log::debug!("added pseudocounts for a condition with no reads");
        }

        let family = ModelFamily::for_min_count(melted.min_count().unwrap_or(0));
        let full_spec = ModelSpec::full(family, self.sat_adjust);
        let null_spec = ModelSpec::null(family, self.sat_adjust);

        let fits = self
            .fit(&melted, &full_spec)
            .and_then(|full| self.fit(&melted, &null_spec).map(|null| (full, null)));
        let (full, null) = match fits {
            Ok(pair) => pair,
            Err(e) => {
                log::debug!("{} fit failed: {}", self.fitter.name(), e);
                return GeneTestResult::untestable(TestStatus::ModelError(e.to_string()));
            }
        };

        if full.count_pvalues.iter().all(|p| !p.is_finite()) {
            return GeneTestResult::untestable(TestStatus::UndefinedPvalues);
        }

        GeneTestResult {
            pvalue: likelihood_ratio_test(&full, &null),
            status: TestStatus::Tested,
        }
    }
}
