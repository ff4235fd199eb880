//! Final variance-component fit of the accepted QTL set.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lmm::{FitStatus, KinshipList, VarianceComponentFit};
use crate::model::{KinshipTensor, Response};

use super::TraitResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QtlVariance {
    pub marker: usize,
    pub variance: f64,
    /// Share of the total variance explained by this QTL.
    pub h2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QtlModelFit {
    pub qtls: Vec<QtlVariance>,
    pub sigma2_e: f64,
    /// Sum of the per-QTL shares.
    pub h2: f64,
    pub intercept: f64,
    pub log_likelihood: f64,
    pub status: FitStatus,
}

/// Fit one variance component per accepted QTL of `result`.
///
/// `kinship` must already be restricted to the individuals of
/// `response`.
pub fn fit_qtl_model<F: VarianceComponentFit + ?Sized>(
    fitter: &F,
    response: &Response,
    kinship: &KinshipTensor,
    result: &TraitResult,
) -> Result<QtlModelFit> {
    let markers = result.qtls.markers();
    let list = KinshipList::background(kinship, &markers, false);
    let fit = fitter.fit(response, &list)?;

    let total = fit.sigma2.iter().sum::<f64>() + fit.sigma2_e;
    let qtls: Vec<QtlVariance> = markers
        .iter()
        .zip(fit.sigma2.iter())
        .map(|(&marker, &variance)| QtlVariance {
            marker,
            variance,
            h2: variance / total,
        })
        .collect();

    Ok(QtlModelFit {
        h2: qtls.iter().map(|q| q.h2).sum(),
        qtls,
        sigma2_e: fit.sigma2_e,
        intercept: fit.beta.first().copied().unwrap_or_default(),
        log_likelihood: fit.log_likelihood,
        status: fit.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lmm::AiReml;
    use crate::result::{QtlRecord, QtlTable};
    use crate::search::Thresholds;
    use remim_linalg::DenseMatrix;

    fn trait_result(markers: &[usize]) -> TraitResult {
        TraitResult {
            pheno_col: "T1".into(),
            statistic: vec![],
            pvalue: vec![],
            qtls: QtlTable::new(
                markers
                    .iter()
                    .map(|&m| QtlRecord {
                        lg: "LG1".into(),
                        position_cm: m as f64,
                        marker: m,
                        statistic: 10.0,
                        pvalue: 1e-6,
                    })
                    .collect(),
            ),
            lower: None,
            upper: None,
            thresholds: Thresholds { forward: 0.01, backward: 0.001 },
            rounds: 1,
            model_fit: None,
        }
    }

    #[test]
    fn test_empty_table_is_all_residual() {
        let response = Response::new(vec![1.0, 3.0, 2.0, 5.0, 4.0], None, (0..5).collect()).unwrap();
        let kinship = KinshipTensor::new(vec![DenseMatrix::identity(5)]).unwrap();
        let fit = fit_qtl_model(&AiReml::default(), &response, &kinship, &trait_result(&[])).unwrap();
        assert!(fit.qtls.is_empty());
        assert_eq!(fit.h2, 0.0);
        assert!((fit.sigma2_e - 2.5).abs() < 1e-10);
        assert!((fit.intercept - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_shares_sum_below_one() {
        let n = 40;
        let family = DenseMatrix::from_fn(n, n, |i, j| if i / 5 == j / 5 { 1.0 } else { 0.0 });
        let y: Vec<f64> = (0..n)
            .map(|i| (i / 5) as f64 * 1.5 + if i % 2 == 0 { 0.4 } else { -0.4 })
            .collect();
        let response = Response::new(y, None, (0..n).collect()).unwrap();
        let kinship = KinshipTensor::new(vec![DenseMatrix::identity(n), family]).unwrap();
        let fit = fit_qtl_model(&AiReml::default(), &response, &kinship, &trait_result(&[1])).unwrap();
        assert_eq!(fit.qtls.len(), 1);
        assert_eq!(fit.qtls[0].marker, 1);
        assert!(fit.h2 > 0.5 && fit.h2 < 1.0, "h2 = {}", fit.h2);
    }
}
