//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting and inversion code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::AnalysisOutput;
use crate::data::PreparedDataset;
use crate::domain::{AnalysisConfig, SampleCurve, SampleDose};
use crate::report::{OptimalDoseSummary, ToxicityRecord};

/// Rank samples by toxicity index, most toxic first.
pub fn rank_by_toxicity(records: &[ToxicityRecord], top_n: usize) -> Vec<ToxicityRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        b.toxicity_index
            .partial_cmp(&a.toxicity_index)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}

/// Format the run summary (dataset, grid search, performance, importance).
pub fn format_run_summary(dataset: &PreparedDataset, output: &AnalysisOutput, config: &AnalysisConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dose - Dose-Response Analysis ===\n");
    let (dose_lo, dose_hi) = dataset.dose_range();
    let (via_lo, via_hi) = dataset.viability_range();
    out.push_str(&format!(
        "Data: n={} | samples={} | dose=[{:.4}, {:.4}] | viability=[{:.3}, {:.3}]\n",
        dataset.len(),
        dataset.sample_ids().len(),
        dose_lo,
        dose_hi,
        via_lo,
        via_hi
    ));

    let model = &output.model;
    out.push_str("\nGrid search:\n");
    out.push_str(&format!(
        "- candidates: {} evaluated, {} failed ({}-fold CV)\n",
        model.cv_results().len(),
        model.failed_candidates(),
        config.regressor.n_folds
    ));
    out.push_str(&format!("- best params: {}\n", model.best_params()));
    out.push_str(&format!("- best CV R2: {:.4}\n", model.cv_score()));

    let perf = &output.performance;
    out.push_str("\nModel performance (training data):\n");
    out.push_str(&format!("{:<16} {:.4}\n", "R2", perf.r_squared));
    out.push_str(&format!("{:<16} {:.4}\n", "RMSE", perf.rmse));
    out.push_str(&format!("{:<16} {:.4}\n", "MAE", perf.mae));
    out.push_str(&format!("{:<16} {}\n", "Data points", perf.n_points));
    out.push_str(&format!(
        "{:<16} {}\n",
        "Analysis date",
        perf.evaluated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    out.push_str("\nFeature importance:\n");
    for f in &output.importance {
        out.push_str(&format!("- {:<18} {:.4}\n", f.feature, f.importance));
    }
    out.push('\n');

    out
}

/// Format the per-sample 4PL table.
pub fn format_curve_table(curves: &[SampleCurve]) -> String {
    let mut out = String::new();
    out.push_str("IC50 (4PL fits):\n");
    push_row(
        &mut out,
        format!(
            "{:<16} {:>8} {:>8} {:>10} {:>8} {:>8}",
            "sample", "top", "bottom", "ic50", "hill", "r2"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<16} {:-<8} {:-<8} {:-<10} {:-<8} {:-<8}", "", "", "", "", "", ""),
    );

    for c in curves {
        let row = match &c.outcome {
            Ok(p) => format!(
                "{:<16} {:>8.3} {:>8.3} {:>10.5} {:>8.3} {:>8}",
                truncate(&c.sample_id, 16),
                p.top,
                p.bottom,
                p.ic50,
                p.hill_slope,
                p.r_squared.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}")),
            ),
            Err(e) => format!("{:<16} failed: {e}", truncate(&c.sample_id, 16)),
        };
        push_row(&mut out, row);
    }

    let failed = curves.iter().filter(|c| c.outcome.is_err()).count();
    if failed > 0 {
        out.push_str(&format!("({failed} of {} fits failed)\n", curves.len()));
    }
    out
}

/// Format the toxicity ranking.
pub fn format_toxicity_table(records: &[ToxicityRecord], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str("Toxicity index (1 - viability at highest dose):\n");
    push_row(
        &mut out,
        format!("{:<16} {:>14} {:>10}", "sample", "viability@max", "toxicity"),
    );
    push_row(&mut out, format!("{:-<16} {:-<14} {:-<10}", "", "", ""));
    for r in rank_by_toxicity(records, top_n) {
        push_row(
            &mut out,
            format!(
                "{:<16} {:>14.3} {:>10.3}",
                truncate(&r.sample_id, 16),
                r.max_dose_viability,
                r.toxicity_index
            ),
        );
    }
    out
}

/// Format optimal doses with their intervals and the aggregate summary.
pub fn format_dose_table(
    doses: &[SampleDose],
    summary: Option<&OptimalDoseSummary>,
    config: &AnalysisConfig,
) -> String {
    let inv = &config.inversion;
    let mut out = String::new();
    out.push_str(&format!(
        "Optimal dose (target viability {:.2}, {:.0}% CI, {} bootstrap trials):\n",
        inv.target_viability,
        inv.confidence_level * 100.0,
        inv.n_bootstrap
    ));
    push_row(
        &mut out,
        format!(
            "{:<16} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "sample", "dose", "ci_lower", "ci_upper", "ci_width", "predicted"
        ),
    );
    push_row(
        &mut out,
        format!("{:-<16} {:-<10} {:-<10} {:-<10} {:-<10} {:-<10}", "", "", "", "", "", ""),
    );

    for d in doses {
        let row = match &d.outcome {
            Ok(r) => format!(
                "{:<16} {:>10.5} {:>10.5} {:>10.5} {:>10.5} {:>10.3}",
                truncate(&d.sample_id, 16),
                r.optimal_dose,
                r.ci_lower,
                r.ci_upper,
                r.ci_width(),
                r.predicted_viability
            ),
            Err(e) => format!("{:<16} failed: {e}", truncate(&d.sample_id, 16)),
        };
        push_row(&mut out, row);
    }

    match summary {
        Some(s) => {
            out.push_str(&format!(
                "\nSummary: n={} | mean={:.5} | median={:.5} | range=[{:.5}, {:.5}]\n",
                s.count, s.mean, s.median, s.min, s.max
            ));
        }
        None => out.push_str("\nSummary: no optimal doses computed\n"),
    }
    out
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurveParameters, OptimalDoseResult};
    use crate::error::AnalysisError;

    fn tox(id: &str, t: f64) -> ToxicityRecord {
        ToxicityRecord {
            sample_id: id.into(),
            max_dose_viability: 1.0 - t,
            toxicity_index: t,
        }
    }

    #[test]
    fn rank_by_toxicity_orders_descending() {
        let ranked = rank_by_toxicity(&[tox("A", 0.2), tox("B", 0.9), tox("C", 0.5)], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].sample_id, "B");
        assert_eq!(ranked[1].sample_id, "C");
    }

    #[test]
    fn curve_table_shows_failures_and_missing_r2() {
        let curves = vec![
            SampleCurve {
                sample_id: "ACH-000001".into(),
                outcome: Ok(CurveParameters {
                    top: 1.0,
                    bottom: 0.1,
                    ic50: 0.004,
                    hill_slope: 1.2,
                    r_squared: None,
                }),
            },
            SampleCurve {
                sample_id: "ACH-000002".into(),
                outcome: Err(AnalysisError::FitFailure("did not converge".into())),
            },
        ];
        let table = format_curve_table(&curves);
        assert!(table.contains("ACH-000001"));
        assert!(table.contains("n/a"));
        assert!(table.contains("did not converge"));
        assert!(table.contains("(1 of 2 fits failed)"));
        assert!(table.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn dose_table_includes_summary() {
        let doses = vec![SampleDose {
            sample_id: "ACH-000001".into(),
            outcome: Ok(OptimalDoseResult {
                optimal_dose: 0.01,
                ci_lower: 0.008,
                ci_upper: 0.012,
                predicted_viability: 0.21,
            }),
        }];
        let summary = OptimalDoseSummary {
            count: 1,
            mean: 0.01,
            median: 0.01,
            min: 0.01,
            max: 0.01,
        };
        let table = format_dose_table(&doses, Some(&summary), &AnalysisConfig::default());
        assert!(table.contains("95% CI"));
        assert!(table.contains("0.00400"));
        assert!(table.contains("Summary: n=1"));
    }

    #[test]
    fn truncate_marks_cut_ids() {
        assert_eq!(truncate("ACH-000001", 16), "ACH-000001");
        assert_eq!(truncate("a-very-long-sample-id", 8), "a-very-.");
    }
}
