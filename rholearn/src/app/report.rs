use crate::app::runner::LossSummary;
use rholearn::equivariance::EquivarianceReport;
use rholearn::tensor::{SphericalKey, TensorMap};
use spherical::EulerAngles;
use tracing::{info, warn};

pub fn report_prediction(prediction: &TensorMap<SphericalKey>) {
    info!("\nPredicted blocks (samples, components, properties):");
    for (key, block) in prediction.iter() {
        let (s, c, p) = block.shape();
        let norm: f64 = block.values().iter().map(|v| v.norm_squared()).sum::<f64>().sqrt();
        info!("  {:<28} ({:>4}, {:>2}, {:>3})  |x| = {:.6}", key.to_string(), s, c, p, norm);
    }
}

pub fn report_equivariance(angles: &EulerAngles, report: &EquivarianceReport<SphericalKey>) {
    info!(
        "\nEquivariance check for rotation (alpha={:.4}, beta={:.4}, gamma={:.4}):",
        angles.alpha, angles.beta, angles.gamma
    );
    info!("  Keys compared:     {}", report.checked_keys);
    info!("  Max deviation:     {:.3e}", report.max_deviation);
    if report.passed() {
        info!("  Status:            PASSED");
        return;
    }

    warn!("  Status:            FAILED ({} keys)", report.failures.len());
    for failure in &report.failures {
        warn!(
            "    {:<28} {:<40} {:.3e}",
            failure.key.to_string(),
            failure.reason.to_string(),
            failure.max_deviation
        );
    }
    if let Some(worst) = report.worst() {
        warn!("  Worst key: {}", worst.key);
    }
}

pub fn report_loss(summary: &LossSummary) {
    info!(
        "\n{:?} loss ({}): {:.10}",
        summary.kind, summary.reduction, summary.value
    );
    if let Some(per_structure) = &summary.per_structure {
        for (structure, value) in per_structure {
            info!("  Structure {:>4}: {:.10}", structure, value);
        }
    }
}
