//! Mill Wear Pipeline - Main Entry Point

use anyhow::Context;
use tracing::info;
use wear_pipeline::{init_logging, load_config, run};

fn main() -> anyhow::Result<()> {
    let config = load_config().context("loading pipeline configuration")?;
    init_logging(&config.logging)?;

    info!("=== Mill Wear Pipeline v{} ===", env!("CARGO_PKG_VERSION"));

    let report = run(&config)?;
    info!(
        "Worst PR-AUC in fold {:?}, test groups {:?}",
        report.summary.worst_pr_auc_fold, report.summary.test_groups_worst_pr_auc
    );

    Ok(())
}
