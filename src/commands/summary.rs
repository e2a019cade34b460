use crate::commands::Out;
use crate::error::Result;
use crate::model::Summary;
use crate::Config;

/// The totals, computed from the stored income and expense transactions.
pub async fn summary(config: &Config) -> Result<Out<Summary>> {
    let dataset = config.store().read().await?;
    let summary = dataset.summary().clone();
    Ok(Out::new(
        format!(
            "Income {}, expenses {}, balance {}",
            summary.total_income, summary.total_expenses, summary.current_balance
        ),
        summary,
    ))
}
