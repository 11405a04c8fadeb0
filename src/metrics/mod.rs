use ethers::types::Address;
use metrics::{counter, histogram};

use crate::campaign::SettlementReport;
use crate::rewards::redeemable_ratio_bps;

// Metrics for settlement runs
pub const METRIC_SETTLEMENTS: &str = "settlements_total";
pub const METRIC_SETTLEMENT_ERRORS: &str = "settlement_errors_total";
pub const METRIC_REDEEMABLE_RATIO: &str = "redeemable_ratio_bps";
pub const METRIC_CHAIN_READS: &str = "chain_reads_total";

pub fn record_settlement(kpi_token: Address, report: &SettlementReport) {
    counter!(METRIC_SETTLEMENTS, 1, "expired" => report.expired.to_string());

    if let Some(bps) = redeemable_ratio_bps(&report.redeemable, &report.maximum) {
        histogram!(METRIC_REDEEMABLE_RATIO, bps as f64, "kpi_token" => format!("{:?}", kpi_token));
    }
}

pub fn record_settlement_error(kind: &'static str) {
    counter!(METRIC_SETTLEMENT_ERRORS, 1, "kind" => kind);
}

pub fn record_chain_read(method: &'static str) {
    counter!(METRIC_CHAIN_READS, 1, "method" => method);
}
