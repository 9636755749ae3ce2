pub mod aggregation;
pub mod summary;

pub use aggregation::{ConsolidatedCashFlow, PeriodType, TerminalValuePlacement};
