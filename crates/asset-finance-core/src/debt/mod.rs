pub mod amortization;
pub mod assumptions;
pub mod blended_target;
pub mod capex;
pub mod sizing;

pub use assumptions::{
    DebtAssumptions, DebtStructure, GracePeriod, InterestRate, RatePoint, RepaymentFrequency,
};
