pub mod asset;
pub mod dates;
pub mod error;
pub mod solvers;
pub mod time_value;
pub mod types;

#[cfg(feature = "debt")]
pub mod debt;

#[cfg(feature = "cashflow")]
pub mod cashflow;

#[cfg(feature = "portfolio")]
pub mod portfolio;

pub use error::AssetFinanceError;
pub use types::*;

/// Standard result type for all asset-finance operations
pub type AssetFinanceResult<T> = Result<T, AssetFinanceError>;
