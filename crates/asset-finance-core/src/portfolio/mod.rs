pub mod config;
pub mod model;

pub use config::ModelConfig;
pub use model::{run_portfolio, AssetInput, PortfolioInput, PortfolioOutput};
