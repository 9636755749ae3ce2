pub mod debt;
pub mod model;
pub mod returns;
