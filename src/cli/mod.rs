pub mod performance;
pub mod quote;
pub mod setup;
pub mod status;
pub mod transactions;
pub mod ui;
