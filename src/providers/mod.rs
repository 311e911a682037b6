pub mod gemini;
pub mod util;
pub mod yahoo_finance;

pub use gemini::GeminiTransactionParser;
pub use yahoo_finance::YahooSnapshotFetcher;
