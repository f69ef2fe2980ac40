pub mod analysis;
pub mod charts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fake_dataset;
pub mod filter;
pub mod logging;
pub mod parquet_dataset;
pub mod records;
pub mod sqlite_dataset;
pub mod state;
