pub mod ingestion;
pub mod panel;
pub mod risk;
