pub mod dataset_store;
pub mod notifier;
pub mod page_fetcher;
pub mod price_source;
pub mod report;
