pub mod gotohui;
pub mod http;
pub mod notify;
pub mod persistence;
pub mod reporting;
