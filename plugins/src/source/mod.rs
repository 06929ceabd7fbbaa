pub mod download;

pub use download::{open_download, open_job_rows, RowEventStream};
