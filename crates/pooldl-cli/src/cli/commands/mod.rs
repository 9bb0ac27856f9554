//! CLI command handlers, one per file.

mod config;
mod fetch;

pub use config::run_config;
pub use fetch::{run_fetch, FetchOptions};

#[cfg(test)]
pub(crate) use fetch::{parse_url_list, print_progress, progress_line};
