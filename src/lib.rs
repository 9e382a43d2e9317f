pub mod app;
pub mod archive;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod fs_util;
pub mod mangadex;
pub mod output;
pub mod unit;
