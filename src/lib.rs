pub mod allocator;
pub mod app;
pub mod archive;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod internet_archive;
pub mod metadata;
pub mod output;
pub mod processor;
pub mod workbook;
