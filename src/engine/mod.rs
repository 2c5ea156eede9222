pub mod config;
pub mod gallery;
pub mod grouping;
pub mod handle;
pub mod images;
pub mod project;
pub mod record;
pub mod staleness;
pub mod tags;
pub mod warn;
pub mod workbook;
