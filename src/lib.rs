pub mod bookmark;
pub mod config;
pub mod display;
pub mod page;
pub mod prefetch;
pub mod provider;
pub mod series;
pub mod viewer;
