pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod mapper;
pub mod matcher;
pub mod notify;
pub mod types;
pub mod wishlist;
