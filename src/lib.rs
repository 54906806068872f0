pub mod aggregate;
pub mod api;
pub mod auth;
pub mod bucket;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod local_time;
pub mod models;
pub mod repositories;
pub mod store;
