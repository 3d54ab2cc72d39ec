pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod keygen;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod services;
pub mod util;
