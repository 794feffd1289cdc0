pub mod billing_web_server;
pub mod core;
pub mod db;
pub mod gateway;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod services;
