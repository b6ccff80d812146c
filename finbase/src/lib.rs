pub mod admin;
pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod rest;
