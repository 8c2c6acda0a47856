#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod account;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod gateway;
pub mod uploads;

pub use config::Config;
