pub mod bidiphase;
pub mod config;
pub mod info;
pub mod register;
