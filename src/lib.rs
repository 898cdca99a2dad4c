pub mod cache;
pub mod config;
pub mod crawler;
pub mod models;
pub mod morph;
pub mod storage;
pub mod views;
pub mod visitor;
