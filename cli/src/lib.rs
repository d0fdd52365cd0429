pub mod commands;
pub mod config;
pub mod gateway;
pub mod product;
pub mod provider;
pub mod reconcile;
pub mod tracker;
