pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod form;
pub mod logging;
pub mod model;
pub mod poller;
pub mod reminder;
pub mod remote;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod ui;
