#[path = "../common/mod.rs"]
mod common;

mod classify_tests;
mod command_tests;
mod proxy_tests;
