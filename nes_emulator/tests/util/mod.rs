#![allow(dead_code)]
pub mod rom_builder;
pub mod test_bus;
