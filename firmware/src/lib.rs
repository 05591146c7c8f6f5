#![no_std]

pub mod accelerometer;
pub mod ble_config;
