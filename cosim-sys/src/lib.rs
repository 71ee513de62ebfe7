#![doc = include_str!("../README.md")]
#![deny(clippy::all)]

pub mod fmi2;
