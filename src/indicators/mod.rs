// Technical indicators module

pub mod rsi;

pub use rsi::{evaluate, RsiEngine};
