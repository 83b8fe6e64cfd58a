// Core primitives for delimited-text parsing

pub mod field;

pub use field::*;
