//! Test modules for the prediction market contract.

mod common;
