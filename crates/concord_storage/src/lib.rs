#![forbid(unsafe_code)]

pub mod kv;
pub mod ledger;
pub mod repo;
