//! Command handlers for tinyrip CLI

pub mod configure;
pub mod export;
pub mod inspect;
