pub mod breeze;
pub mod broker;
pub mod error;
