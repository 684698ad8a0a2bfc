pub mod bar;
pub mod credentials;
pub mod datetime;
pub mod display;
pub mod error;
pub mod normalize;
pub mod query;
