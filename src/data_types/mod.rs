pub mod activity;
pub mod athlete;
pub mod common;
pub mod stream;
