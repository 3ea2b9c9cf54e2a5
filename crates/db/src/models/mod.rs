pub mod keyword;
pub mod task;
pub mod token;
pub mod user;

pub(crate) mod boolish;
