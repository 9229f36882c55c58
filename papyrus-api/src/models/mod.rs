pub mod error;
pub mod records;
pub mod requests;
pub mod session;
