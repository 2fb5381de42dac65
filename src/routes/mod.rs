pub mod admin;
pub mod documents;
