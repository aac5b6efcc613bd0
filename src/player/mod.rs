pub mod embed;
pub mod native;
pub mod sink;
