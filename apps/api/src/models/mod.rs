pub mod credits;
pub mod resume;
pub mod user;
