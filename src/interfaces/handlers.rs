pub mod analytics;
pub mod contact;
pub mod json_error;
pub mod system;
