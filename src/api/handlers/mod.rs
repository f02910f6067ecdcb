pub mod admin;
pub mod application;
pub mod auth;
pub mod dashboard;
pub mod payments;
pub mod register;
pub mod root;
pub mod signup;
pub mod uploads;
