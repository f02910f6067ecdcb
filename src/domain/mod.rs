pub mod user;
pub mod pending_user;
pub mod application;
pub mod payment;

pub use user::*;
pub use pending_user::*;
pub use application::*;
pub use payment::*;
