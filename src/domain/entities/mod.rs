pub mod mail;
pub mod user;

pub use mail::*;
pub use user::*;
