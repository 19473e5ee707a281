pub mod catalog;
pub mod genre;
pub mod review;
pub mod user;

pub use catalog::*;
pub use genre::*;
pub use review::*;
pub use user::*;
