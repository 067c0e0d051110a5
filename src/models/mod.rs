pub mod enums;

mod appointment;
mod fundraising;
mod medical_test;
mod medicine;
mod prescription;
mod user;

pub use appointment::*;
pub use fundraising::*;
pub use medical_test::*;
pub use medicine::*;
pub use prescription::*;
pub use user::*;
