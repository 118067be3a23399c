pub mod audit;
pub mod booking;
pub mod document;
pub mod hall;
pub mod role;
pub mod user;
