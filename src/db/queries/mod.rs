//! Runtime-checked SQL, one module per table group. Every function takes any
//! Postgres executor so it runs equally on the pool or inside a transaction.

pub mod audit;
pub mod bookings;
pub mod documents;
pub mod halls;
pub mod user;
