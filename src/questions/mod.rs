pub mod routes;
pub mod store;
pub mod views;
pub mod votes;
