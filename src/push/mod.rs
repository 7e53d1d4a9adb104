pub mod provider;
pub mod registry;
pub mod routes;
