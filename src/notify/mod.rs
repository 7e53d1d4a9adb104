pub mod event;
pub mod fanout;
pub mod recipients;
pub mod routes;
