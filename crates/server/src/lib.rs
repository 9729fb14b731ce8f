pub mod routes;
pub mod registry;
pub mod startup;
pub mod errors;

pub use startup::run;
