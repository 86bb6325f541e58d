//! Core of the registry: the product and component trees, the rules that
//! shape them and the services that build and query them.

pub mod domain;
pub mod policies;
pub mod services;
