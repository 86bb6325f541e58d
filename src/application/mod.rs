/// Application layer - Use cases, DTOs and the task scheduler
///
/// This layer contains the application logic that orchestrates
/// domain services and coordinates with infrastructure through ports.
pub mod dto;
pub mod factories;
pub mod read_models;
pub mod scheduler;
pub mod use_cases;
