// Shared arithmetic and rules
pub mod codes;
pub mod ledger;
pub mod lifecycle;

// Master data
pub mod catalog;
pub mod customers;
pub mod suppliers;

// Quotation -> production -> sale
pub mod productions;
pub mod quotations;
pub mod sales;

// Money in and out
pub mod payments;
pub mod purchases;

// Service factory for dependency injection
pub mod factory;

pub use factory::{ServiceContainer, ServiceFactory};
