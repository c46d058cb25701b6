//! Customer records (event-sourced).
//!
//! Pure domain logic: registration, detail changes, credit limits and the
//! active/suspended lifecycle that decides whether a customer may buy on
//! account.

pub mod customer;

pub use customer::{
    ContactInfo, Customer, CustomerCommand, CustomerEvent, CustomerId, CustomerReactivated,
    CustomerRegistered, CustomerStatus, CustomerSuspended, CustomerUpdated, ReactivateCustomer,
    RegisterCustomer, SuspendCustomer, UpdateCustomer,
};
