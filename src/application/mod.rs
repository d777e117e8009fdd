//! Application layer: the admin and submission view-models and the payment
//! confirmation loop they drive.

pub mod admin;
pub mod payment;
pub mod submission;
