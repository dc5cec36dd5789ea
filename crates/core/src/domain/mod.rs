pub mod action;
pub mod alert;
pub mod execution;
