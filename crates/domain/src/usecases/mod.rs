//! Application use cases / business logic

pub mod accounts;
pub mod crosspost;

pub use accounts::{AccountError, Accounts, ConnectOutcome, NewUser};
pub use crosspost::{CrosspostConfig, CrosspostError, CrosspostReport, Crossposter};
