pub mod access;
pub mod core;
pub mod nav;
pub mod notices;
pub mod payments;
pub mod scope;
pub mod session;
