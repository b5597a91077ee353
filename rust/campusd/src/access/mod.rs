pub mod capability;
pub mod matrix;
pub mod resolver;

pub use capability::{Capability, Role};
pub use matrix::PermissionMatrix;
pub use resolver::AccessResolver;
