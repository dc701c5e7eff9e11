//! Command implementations.

mod fetch;
mod profiles;

pub use fetch::fetch;
pub use profiles::list_profiles;
