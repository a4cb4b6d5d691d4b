//! Command implementations.

mod info;
mod inspect;
mod record;
mod validate;

pub use info::run_info;
pub use inspect::run_inspect;
pub use record::run_record;
pub use validate::run_validate;
