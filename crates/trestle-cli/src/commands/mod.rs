//! One module per subcommand.

pub mod list;
pub mod new;
pub mod validate;
