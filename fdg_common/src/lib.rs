mod helpers;
mod money;

pub mod op;
mod secret;

pub use helpers::{env_flag, parse_boolean_flag};
pub use money::{Money, MoneyConversionError, CURRENCY_CODE};
pub use secret::Secret;
