mod order_number;
mod signing;

pub use order_number::{is_valid_order_number, new_order_number, order_number_at, ORDER_NO_PREFIX};
pub use signing::{calculate_hmac, verify_hmac};
