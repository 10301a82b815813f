//! Order number generation.
//!
//! An order number reads as `FD` + `yyyyMMddHHmmss` (UTC) + a four digit sequence + a four digit random suffix, e.g.
//! `FD2024061512000100014821`. The sequence is monotonic within a process and wraps at 10 000; the random suffix
//! keeps numbers from separate processes apart. The database still enforces uniqueness, and order creation retries
//! with a fresh number on the rare collision.
use std::sync::{
    atomic::{AtomicU32, Ordering},
    OnceLock,
};

use chrono::{DateTime, Utc};
use rand::Rng;
use regex::Regex;

use crate::db_types::OrderNo;

pub const ORDER_NO_PREFIX: &str = "FD";
const SEQUENCE_MODULUS: u32 = 10_000;

static SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Generates a new order number stamped with the current time.
pub fn new_order_number() -> OrderNo {
    order_number_at(Utc::now())
}

pub fn order_number_at(timestamp: DateTime<Utc>) -> OrderNo {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % SEQUENCE_MODULUS;
    let suffix = rand::thread_rng().gen_range(0..10_000u32);
    OrderNo(format!("{ORDER_NO_PREFIX}{}{seq:04}{suffix:04}", timestamp.format("%Y%m%d%H%M%S")))
}

/// Checks that a string has the shape of an order number. Used to reject junk before it reaches the database.
pub fn is_valid_order_number(s: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^FD\d{14}\d{4}\d{4}$").ok())
        .as_ref()
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}
