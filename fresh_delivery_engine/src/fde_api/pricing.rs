//! Delivery pricing.
//!
//! The fee table is an explicit [`PricingPolicy`] value. Servers share a single [`PricingPolicyHandle`] between all
//! their workers so that a reload is seen everywhere at once.
use std::sync::{Arc, RwLock};

use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::{DeliveryType, Money};

pub const DEFAULT_EXPEDITED_DELIVERY_FEE: Money = Money::from_units(10);
pub const DEFAULT_STANDARD_DELIVERY_FEE: Money = Money::from_cents(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub standard_fee: Money,
    pub expedited_fee: Money,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self { standard_fee: DEFAULT_STANDARD_DELIVERY_FEE, expedited_fee: DEFAULT_EXPEDITED_DELIVERY_FEE }
    }
}

impl PricingPolicy {
    pub fn new(standard_fee: Money, expedited_fee: Money) -> Self {
        Self { standard_fee, expedited_fee }
    }

    pub fn delivery_fee(&self, delivery_type: DeliveryType) -> Money {
        match delivery_type {
            DeliveryType::Standard => self.standard_fee,
            DeliveryType::Expedited => self.expedited_fee,
        }
    }
}

/// A cheaply cloneable, shared reference to the live pricing policy.
#[derive(Debug, Clone, Default)]
pub struct PricingPolicyHandle {
    inner: Arc<RwLock<PricingPolicy>>,
}

impl PricingPolicyHandle {
    pub fn new(policy: PricingPolicy) -> Self {
        Self { inner: Arc::new(RwLock::new(policy)) }
    }

    /// A snapshot of the current policy.
    pub fn current(&self) -> PricingPolicy {
        // A poisoned lock still holds a valid `Copy` policy
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn update(&self, policy: PricingPolicy) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        info!("💰️ Delivery pricing updated: standard {} / expedited {}", policy.standard_fee, policy.expedited_fee);
        *guard = policy;
    }

    pub fn reset(&self) {
        self.update(PricingPolicy::default());
    }
}
