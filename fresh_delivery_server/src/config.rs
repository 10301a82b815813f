use std::{env, net::IpAddr, str::FromStr};

use fdg_common::{env_flag, Money, Secret};
use fresh_delivery_engine::{GatewayConfig, PricingPolicy, DEFAULT_EXPEDITED_DELIVERY_FEE, DEFAULT_STANDARD_DELIVERY_FEE};
use log::*;

const DEFAULT_FDG_HOST: &str = "127.0.0.1";
const DEFAULT_FDG_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fresh_delivery.db";
const DEFAULT_NOTIFY_URL: &str = "http://127.0.0.1:8480/pay/notify";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The delivery fees the server starts with. They can be changed at runtime through the admin API.
    pub pricing: PricingPolicy,
    pub gateway: PaymentGatewayConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FDG_HOST.to_string(),
            port: DEFAULT_FDG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            pricing: PricingPolicy::default(),
            gateway: PaymentGatewayConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("FDG_HOST").ok().unwrap_or_else(|| DEFAULT_FDG_HOST.into());
        let port = env::var("FDG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for FDG_PORT. {e} Using the default, {DEFAULT_FDG_PORT}, instead."
                    );
                    DEFAULT_FDG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_FDG_PORT);
        let database_url = env::var("FDG_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ FDG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let standard_fee = parse_fee(
            "FDG_STANDARD_DELIVERY_FEE",
            env::var("FDG_STANDARD_DELIVERY_FEE").ok(),
            DEFAULT_STANDARD_DELIVERY_FEE,
        );
        let expedited_fee = parse_fee(
            "FDG_EXPEDITED_DELIVERY_FEE",
            env::var("FDG_EXPEDITED_DELIVERY_FEE").ok(),
            DEFAULT_EXPEDITED_DELIVERY_FEE,
        );
        let pricing = PricingPolicy::new(standard_fee, expedited_fee);
        let gateway = PaymentGatewayConfig::from_env_or_defaults();
        let use_x_forwarded_for = env_flag("FDG_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("FDG_USE_FORWARDED", false);
        Self { host, port, database_url, pricing, gateway, use_x_forwarded_for, use_forwarded }
    }
}

/// Reads a delivery fee. Unset, unparseable and negative values fall back to `default`.
fn parse_fee(name: &str, value: Option<String>, default: Money) -> Money {
    let Some(value) = value else {
        info!("🪛️ {name} is not set. Using the default value of {default}.");
        return default;
    };
    match Money::from_str(value.trim()) {
        Ok(fee) if !fee.is_negative() => fee,
        Ok(fee) => {
            warn!("🪛️ {name} cannot be negative ({fee}). Using the default value of {default}.");
            default
        },
        Err(e) => {
            warn!("🪛️ Invalid configuration value for {name}. {e}. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------  PaymentGatewayConfig  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct PaymentGatewayConfig {
    pub app_id: String,
    pub merchant_id: String,
    pub api_key: Secret<String>,
    /// The callback URL handed to the gateway with every prepay request
    pub notify_url: String,
    /// When true, callbacks must carry a valid `X-Gateway-Signature` header.
    pub hmac_checks: bool,
    /// If supplied, callbacks are only accepted from these addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for PaymentGatewayConfig {
    fn default() -> Self {
        Self {
            app_id: String::default(),
            merchant_id: String::default(),
            api_key: Secret::default(),
            notify_url: DEFAULT_NOTIFY_URL.to_string(),
            hmac_checks: true,
            whitelist: None,
        }
    }
}

impl PaymentGatewayConfig {
    pub fn from_env_or_defaults() -> Self {
        let app_id = env::var("FDG_GATEWAY_APP_ID").ok().unwrap_or_else(|| {
            warn!("🪛️ FDG_GATEWAY_APP_ID is not set. Electronic payments will be refused.");
            String::default()
        });
        let merchant_id = env::var("FDG_GATEWAY_MERCHANT_ID").ok().unwrap_or_default();
        let api_key = env::var("FDG_GATEWAY_API_KEY").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ FDG_GATEWAY_API_KEY is not set. Please set it to the signing key for your payment gateway account."
            );
            String::default()
        });
        let notify_url = env::var("FDG_GATEWAY_NOTIFY_URL").ok().unwrap_or_else(|| {
            info!("🪛️ FDG_GATEWAY_NOTIFY_URL is not set. Using {DEFAULT_NOTIFY_URL}.");
            DEFAULT_NOTIFY_URL.to_string()
        });
        let hmac_checks = env_flag("FDG_GATEWAY_HMAC_CHECKS", true);
        if !hmac_checks {
            warn!("🚨️ Gateway callback signatures will NOT be checked. Do not run production like this.");
        } else if api_key.is_empty() {
            warn!("🚨️ FDG_GATEWAY_API_KEY is empty, so every payment callback will be rejected.");
        }
        let whitelist = env::var("FDG_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't accept \
                     any payment callbacks."
                );
            },
            None => {
                info!("🪛️ No gateway IP whitelist is set. Only HMAC validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        Self { app_id, merchant_id, api_key: Secret::new(api_key), notify_url, hmac_checks, whitelist }
    }

    /// The part of the configuration the payment gateway client needs.
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            app_id: self.app_id.clone(),
            merchant_id: self.merchant_id.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// Parses a comma-separated list of IP addresses. "none", "false" and "0" disable the whitelist. Invalid entries are
/// skipped.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0"].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Gateway IP whitelist is disabled. If this is not what you want, set FDG_GATEWAY_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid IP address ({s}) in FDG_GATEWAY_IP_WHITELIST: {e}");
                })
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}
