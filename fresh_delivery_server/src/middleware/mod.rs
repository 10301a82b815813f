mod acl;
mod hmac;
mod whitelist;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, SIGNATURE_HEADER};
pub use whitelist::{IpWhitelistFactory, IpWhitelistService};
