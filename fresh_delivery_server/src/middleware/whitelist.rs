//! Restricts a service to a fixed set of remote IP addresses. The payment callback is wrapped with this when a gateway
//! IP whitelist is configured.

use std::{
    future::{ready, Ready},
    net::IpAddr,
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};

use crate::{errors::ServerError, helpers::get_remote_ip};

#[derive(Clone)]
pub struct IpWhitelistFactory {
    // None lets every caller through
    whitelist: Option<Rc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
}

impl IpWhitelistFactory {
    pub fn new(whitelist: Option<Vec<IpAddr>>, use_x_forwarded_for: bool, use_forwarded: bool) -> Self {
        Self { whitelist: whitelist.map(Rc::new), use_x_forwarded_for, use_forwarded }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IpWhitelistFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = IpWhitelistService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(IpWhitelistService {
            whitelist: self.whitelist.clone(),
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            service: Rc::new(service),
        }))
    }
}

pub struct IpWhitelistService<S> {
    whitelist: Option<Rc<Vec<IpAddr>>>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for IpWhitelistService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let whitelisted = match &self.whitelist {
            None => true,
            Some(whitelist) => match get_remote_ip(req.request(), self.use_x_forwarded_for, self.use_forwarded) {
                Some(ip) => {
                    info!("🔐️ Payment callback from {ip}");
                    whitelist.contains(&ip)
                },
                None => {
                    warn!("🔐️ No IP address found in payment callback request, denying access.");
                    false
                },
            },
        };
        Box::pin(async move {
            if whitelisted {
                service.call(req).await
            } else {
                warn!("🔐️ Payment callback from a peer that is not whitelisted. Denying access.");
                Err(ServerError::InsufficientPermissions("Forbidden peer".into()).into())
            }
        })
    }
}
