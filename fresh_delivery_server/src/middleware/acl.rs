//! Access control list middleware for the fresh delivery server.
//! This middleware can be placed on any route or service.
//!
//! It reads the caller identity injected by the authenticating proxy and checks the caller's role against the roles
//! allowed on the route. A request without an identity gets a 401; a caller whose role is not in the list gets a 403.

use std::{future::Future, pin::Pin, rc::Rc};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ok, Ready};
use log::{debug, warn};

use crate::{
    auth::{Caller, Role},
    errors::ServerError,
};

pub struct AclMiddlewareFactory {
    allowed_roles: Vec<Role>,
}

impl AclMiddlewareFactory {
    pub fn new(allowed_roles: &[Role]) -> Self {
        AclMiddlewareFactory { allowed_roles: allowed_roles.to_vec() }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AclMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AclMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AclMiddlewareService { allowed_roles: self.allowed_roles.clone(), service: Rc::new(service) })
    }
}

pub struct AclMiddlewareService<S> {
    allowed_roles: Vec<Role>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AclMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed_roles = self.allowed_roles.clone();
        Box::pin(async move {
            let caller = Caller::from_headers(req.headers()).map_err(|e| {
                debug!("🔐️ No usable identity on request to {}. {e}", req.path());
                Error::from(e)
            })?;
            if caller.has_any_role(&allowed_roles) {
                service.call(req).await
            } else {
                warn!("🔐️ User #{} ({}) may not access {}", caller.user_id, caller.role, req.path());
                let allowed = allowed_roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(" or ");
                Err(ServerError::InsufficientPermissions(format!("This action requires the {allowed} role")).into())
            }
        })
    }
}
