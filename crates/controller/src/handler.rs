//! Request handlers bound to routes, and the type-erased controller behind them.

use crate::body::ResponseBody;
use crate::catalog::ActionTable;
use crate::controller::{Controller, ControllerInfo};
use crate::dispatch;
use crate::error::DispatchError;
use crate::request::{ActionRequest, RouteParams};
use crate::site::SiteState;
use async_trait::async_trait;
use http::{Response, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Handles a request routed to it.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(
        &self,
        site: &SiteState,
        req: ActionRequest,
        params: RouteParams,
    ) -> Result<Response<ResponseBody>, DispatchError>;
}

/// Dispatches any action of one controller by name.
pub(crate) trait ControllerDispatch: Send + Sync {
    fn info(&self) -> &ControllerInfo;

    fn dispatch(
        &self,
        site: &SiteState,
        action: &str,
        req: ActionRequest,
        params: RouteParams,
    ) -> Result<Response<ResponseBody>, DispatchError>;
}

pub(crate) struct ControllerHandler<C> {
    table: Arc<ActionTable<C>>,
}

impl<C> ControllerHandler<C> {
    pub(crate) fn new(table: Arc<ActionTable<C>>) -> Self {
        Self { table }
    }
}

impl<C: Controller> ControllerDispatch for ControllerHandler<C> {
    fn info(&self) -> &ControllerInfo {
        self.table.info()
    }

    fn dispatch(
        &self,
        site: &SiteState,
        action: &str,
        req: ActionRequest,
        params: RouteParams,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        dispatch::dispatch(site, &self.table, action, req, params)
    }
}

/// The handler a synthesized route is bound to.
pub(crate) struct ActionHandler {
    controller: Arc<dyn ControllerDispatch>,
    action: String,
}

impl ActionHandler {
    pub(crate) fn new(controller: Arc<dyn ControllerDispatch>, action: String) -> Self {
        Self { controller, action }
    }
}

impl fmt::Debug for ActionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("controller", &self.controller.info().full_name)
            .field("action", &self.action)
            .finish()
    }
}

#[async_trait]
impl RequestHandler for ActionHandler {
    async fn invoke(
        &self,
        site: &SiteState,
        req: ActionRequest,
        params: RouteParams,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        self.controller.dispatch(site, &self.action, req, params)
    }
}

/// Answers `404 Not Found` with an empty body.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundHandler;

#[async_trait]
impl RequestHandler for NotFoundHandler {
    async fn invoke(
        &self,
        _site: &SiteState,
        _req: ActionRequest,
        _params: RouteParams,
    ) -> Result<Response<ResponseBody>, DispatchError> {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = StatusCode::NOT_FOUND;
        Ok(response)
    }
}
