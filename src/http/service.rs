//! `may_minihttp` front end.

use super::router::{route, ApiRequest, AppContext, ContentType, USER_HEADER};
use crate::store::StoreProvider;
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer, HttpService, Request, Response};
use std::io::{self, Read};
use std::sync::Arc;

pub struct ApiService<P: StoreProvider> {
    ctx: Arc<AppContext<P>>,
}

impl<P: StoreProvider> ApiService<P> {
    pub fn new(ctx: AppContext<P>) -> Self {
        Self { ctx: Arc::new(ctx) }
    }
}

impl<P: StoreProvider> Clone for ApiService<P> {
    fn clone(&self) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

impl<P: StoreProvider> HttpService for ApiService<P> {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut api = ApiRequest::new(req.method(), req.path());
        api.user_id = req
            .headers()
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(USER_HEADER))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .map(str::to_string);
        req.body().read_to_end(&mut api.body)?;

        let response = route(&self.ctx, &api);
        log::debug!("{} {} -> {}", api.method, api.path, response.status);

        res.status_code(usize::from(response.status), reason(response.status));
        res.header(response.content_type.header());
        if response.content_type == ContentType::Csv {
            res.header("Content-Disposition: attachment; filename=\"properties.csv\"");
        }
        res.body_vec(response.body);
        Ok(())
    }
}

/// Start serving on `bind`; the handle completes when the listener stops.
pub fn serve<P: StoreProvider>(ctx: AppContext<P>, bind: &str) -> io::Result<JoinHandle<()>> {
    let handle = HttpServer(ApiService::new(ctx)).start(bind)?;
    log::info!("listening on http://{bind}");
    Ok(handle)
}
