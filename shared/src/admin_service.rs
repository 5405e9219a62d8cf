use crate::http::{BoxedResponse, make_boxed_error_response, make_boxed_response};
use crate::metrics_defs::{MetricDef, render_definitions};
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Method, Request, StatusCode};
use std::convert::Infallible;
use std::future::{Ready, ready};
use std::sync::Arc;

type ReadinessCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Serves `/health`, `/ready` and `/metrics` on the admin listener.
pub struct AdminService {
    is_ready: ReadinessCheck,
    metric_defs: Vec<MetricDef>,
}

impl AdminService {
    pub fn new<F>(is_ready: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            is_ready: Arc::new(is_ready),
            metric_defs: Vec::new(),
        }
    }

    pub fn with_metric_defs<'a>(mut self, defs: impl IntoIterator<Item = &'a MetricDef>) -> Self {
        self.metric_defs.extend(defs.into_iter().copied());
        self
    }

    fn respond(&self, method: &Method, path: &str) -> BoxedResponse {
        if method != Method::GET {
            return make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED);
        }

        match path {
            "/health" => make_boxed_response(StatusCode::OK, "ok\n"),
            "/ready" => {
                if (self.is_ready)() {
                    make_boxed_response(StatusCode::OK, "ok\n")
                } else {
                    make_boxed_error_response(StatusCode::SERVICE_UNAVAILABLE)
                }
            }
            "/metrics" => make_boxed_response(
                StatusCode::OK,
                render_definitions(self.metric_defs.iter()),
            ),
            _ => make_boxed_error_response(StatusCode::NOT_FOUND),
        }
    }
}

impl Service<Request<Incoming>> for AdminService {
    type Response = BoxedResponse;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        ready(Ok(self.respond(req.method(), req.uri().path())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_defs::MetricType;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicBool, Ordering};

    const EVENTS: MetricDef = MetricDef {
        name: "stream.events",
        metric_type: MetricType::Counter,
        description: "Change events received",
    };

    async fn body_of(response: BoxedResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let ready_flag = Arc::new(AtomicBool::new(false));
        let flag = ready_flag.clone();
        let service = AdminService::new(move || flag.load(Ordering::Relaxed));

        let health = service.respond(&Method::GET, "/health");
        assert_eq!(health.status(), StatusCode::OK);

        let not_ready = service.respond(&Method::GET, "/ready");
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);

        ready_flag.store(true, Ordering::Relaxed);
        let ready = service.respond(&Method::GET, "/ready");
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(body_of(ready).await, "ok\n");
    }

    #[tokio::test]
    async fn test_metric_definitions() {
        let service = AdminService::new(|| true).with_metric_defs(&[EVENTS]);
        let response = service.respond(&Method::GET, "/metrics");
        assert_eq!(
            body_of(response).await,
            "stream.events Counter Change events received\n"
        );

        let missing = service.respond(&Method::GET, "/nope");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let post = service.respond(&Method::POST, "/health");
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
