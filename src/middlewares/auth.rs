use crate::error::AppError;
use crate::services::AccountService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::rc::Rc;

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec![
                "/swagger-ui",
                "/api-docs/openapi.json",
                "/api/v1/lotteries",
                "/api/v1/results",
                "/send-otp",
                "/verify-otp",
            ],
            // 前缀匹配的公开路径（登出与刷新在处理函数中自行校验令牌）
            prefix_paths: vec!["/swagger-ui/", "/api-docs/", "/api/v1/auth/", "/api/v1/lotteries/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        // 检查完全匹配
        if self.exact_paths.contains(&path) {
            return true;
        }

        // 检查前缀匹配
        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    account_service: AccountService,
}

impl AuthMiddleware {
    pub fn new(account_service: AccountService) -> Self {
        Self { account_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            account_service: self.account_service.clone(),
            public_paths: Rc::new(PublicPaths::new()),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    account_service: AccountService,
    public_paths: Rc<PublicPaths>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 放行所有 CORS 预检请求
        if req.method() == Method::OPTIONS || self.public_paths.is_public_path(req.path()) {
            let fut = self.service.call(req);
            return Box::pin(fut);
        }

        // 提取Authorization header
        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        let service = Rc::clone(&self.service);
        let account_service = self.account_service.clone();
        Box::pin(async move {
            // 会话须仍然有效，登出后立即失效
            let user = account_service.authenticate(&token).await?;
            req.extensions_mut().insert(user);
            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/api/v1/auth/login"));
        assert!(paths.is_public_path("/api/v1/lotteries"));
        assert!(paths.is_public_path("/api/v1/lotteries/3"));
        assert!(paths.is_public_path("/send-otp"));
        assert!(!paths.is_public_path("/api/v1/tickets"));
        assert!(!paths.is_public_path("/api/v1/admin/lotteries"));
        assert!(!paths.is_public_path("/api/v1/user/profile"));
    }
}
