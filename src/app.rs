use actix_web::web;

use crate::config::Config;
use crate::error::AppResult;
use crate::external::Notifier;
use crate::handlers;
use crate::services::*;
use crate::storage::{self, SharedStore};
use crate::swagger::swagger_config;
use crate::utils::JwtService;

/// Every service the HTTP layer needs, wired from one `Config`.
#[derive(Clone)]
pub struct AppServices {
    pub account_service: AccountService,
    pub lottery_service: LotteryService,
    pub otp_service: OtpService,
    pub user_service: UserService,
}

impl AppServices {
    pub fn build(config: &Config) -> AppResult<Self> {
        let store = storage::open_store(&config.storage)?;
        let notifier = Notifier::from_config(&config.notifier);
        Self::assemble(config, store, notifier)
    }

    /// Same as `build` with an explicit store and notification channel.
    pub fn assemble(config: &Config, store: SharedStore, notifier: Notifier) -> AppResult<Self> {
        let jwt_service = JwtService::new(
            &config.jwt.secret,
            config.jwt.access_token_expires_in,
            config.jwt.refresh_token_expires_in,
        );

        let account_service = AccountService::load(
            store.clone(),
            jwt_service,
            notifier,
            config.security.clone(),
            config.demo.seed_data,
        )?;
        let lottery_service = LotteryService::load(store, config.demo.seed_data)?;
        let otp_service = OtpService::new(account_service.clone(), config.security.otp_expires_in);
        let user_service = UserService::new(account_service.clone(), lottery_service.clone());

        Ok(Self {
            account_service,
            lottery_service,
            otp_service,
            user_service,
        })
    }

    /// Registers app data and every route. Middleware is wrapped by the caller.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.account_service.clone()))
            .app_data(web::Data::new(self.lottery_service.clone()))
            .app_data(web::Data::new(self.otp_service.clone()))
            .app_data(web::Data::new(self.user_service.clone()))
            .configure(swagger_config)
            .configure(handlers::otp_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::lottery_config)
                    .configure(handlers::ticket_config)
                    .configure(handlers::user_config)
                    .configure(handlers::admin_config),
            );
    }
}
