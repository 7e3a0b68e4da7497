use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::logout,
        handlers::auth::request_password_reset,
        handlers::auth::complete_password_reset,
        handlers::lottery::list_lotteries,
        handlers::lottery::get_lottery,
        handlers::lottery::list_results,
        handlers::ticket::purchase_ticket,
        handlers::ticket::get_tickets,
        handlers::user::get_profile,
        handlers::user::update_profile,
        handlers::user::change_password,
        handlers::user::get_results,
        handlers::admin::lottery_overview,
        handlers::admin::list_users,
        handlers::admin::declare_winner,
        handlers::admin::activate_lottery,
        handlers::otp::send_otp,
        handlers::otp::verify_otp,
    ),
    components(
        schemas(
            Role,
            UserResponse,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            AuthResponse,
            PasswordResetRequest,
            PasswordResetResponse,
            CompletePasswordResetRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            LotteryStatus,
            TicketStatus,
            Lottery,
            Ticket,
            DrawResult,
            PurchaseTicketRequest,
            DeclareWinnerRequest,
            DrawOutcome,
            UserResultResponse,
            TicketStatistics,
            AdminLotteryOverview,
            SendOtpRequest,
            SendOtpResponse,
            VerifyOtpRequest,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Account and session API"),
        (name = "lottery", description = "Public lottery and results API"),
        (name = "ticket", description = "Ticket purchase API"),
        (name = "user", description = "User profile API"),
        (name = "admin", description = "Lottery administration API"),
        (name = "otp", description = "One-time passcode password reset"),
    ),
    info(
        title = "Lottery Backend API",
        version = "1.0.0",
        description = "Lottery ticketing REST API documentation"
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
