use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::handlers::current_user;
use crate::models::*;
use crate::services::{LotteryService, UserService};

#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    tag = "ticket",
    request_body = PurchaseTicketRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "购票成功", body = Ticket),
        (status = 401, description = "未授权"),
        (status = 404, description = "彩票不存在"),
        (status = 409, description = "彩票未开放或号码已被占用")
    )
)]
pub async fn purchase_ticket(
    lottery_service: web::Data<LotteryService>,
    req: HttpRequest,
    request: web::Json<PurchaseTicketRequest>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    match lottery_service
        .purchase_ticket(&user.user_id, request.into_inner())
        .await
    {
        Ok(ticket) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ticket
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    tag = "ticket",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<TicketStatus>, Query, description = "按状态过滤")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取我的彩票成功"),
        (status = 401, description = "未授权")
    )
)]
pub async fn get_tickets(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<TicketQuery>,
) -> Result<HttpResponse> {
    let user = match current_user(&req) {
        Ok(user) => user,
        Err(e) => return Ok(e.error_response()),
    };

    let tickets = user_service.get_user_tickets(&user.user_id, &query).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": tickets
    })))
}

pub fn ticket_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/tickets")
            .route(web::post().to(purchase_ticket))
            .route(web::get().to(get_tickets)),
    );
}
