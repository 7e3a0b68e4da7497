use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

use crate::models::*;
use crate::services::LotteryService;

#[utoipa::path(
    get,
    path = "/api/v1/lotteries",
    tag = "lottery",
    params(
        ("status" = Option<LotteryStatus>, Query, description = "按状态过滤"),
        ("q" = Option<String>, Query, description = "按名称搜索（不区分大小写）")
    ),
    responses(
        (status = 200, description = "获取彩票列表成功", body = [Lottery])
    )
)]
pub async fn list_lotteries(
    lottery_service: web::Data<LotteryService>,
    query: web::Query<LotteryQuery>,
) -> Result<HttpResponse> {
    let lotteries = lottery_service.list_lotteries(&query).await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": lotteries
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/lotteries/{id}",
    tag = "lottery",
    params(
        ("id" = String, Path, description = "彩票ID")
    ),
    responses(
        (status = 200, description = "获取彩票成功", body = Lottery),
        (status = 404, description = "彩票不存在")
    )
)]
pub async fn get_lottery(
    lottery_service: web::Data<LotteryService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    match lottery_service.get_lottery(&path).await {
        Ok(lottery) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": lottery
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/results",
    tag = "lottery",
    responses(
        (status = 200, description = "获取开奖结果成功", body = [DrawResult])
    )
)]
pub async fn list_results(lottery_service: web::Data<LotteryService>) -> Result<HttpResponse> {
    let results = lottery_service.list_results().await;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": results
    })))
}

pub fn lottery_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/lotteries", web::get().to(list_lotteries))
        .route("/lotteries/{id}", web::get().to(get_lottery))
        .route("/results", web::get().to(list_results));
}
