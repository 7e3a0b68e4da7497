use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use lottery_backend::{
    AppServices,
    config::Config,
    middlewares::{AuthMiddleware, create_cors},
    tasks,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().context("Failed to load configuration")?;

    // 创建服务并加载存储中的数据
    let services = AppServices::build(&config).context("Failed to initialize services")?;

    // 启动后台任务
    tasks::spawn_all(
        services.account_service.clone(),
        services.otp_service.clone(),
        services.lottery_service.clone(),
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origins = config.server.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(services.account_service.clone()))
            .wrap(create_cors(&allowed_origins))
            .wrap(Logger::default())
            .configure(|cfg| services.configure(cfg))
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
