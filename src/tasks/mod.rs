//! Background housekeeping.
//!
//! Call `spawn_all` once during startup. Tasks are detached via `tokio::spawn`.

use chrono::Utc;

use crate::services::{AccountService, LotteryService, OtpService};

pub fn spawn_all(
    account_service: AccountService,
    otp_service: OtpService,
    lottery_service: LotteryService,
) {
    // 清理过期会话、重置令牌与验证码（每 10 分钟）
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            match account_service.purge_expired(now).await {
                Ok(n) if n > 0 => log::info!("Expired sessions and reset tokens removed: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to purge expired sessions: {e:?}"),
            }
            let n = otp_service.purge_expired(now).await;
            if n > 0 {
                log::info!("Expired OTP codes removed: {n}");
            }
            tokio::time::sleep(std::time::Duration::from_secs(600)).await;
        }
    });

    // 提醒管理员开奖（每小时）
    tokio::spawn(async move {
        loop {
            let overview = lottery_service.admin_overview(Utc::now().date_naive()).await;
            for lottery in &overview.pending_draw {
                log::warn!(
                    "Lottery {} ({}) passed its draw date {} and awaits a winner",
                    lottery.id,
                    lottery.name,
                    lottery.draw_date
                );
            }
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
    });
}
