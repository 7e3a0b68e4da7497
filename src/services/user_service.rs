use crate::error::AppResult;
use crate::models::*;
use crate::services::{AccountService, LotteryService};

/// Per-user views that combine the account directory with the ledger.
#[derive(Clone)]
pub struct UserService {
    account_service: AccountService,
    lottery_service: LotteryService,
}

impl UserService {
    pub fn new(account_service: AccountService, lottery_service: LotteryService) -> Self {
        Self {
            account_service,
            lottery_service,
        }
    }

    /// 获取用户个人资料和统计信息
    pub async fn get_user_profile(
        &self,
        user_id: &str,
    ) -> AppResult<(UserResponse, TicketStatistics)> {
        let user = self.account_service.get_user(user_id).await?;
        let statistics = self.lottery_service.user_statistics(user_id).await;
        Ok((user, statistics))
    }

    /// 获取用户彩票（分页，最新购买在前）
    pub async fn get_user_tickets(
        &self,
        user_id: &str,
        query: &TicketQuery,
    ) -> PaginatedResponse<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .lottery_service
            .get_user_tickets(user_id)
            .await
            .into_iter()
            .filter(|t| query.status.is_none_or(|s| t.status == s))
            .collect();
        tickets.reverse();

        let params = PaginationParams::new(query.page, query.per_page);
        PaginatedResponse::from_items(tickets, &params)
    }

    /// 获取用户参与的开奖结果
    pub async fn get_user_results(&self, user_id: &str) -> Vec<UserResultResponse> {
        let mut results = self.lottery_service.get_results_for_user(user_id).await;
        results.sort_by(|a, b| b.result.draw_date.cmp(&a.result.draw_date));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::external::Notifier;
    use crate::storage::{MemoryStore, SharedStore};
    use crate::utils::JwtService;
    use std::sync::Arc;

    fn user_service() -> UserService {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let accounts = AccountService::load(
            store.clone(),
            JwtService::new("test-secret", 3600, 7200),
            Notifier::outbox(),
            SecurityConfig {
                bcrypt_cost: 4,
                ..SecurityConfig::default()
            },
            true,
        )
        .unwrap();
        let ledger = LotteryService::load(store, true).unwrap();
        UserService::new(accounts, ledger)
    }

    #[tokio::test]
    async fn test_profile_includes_ticket_statistics() {
        let svc = user_service();
        let (user, stats) = svc.get_user_profile("2").await.unwrap();
        assert_eq!(user.email, "user@example.com");
        assert_eq!(stats.total_tickets, 3);

        assert!(svc.get_user_profile("404").await.is_err());
    }

    #[tokio::test]
    async fn test_user_tickets_newest_first_with_filter() {
        let svc = user_service();
        let all = svc
            .get_user_tickets(
                "2",
                &TicketQuery {
                    page: None,
                    per_page: None,
                    status: None,
                },
            )
            .await;
        assert_eq!(all.total, 3);
        assert_eq!(all.data[0].id, "3");

        let lost = svc
            .get_user_tickets(
                "2",
                &TicketQuery {
                    page: None,
                    per_page: None,
                    status: Some(TicketStatus::Lost),
                },
            )
            .await;
        assert_eq!(lost.total, 1);
        assert_eq!(lost.data[0].lottery_id, "4");

        let second_page = svc
            .get_user_tickets(
                "2",
                &TicketQuery {
                    page: Some(2),
                    per_page: Some(2),
                    status: None,
                },
            )
            .await;
        assert_eq!(second_page.data.len(), 1);
        assert_eq!(second_page.total_pages, 2);
    }

    #[tokio::test]
    async fn test_user_results() {
        let svc = user_service();
        let results = svc.get_user_results("2").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result.lottery_id, "4");
        assert!(svc.get_user_results("1").await.is_empty());
    }
}
