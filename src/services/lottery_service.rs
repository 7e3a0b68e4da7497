use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::storage::{self, LEDGER_KEY, SharedStore};
use crate::utils::{generate_ticket_number, validate_ticket_number};

const DEMO_LEDGER: &str = include_str!("../../data/demo_ledger.json");

/// Attempts at generating a ticket number not yet used in the lottery.
const MAX_NUMBER_ATTEMPTS: usize = 100;

/// Everything the ledger owns. Stored under one key so a draw is a single write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Ledger {
    lotteries: Vec<Lottery>,
    tickets: Vec<Ticket>,
    results: Vec<DrawResult>,
}

impl Ledger {
    fn lottery_index(&self, lottery_id: &str) -> AppResult<usize> {
        self.lotteries
            .iter()
            .position(|l| l.id == lottery_id)
            .ok_or_else(|| AppError::LotteryNotFound(lottery_id.to_string()))
    }

    fn number_taken(&self, lottery_id: &str, number: &str) -> bool {
        self.tickets
            .iter()
            .any(|t| t.lottery_id == lottery_id && t.ticket_number == number)
    }

    /// Drops records that break the data model invariants. Returns true if anything was removed.
    fn sanitize(&mut self) -> bool {
        let before = (self.lotteries.len(), self.tickets.len(), self.results.len());

        let mut seen = HashSet::new();
        self.lotteries.retain(|l| {
            let keep = l.is_consistent() && seen.insert(l.id.clone());
            if !keep {
                log::warn!("Dropping inconsistent stored lottery {}", l.id);
            }
            keep
        });

        let known: HashSet<&str> = self.lotteries.iter().map(|l| l.id.as_str()).collect();
        self.tickets.retain(|t| {
            let keep = known.contains(t.lottery_id.as_str());
            if !keep {
                log::warn!("Dropping ticket {} of unknown lottery {}", t.id, t.lottery_id);
            }
            keep
        });
        self.results.retain(|r| {
            let keep = known.contains(r.lottery_id.as_str());
            if !keep {
                log::warn!("Dropping result {} of unknown lottery {}", r.id, r.lottery_id);
            }
            keep
        });

        before != (self.lotteries.len(), self.tickets.len(), self.results.len())
    }
}

/// Lottery ledger: lotteries, issued tickets and declared results.
#[derive(Clone)]
pub struct LotteryService {
    store: SharedStore,
    state: Arc<RwLock<Ledger>>,
}

impl LotteryService {
    pub fn load(store: SharedStore, seed_demo: bool) -> AppResult<Self> {
        let stored: Option<Ledger> = storage::load(store.as_ref(), LEDGER_KEY)?;
        let (mut ledger, fresh) = match stored {
            Some(ledger) => (ledger, false),
            None if seed_demo => (serde_json::from_str(DEMO_LEDGER)?, true),
            None => (Ledger::default(), true),
        };

        if ledger.sanitize() || fresh {
            storage::save(store.as_ref(), LEDGER_KEY, &ledger)?;
        }
        log::info!(
            "Lottery ledger loaded: {} lotteries, {} tickets, {} results",
            ledger.lotteries.len(),
            ledger.tickets.len(),
            ledger.results.len()
        );

        Ok(Self {
            store,
            state: Arc::new(RwLock::new(ledger)),
        })
    }

    /// 获取彩票列表（可按状态、名称过滤）
    pub async fn list_lotteries(&self, query: &LotteryQuery) -> Vec<Lottery> {
        let needle = query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);

        self.state
            .read()
            .await
            .lotteries
            .iter()
            .filter(|l| query.status.is_none_or(|s| l.status == s))
            .filter(|l| {
                needle
                    .as_deref()
                    .is_none_or(|n| l.name.to_lowercase().contains(n))
            })
            .cloned()
            .collect()
    }

    pub async fn get_lottery(&self, lottery_id: &str) -> AppResult<Lottery> {
        let ledger = self.state.read().await;
        let idx = ledger.lottery_index(lottery_id)?;
        Ok(ledger.lotteries[idx].clone())
    }

    /// 购买彩票
    ///
    /// The ticket snapshots the current ticket price. Numbers are unique per lottery;
    /// when none is supplied one is generated.
    pub async fn purchase_ticket(
        &self,
        user_id: &str,
        request: PurchaseTicketRequest,
    ) -> AppResult<Ticket> {
        let mut ledger = self.state.write().await;
        let idx = ledger.lottery_index(&request.lottery_id)?;
        let lottery = &ledger.lotteries[idx];
        if lottery.status != LotteryStatus::Active {
            return Err(AppError::LotteryClosed(lottery.id.clone()));
        }

        let ticket_number = match request.ticket_number {
            Some(number) => {
                let number = number.trim().to_string();
                validate_ticket_number(&number)?;
                if ledger.number_taken(&lottery.id, &number) {
                    return Err(AppError::DuplicateTicketNumber(number));
                }
                number
            }
            None => (0..MAX_NUMBER_ATTEMPTS)
                .map(|_| generate_ticket_number())
                .find(|n| !ledger.number_taken(&lottery.id, n))
                .ok_or_else(|| {
                    AppError::InternalError(format!(
                        "No free ticket number left in lottery {}",
                        lottery.id
                    ))
                })?,
        };

        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            lottery_id: lottery.id.clone(),
            ticket_number,
            price: lottery.ticket_price,
            purchase_date: Utc::now(),
            status: TicketStatus::Pending,
        };

        // 写入失败时撤回
        ledger.tickets.push(ticket.clone());
        if let Err(e) = storage::save(self.store.as_ref(), LEDGER_KEY, &*ledger) {
            ledger.tickets.pop();
            return Err(e);
        }

        log::info!(
            "User {} bought ticket {} ({}) for lottery {}",
            ticket.user_id,
            ticket.id,
            ticket.ticket_number,
            ticket.lottery_id
        );
        Ok(ticket)
    }

    /// 开奖
    ///
    /// Fixes the winning number, settles every ticket of the lottery and records the
    /// result. The exclusive ledger lock is held throughout and the new state is
    /// persisted in one write before it becomes visible, so a lottery is settled once.
    pub async fn declare_winner(
        &self,
        lottery_id: &str,
        winning_number: Option<String>,
    ) -> AppResult<DrawOutcome> {
        let mut ledger = self.state.write().await;
        let idx = ledger.lottery_index(lottery_id)?;
        if ledger.lotteries[idx].status == LotteryStatus::Drawn {
            return Err(AppError::AlreadyDrawn(lottery_id.to_string()));
        }

        let winning_number = match winning_number {
            Some(number) => {
                let number = number.trim().to_string();
                validate_ticket_number(&number)?;
                number
            }
            None => generate_ticket_number(),
        };

        let mut next = ledger.clone();
        let lottery = &mut next.lotteries[idx];
        lottery.status = LotteryStatus::Drawn;
        lottery.winning_number = Some(winning_number.clone());
        let lottery = lottery.clone();

        let (mut winning_tickets, mut losing_tickets) = (0, 0);
        for ticket in next.tickets.iter_mut().filter(|t| t.lottery_id == lottery.id) {
            ticket.status = if ticket.ticket_number == winning_number {
                winning_tickets += 1;
                TicketStatus::Won
            } else {
                losing_tickets += 1;
                TicketStatus::Lost
            };
        }

        let result = DrawResult {
            id: Uuid::new_v4().to_string(),
            lottery_id: lottery.id.clone(),
            draw_date: Utc::now().date_naive(),
            winning_number,
            prize_amount: lottery.prize_amount,
        };
        next.results.push(result.clone());

        self.commit(&mut ledger, next)?;

        log::info!(
            "Lottery {} drawn with {}: {} winning, {} losing tickets",
            lottery.id,
            result.winning_number,
            winning_tickets,
            losing_tickets
        );
        Ok(DrawOutcome {
            lottery,
            result,
            winning_tickets,
            losing_tickets,
        })
    }

    /// Opens an upcoming lottery for ticket sales.
    pub async fn activate_lottery(&self, lottery_id: &str) -> AppResult<Lottery> {
        let mut ledger = self.state.write().await;
        let idx = ledger.lottery_index(lottery_id)?;
        let status = ledger.lotteries[idx].status;
        if status != LotteryStatus::Upcoming {
            return Err(AppError::InvalidStatusTransition(format!(
                "lottery {lottery_id} is {status:?}, only upcoming lotteries can be activated"
            )));
        }

        let mut next = ledger.clone();
        next.lotteries[idx].status = LotteryStatus::Active;
        let lottery = next.lotteries[idx].clone();
        self.commit(&mut ledger, next)?;

        log::info!("Lottery {lottery_id} is now open for ticket sales");
        Ok(lottery)
    }

    /// Tickets owned by `user_id`, in purchase order.
    pub async fn get_user_tickets(&self, user_id: &str) -> Vec<Ticket> {
        self.state
            .read()
            .await
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Results of every lottery the user holds a ticket in.
    pub async fn get_results_for_user(&self, user_id: &str) -> Vec<UserResultResponse> {
        let ledger = self.state.read().await;
        let user_tickets: Vec<&Ticket> = ledger
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        let lottery_ids: HashSet<&str> = user_tickets.iter().map(|t| t.lottery_id.as_str()).collect();

        ledger
            .results
            .iter()
            .filter(|r| lottery_ids.contains(r.lottery_id.as_str()))
            .map(|r| UserResultResponse {
                result: r.clone(),
                lottery_name: ledger
                    .lotteries
                    .iter()
                    .find(|l| l.id == r.lottery_id)
                    .map(|l| l.name.clone())
                    .unwrap_or_default(),
                won: user_tickets
                    .iter()
                    .any(|t| t.lottery_id == r.lottery_id && t.ticket_number == r.winning_number),
            })
            .collect()
    }

    /// All draw results, most recent draw first.
    pub async fn list_results(&self) -> Vec<DrawResult> {
        let mut results = self.state.read().await.results.clone();
        results.sort_by(|a, b| b.draw_date.cmp(&a.draw_date));
        results
    }

    pub async fn user_statistics(&self, user_id: &str) -> TicketStatistics {
        let tickets = self.get_user_tickets(user_id).await;
        let mut stats = TicketStatistics {
            total_tickets: tickets.len(),
            ..Default::default()
        };
        for ticket in &tickets {
            stats.total_spent += ticket.price;
            match ticket.status {
                TicketStatus::Pending => stats.pending_tickets += 1,
                TicketStatus::Won => stats.won_tickets += 1,
                TicketStatus::Lost => stats.lost_tickets += 1,
            }
        }
        if stats.total_tickets > 0 {
            stats.win_rate =
                ((stats.won_tickets as f64 / stats.total_tickets as f64) * 100.0).round() as u32;
        }
        stats
    }

    /// Lotteries grouped the way the admin panel shows them.
    pub async fn admin_overview(&self, today: NaiveDate) -> AdminLotteryOverview {
        let ledger = self.state.read().await;
        let mut overview = AdminLotteryOverview {
            pending_draw: Vec::new(),
            open: Vec::new(),
            upcoming: Vec::new(),
            completed: Vec::new(),
        };
        for lottery in &ledger.lotteries {
            let bucket = match lottery.status {
                LotteryStatus::Active if lottery.is_pending_draw(today) => &mut overview.pending_draw,
                LotteryStatus::Active => &mut overview.open,
                LotteryStatus::Upcoming => &mut overview.upcoming,
                LotteryStatus::Drawn => &mut overview.completed,
            };
            bucket.push(lottery.clone());
        }
        overview
    }

    /// Persists `next` and only then makes it the visible ledger.
    fn commit(&self, ledger: &mut Ledger, next: Ledger) -> AppResult<()> {
        storage::save(self.store.as_ref(), LEDGER_KEY, &next)?;
        *ledger = next;
        Ok(())
    }
}
