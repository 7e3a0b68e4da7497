use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// upcoming -> active -> drawn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LotteryStatus {
    Upcoming,
    Active,
    Drawn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    Won,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Lottery {
    pub id: String,
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "2023-12-31")]
    pub draw_date: NaiveDate,
    /// 票价 (美分)
    pub ticket_price: i64,
    /// 奖金 (美分)
    pub prize_amount: i64,
    pub image: String,
    pub status: LotteryStatus,
    /// Present iff `status == Drawn`.
    pub winning_number: Option<String>,
}

impl Lottery {
    pub fn is_consistent(&self) -> bool {
        (self.status == LotteryStatus::Drawn) == self.winning_number.is_some()
    }

    /// Active but past its draw date: waiting for an admin to declare a winner.
    pub fn is_pending_draw(&self, today: NaiveDate) -> bool {
        self.status == LotteryStatus::Active && self.draw_date <= today
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    pub id: String,
    pub user_id: String,
    pub lottery_id: String,
    pub ticket_number: String,
    /// Lottery ticket price at purchase time (cents).
    pub price: i64,
    pub purchase_date: DateTime<Utc>,
    pub status: TicketStatus,
}

/// Denormalized record of a completed draw, one per drawn lottery.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawResult {
    pub id: String,
    pub lottery_id: String,
    #[schema(value_type = String, example = "2023-12-31")]
    pub draw_date: NaiveDate,
    pub winning_number: String,
    pub prize_amount: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct LotteryQuery {
    pub status: Option<LotteryStatus>,
    /// case-insensitive substring of the lottery name
    pub q: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PurchaseTicketRequest {
    #[schema(example = "1")]
    pub lottery_id: String,
    /// Generated when omitted.
    #[schema(example = "12-34-56-78-90")]
    pub ticket_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct TicketQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Default)]
pub struct DeclareWinnerRequest {
    /// Generated when omitted.
    #[schema(example = "12-34-56-78-90")]
    pub winning_number: Option<String>,
}

/// Outcome of a draw as returned to the admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DrawOutcome {
    pub lottery: Lottery,
    pub result: DrawResult,
    pub winning_tickets: usize,
    pub losing_tickets: usize,
}

/// A draw result seen from one ticket holder.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResultResponse {
    #[serde(flatten)]
    pub result: DrawResult,
    pub lottery_name: String,
    /// whether one of the user's tickets matched
    pub won: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TicketStatistics {
    pub total_tickets: usize,
    pub pending_tickets: usize,
    pub won_tickets: usize,
    pub lost_tickets: usize,
    /// cents
    pub total_spent: i64,
    /// won / total, rounded percentage
    pub win_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminLotteryOverview {
    pub pending_draw: Vec<Lottery>,
    pub open: Vec<Lottery>,
    pub upcoming: Vec<Lottery>,
    pub completed: Vec<Lottery>,
}
