//! Daily score ledger: answer scoring, streaks, overtime penalties and the
//! once-per-day rollover into history.

use std::collections::VecDeque;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::storage::{ScoringConfig, WeeklyEntry};

const WEEKLY_CAPACITY: usize = 7;

/// A completed quiz item reported by the answer source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub is_correct: bool,
    #[serde(default)]
    pub category: Option<String>,
    pub elapsed_answer_secs: f64,
}

impl Answer {
    pub fn correct(elapsed_answer_secs: f64) -> Self {
        Self {
            is_correct: true,
            category: None,
            elapsed_answer_secs,
        }
    }

    pub fn wrong(elapsed_answer_secs: f64) -> Self {
        Self {
            is_correct: false,
            category: None,
            elapsed_answer_secs,
        }
    }
}

/// Today's ledger. Reseeded at each daily reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLedger {
    pub date: NaiveDate,
    #[serde(default)]
    pub daily_score: i64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub highest_streak: u32,
    #[serde(default)]
    pub overtime_penalty_accum: i64,
    #[serde(default)]
    pub daily_rollover_bonus: i64,
    #[serde(default)]
    pub answered_today: u32,
    #[serde(default)]
    pub correct_today: u32,
    /// Streak value that last produced a milestone.
    #[serde(default)]
    pub last_milestone: u32,
    /// Open overtime window. Carried across the daily reset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_window: Option<PenaltyWindow>,
}

impl DailyLedger {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            daily_score: 0,
            current_streak: 0,
            highest_streak: 0,
            overtime_penalty_accum: 0,
            daily_rollover_bonus: 0,
            answered_today: 0,
            correct_today: 0,
            last_milestone: 0,
            penalty_window: None,
        }
    }
}

/// Long-lived aggregates, touched only by the daily reset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreHistory {
    #[serde(default)]
    pub all_time_high_score: i64,
    #[serde(default)]
    pub total_days_played: u32,
    #[serde(default)]
    pub weekly_scores: VecDeque<WeeklyEntry>,
    #[serde(default)]
    pub monthly_total: i64,
    #[serde(default)]
    pub yesterday_score: i64,
}

impl ScoreHistory {
    pub fn weekly_average(&self) -> f64 {
        if self.weekly_scores.is_empty() {
            return 0.0;
        }
        let sum: i64 = self.weekly_scores.iter().map(|e| e.score).sum();
        sum as f64 / self.weekly_scores.len() as f64
    }
}

/// Read-only view handed to UI consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreInfo {
    pub daily_score: i64,
    pub current_streak: u32,
    pub highest_streak: u32,
    pub overtime_penalty_accum: i64,
    pub daily_rollover_bonus: i64,
    pub all_time_high_score: i64,
    pub total_days_played: u32,
    pub weekly_average: f64,
    pub yesterday_score: i64,
    pub monthly_total: i64,
    pub weekly_scores: Vec<i64>,
    pub answered_today: u32,
    pub correct_today: u32,
    pub accuracy_pct: f64,
}

/// Everything derived during a daily reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverSummary {
    pub previous_date: NaiveDate,
    pub date: NaiveDate,
    pub yesterday_score: i64,
    pub unused_minutes: u64,
    pub rollover_bonus: i64,
    pub new_high_score: bool,
    pub all_time_high_score: i64,
    pub total_days_played: u32,
    pub weekly_average: f64,
    pub monthly_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub points: u32,
    /// Streak value if this answer crossed a milestone.
    pub milestone: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PenaltyOutcome {
    pub penalty: i64,
    /// Each multiple of the warning step crossed by this penalty, ascending.
    pub warnings_crossed: Vec<i64>,
    /// The score went negative and the punitive streak rule fired.
    pub punished: bool,
}

/// Overtime window: open while backgrounded at zero balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyWindow {
    pub opened_at_ms: u64,
    /// Instant up to which overtime has been charged.
    pub last_checked_ms: u64,
}

/// Points for one answer.
///
/// `base + max(0, (window - elapsed) / window) * base * time_factor
///  + streak * base * streak_factor`, rounded; zero when incorrect.
pub fn answer_points(cfg: &ScoringConfig, is_correct: bool, elapsed_secs: f64, streak: u32) -> u32 {
    if !is_correct {
        return 0;
    }
    let base = f64::from(cfg.base_points);
    let window = f64::from(cfg.time_bonus_window_secs);
    let time_bonus = if window > 0.0 {
        ((window - elapsed_secs.max(0.0)) / window).max(0.0) * base * cfg.time_bonus_factor
    } else {
        0.0
    };
    let streak_bonus = f64::from(streak) * base * cfg.streak_bonus_factor;
    (base + time_bonus + streak_bonus).round().max(0.0) as u32
}

/// Score, streak and history bookkeeping.
#[derive(Debug, Clone)]
pub struct ScoreLedger {
    scoring: ScoringConfig,
    daily: DailyLedger,
    history: ScoreHistory,
}

impl ScoreLedger {
    pub fn new(scoring: ScoringConfig, today: NaiveDate) -> Self {
        Self {
            scoring,
            daily: DailyLedger::new(today),
            history: ScoreHistory::default(),
        }
    }

    /// Rebuild from persisted records, defaulting whatever is missing.
    pub fn restore(
        scoring: ScoringConfig,
        daily: Option<DailyLedger>,
        history: Option<ScoreHistory>,
        today: NaiveDate,
    ) -> Self {
        let mut history = history.unwrap_or_default();
        while history.weekly_scores.len() > WEEKLY_CAPACITY {
            history.weekly_scores.pop_front();
        }
        Self {
            daily: daily.unwrap_or_else(|| DailyLedger::new(today)),
            history,
            scoring,
        }
    }

    pub fn daily(&self) -> &DailyLedger {
        &self.daily
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    pub fn penalty_window_open(&self) -> bool {
        self.daily.penalty_window.is_some()
    }

    pub fn info(&self) -> ScoreInfo {
        let d = &self.daily;
        let h = &self.history;
        let accuracy_pct = if d.answered_today == 0 {
            0.0
        } else {
            f64::from(d.correct_today) / f64::from(d.answered_today) * 100.0
        };
        ScoreInfo {
            daily_score: d.daily_score,
            current_streak: d.current_streak,
            highest_streak: d.highest_streak,
            overtime_penalty_accum: d.overtime_penalty_accum,
            daily_rollover_bonus: d.daily_rollover_bonus,
            all_time_high_score: h.all_time_high_score,
            total_days_played: h.total_days_played,
            weekly_average: h.weekly_average(),
            yesterday_score: h.yesterday_score,
            monthly_total: h.monthly_total,
            weekly_scores: h.weekly_scores.iter().map(|e| e.score).collect(),
            answered_today: d.answered_today,
            correct_today: d.correct_today,
            accuracy_pct,
        }
    }

    // ── Scoring ──────────────────────────────────────────────────────

    pub fn record_answer(&mut self, answer: &Answer) -> AnswerOutcome {
        let points = answer_points(
            &self.scoring,
            answer.is_correct,
            answer.elapsed_answer_secs,
            self.daily.current_streak,
        );
        self.adjust_score(i64::from(points));
        self.daily.answered_today += 1;

        let mut milestone = None;
        if answer.is_correct {
            self.daily.correct_today += 1;
            self.daily.current_streak += 1;
            self.daily.highest_streak = self.daily.highest_streak.max(self.daily.current_streak);

            let streak = self.daily.current_streak;
            let every = self.scoring.milestone_every;
            if every > 0 && streak % every == 0 && self.daily.last_milestone != streak {
                self.daily.last_milestone = streak;
                milestone = Some(streak);
            }
        } else {
            self.daily.current_streak = 0;
            self.daily.last_milestone = 0;
        }
        AnswerOutcome { points, milestone }
    }

    /// Apply a score delta, clamped at the floor.
    ///
    /// When the score crosses from non-negative to negative the streak is
    /// zeroed and the highest streak loses one.
    fn adjust_score(&mut self, delta: i64) -> bool {
        let before = self.daily.daily_score;
        self.daily.daily_score = before.saturating_add(delta).max(self.scoring.score_floor);
        if before >= 0 && self.daily.daily_score < 0 {
            self.daily.current_streak = 0;
            self.daily.last_milestone = 0;
            self.daily.highest_streak = self.daily.highest_streak.saturating_sub(1);
            return true;
        }
        false
    }

    // ── Overtime penalty ─────────────────────────────────────────────

    /// Start charging overtime from `at_ms`. No-op if already open.
    pub fn open_penalty_window(&mut self, at_ms: u64) {
        if self.daily.penalty_window.is_none() {
            self.daily.penalty_window = Some(PenaltyWindow {
                opened_at_ms: at_ms,
                last_checked_ms: at_ms,
            });
        }
    }

    pub fn close_penalty_window(&mut self) {
        self.daily.penalty_window = None;
    }

    /// Charge overtime accrued since the last charged instant.
    ///
    /// The checkpoint advances only by the time actually paid for, so
    /// sub-minute remainders carry into the next check.
    pub fn check_penalty(
        &mut self,
        now_ms: u64,
        available_secs: u64,
        backgrounded: bool,
    ) -> Option<PenaltyOutcome> {
        if available_secs > 0 || !backgrounded {
            return None;
        }
        let per_minute = u64::from(self.scoring.penalty_points_per_minute);
        let window = self.daily.penalty_window.as_mut()?;
        if per_minute == 0 {
            return None;
        }
        if now_ms < window.last_checked_ms {
            warn!(
                now_ms,
                last_checked_ms = window.last_checked_ms,
                "clock moved backwards, penalty elapsed clamped to zero"
            );
            window.last_checked_ms = now_ms;
            return None;
        }
        let elapsed_ms = now_ms - window.last_checked_ms;
        let penalty = elapsed_ms * per_minute / 60_000;
        if penalty == 0 {
            return None;
        }
        window.last_checked_ms += penalty * 60_000 / per_minute;

        let penalty = penalty as i64;
        let accum_before = self.daily.overtime_penalty_accum;
        let punished = self.adjust_score(-penalty);
        self.daily.overtime_penalty_accum += penalty;

        let step = i64::from(self.scoring.penalty_warning_step);
        let warnings_crossed = if step > 0 {
            (accum_before / step + 1..=self.daily.overtime_penalty_accum / step)
                .map(|n| n * step)
                .collect()
        } else {
            Vec::new()
        };

        info!(
            penalty,
            daily_score = self.daily.daily_score,
            accum = self.daily.overtime_penalty_accum,
            "overtime penalty applied"
        );
        Some(PenaltyOutcome {
            penalty,
            warnings_crossed,
            punished,
        })
    }

    // ── Daily rollover ───────────────────────────────────────────────

    pub fn rollover_due(&self, today: NaiveDate) -> bool {
        self.daily.date != today
    }

    /// Archive the current day into history and reseed today's ledger,
    /// pre-funded with points for unused balance.
    pub fn rollover(&mut self, today: NaiveDate, available_secs: u64) -> RolloverSummary {
        let previous_date = self.daily.date;
        let yesterday_score = self.daily.daily_score;

        let unused_minutes = (available_secs / 60).min(self.scoring.rollover_cap_minutes);
        let rollover_bonus =
            unused_minutes as i64 * i64::from(self.scoring.rollover_points_per_minute);

        let new_high_score = yesterday_score > self.history.all_time_high_score;
        if new_high_score {
            self.history.all_time_high_score = yesterday_score;
        }
        if yesterday_score > 0 {
            self.history.total_days_played += 1;
        }
        self.history.yesterday_score = yesterday_score;

        self.history.weekly_scores.push_back(WeeklyEntry {
            date: previous_date,
            score: yesterday_score,
        });
        while self.history.weekly_scores.len() > WEEKLY_CAPACITY {
            self.history.weekly_scores.pop_front();
        }

        let same_month =
            previous_date.year() == today.year() && previous_date.month() == today.month();
        self.history.monthly_total = if same_month {
            self.history.weekly_scores.iter().map(|e| e.score).sum()
        } else {
            rollover_bonus
        };

        self.daily = DailyLedger {
            date: today,
            daily_score: rollover_bonus,
            highest_streak: self.daily.highest_streak,
            daily_rollover_bonus: rollover_bonus,
            penalty_window: self.daily.penalty_window,
            ..DailyLedger::new(today)
        };

        let summary = RolloverSummary {
            previous_date,
            date: today,
            yesterday_score,
            unused_minutes,
            rollover_bonus,
            new_high_score,
            all_time_high_score: self.history.all_time_high_score,
            total_days_played: self.history.total_days_played,
            weekly_average: self.history.weekly_average(),
            monthly_total: self.history.monthly_total,
        };
        info!(
            %previous_date,
            %today,
            yesterday_score,
            rollover_bonus,
            "daily reset"
        );
        summary
    }

    /// Forget every score and history entry.
    pub fn erase(&mut self, today: NaiveDate) {
        self.daily = DailyLedger::new(today);
        self.history = ScoreHistory::default();
    }
}
