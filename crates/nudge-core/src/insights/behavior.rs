//! Behavior adaptation
//!
//! Users answer nudges with accept, ignore or snooze. Those answers feed a
//! [`BehaviorProfile`], which picks a [`SensitivityLevel`]. The level scales
//! rule thresholds, caps how many nudges a run may produce, and together with
//! quiet hours decides when a nudge should be delivered.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BehaviorConfig;
use crate::db::{BehaviorEvent, Database};
use crate::error::Result;
use crate::models::{Nudge, NudgeStatus};

use super::types::InsightKind;

/// Days a snoozed nudge keeps its insight hidden
pub const SNOOZE_DAYS: u32 = 3;

/// A user's answer to a nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackResponse {
    Accepted,
    Ignored,
    Snoozed,
}

impl FeedbackResponse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Ignored => "ignored",
            Self::Snoozed => "snoozed",
        }
    }

    /// Nudge status a response moves the nudge to
    pub fn nudge_status(&self) -> NudgeStatus {
        match self {
            Self::Accepted => NudgeStatus::Accepted,
            Self::Ignored => NudgeStatus::Ignored,
            Self::Snoozed => NudgeStatus::Snoozed,
        }
    }
}

impl fmt::Display for FeedbackResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FeedbackResponse {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accepted" | "accept" => Ok(Self::Accepted),
            "ignored" | "ignore" | "dismissed" => Ok(Self::Ignored),
            "snoozed" | "snooze" => Ok(Self::Snoozed),
            _ => Err(format!("Unknown feedback response: {}", s)),
        }
    }
}

/// How readily rules should fire for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    /// User mostly ignores nudges: fewer, stronger signals only
    Low,
    Normal,
    /// User acts on nudges: surface more, earlier
    High,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of a threshold triggers a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDirection {
    /// Fires when the observed value is at or above the threshold
    Above,
    /// Fires when the observed value is at or below the threshold
    Below,
}

/// Response counts for a group of events
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseStats {
    pub accepted: usize,
    pub ignored: usize,
    pub snoozed: usize,
}

impl ResponseStats {
    fn record(&mut self, response: FeedbackResponse) {
        match response {
            FeedbackResponse::Accepted => self.accepted += 1,
            FeedbackResponse::Ignored => self.ignored += 1,
            FeedbackResponse::Snoozed => self.snoozed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.accepted + self.ignored + self.snoozed
    }

    pub fn accept_rate(&self) -> f64 {
        ratio(self.accepted, self.total())
    }

    pub fn ignore_rate(&self) -> f64 {
        ratio(self.ignored, self.total())
    }

    pub fn snooze_rate(&self) -> f64 {
        ratio(self.snoozed, self.total())
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Everything the engine needs to know about how a user reacts to nudges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub user_id: String,
    pub samples: usize,
    pub overall: ResponseStats,
    pub accept_rate: f64,
    pub ignore_rate: f64,
    pub snooze_rate: f64,
    pub by_kind: BTreeMap<InsightKind, ResponseStats>,
    /// Most common hour among accepted nudges
    pub preferred_hour: Option<u32>,
    pub sensitivity: SensitivityLevel,
    pub suppressed_kinds: Vec<InsightKind>,
}

impl BehaviorProfile {
    /// Profile for a user with no feedback yet
    pub fn neutral(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            samples: 0,
            overall: ResponseStats::default(),
            accept_rate: 0.0,
            ignore_rate: 0.0,
            snooze_rate: 0.0,
            by_kind: BTreeMap::new(),
            preferred_hour: None,
            sensitivity: SensitivityLevel::Normal,
            suppressed_kinds: Vec::new(),
        }
    }

    pub fn is_suppressed(&self, kind: InsightKind) -> bool {
        self.suppressed_kinds.contains(&kind)
    }
}

/// Turns feedback history into thresholds, volume and timing decisions
#[derive(Debug, Clone, Default)]
pub struct BehaviorAdapter {
    config: BehaviorConfig,
}

impl BehaviorAdapter {
    pub fn new(config: BehaviorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// Load a user's events and build their profile
    pub fn load_profile(&self, db: &Database, user_id: &str) -> Result<BehaviorProfile> {
        let events = db.list_behavior_events(user_id)?;
        Ok(self.profile(user_id, &events))
    }

    /// Build a profile from raw feedback events
    pub fn profile(&self, user_id: &str, events: &[BehaviorEvent]) -> BehaviorProfile {
        let mut overall = ResponseStats::default();
        let mut by_kind: BTreeMap<InsightKind, ResponseStats> = BTreeMap::new();
        let mut accepted_hours = [0usize; 24];

        for event in events {
            overall.record(event.response);
            by_kind.entry(event.kind).or_default().record(event.response);
            if event.response == FeedbackResponse::Accepted {
                accepted_hours[event.hour.min(23) as usize] += 1;
            }
        }

        // Earliest hour wins ties
        let preferred_hour = accepted_hours
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(hour, _)| hour as u32);

        let suppressed_kinds = by_kind
            .iter()
            .filter(|(_, stats)| {
                stats.total() >= self.config.min_samples
                    && stats.ignore_rate() >= self.config.suppress_cutoff
            })
            .map(|(kind, _)| *kind)
            .collect();

        BehaviorProfile {
            user_id: user_id.to_string(),
            samples: overall.total(),
            overall,
            accept_rate: overall.accept_rate(),
            ignore_rate: overall.ignore_rate(),
            snooze_rate: overall.snooze_rate(),
            by_kind,
            preferred_hour,
            sensitivity: self.sensitivity(&overall),
            suppressed_kinds,
        }
    }

    /// Sensitivity for a set of response counts
    pub fn sensitivity(&self, stats: &ResponseStats) -> SensitivityLevel {
        if stats.total() < self.config.min_samples {
            SensitivityLevel::Normal
        } else if stats.ignore_rate() >= self.config.ignore_cutoff {
            SensitivityLevel::Low
        } else if stats.accept_rate() >= self.config.accept_cutoff {
            SensitivityLevel::High
        } else {
            SensitivityLevel::Normal
        }
    }

    /// Scale a base threshold for a sensitivity level
    ///
    /// Low sensitivity moves the threshold away from the triggering side,
    /// high sensitivity moves it toward it.
    pub fn adjust_threshold(
        &self,
        level: SensitivityLevel,
        base: f64,
        direction: ThresholdDirection,
    ) -> f64 {
        let multiplier = match level {
            SensitivityLevel::Low => self.config.low_multiplier,
            SensitivityLevel::Normal => return base,
            SensitivityLevel::High => self.config.high_multiplier,
        };
        if multiplier <= 0.0 {
            return base;
        }
        match direction {
            ThresholdDirection::Above => base * multiplier,
            ThresholdDirection::Below => base / multiplier,
        }
    }

    /// Maximum nudges a single run may produce
    pub fn max_nudges(&self, level: SensitivityLevel) -> usize {
        match level {
            SensitivityLevel::Low => self.config.max_nudges_low,
            SensitivityLevel::Normal => self.config.max_nudges_normal,
            SensitivityLevel::High => self.config.max_nudges_high,
        }
    }

    /// Whether an hour (0-23, UTC) falls in the quiet window
    pub fn in_quiet_hours(&self, hour: u32) -> bool {
        let (start, end) = (self.config.quiet_start_hour, self.config.quiet_end_hour);
        if start == end {
            false
        } else if start > end {
            hour >= start || hour < end
        } else {
            hour >= start && hour < end
        }
    }

    /// When a nudge generated at `now` should be delivered
    ///
    /// Outside quiet hours with no preferred hour, that is `now`. Inside
    /// quiet hours, delivery waits for the end of the window. A preferred
    /// hour later the same day (and outside quiet hours) delays delivery to
    /// that hour.
    pub fn next_delivery_time(
        &self,
        profile: &BehaviorProfile,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let candidate = if self.in_quiet_hours(now.hour()) {
            let mut end = at_hour(now, self.config.quiet_end_hour);
            if end <= now {
                end += Duration::days(1);
            }
            end
        } else {
            now
        };

        if let Some(preferred) = profile.preferred_hour {
            if !self.in_quiet_hours(preferred) {
                let at_preferred = at_hour(candidate, preferred);
                if at_preferred > candidate {
                    return at_preferred;
                }
            }
        }

        candidate
    }

    /// Apply a user's answer to a nudge
    ///
    /// Each nudge takes one answer; a repeat fails with
    /// [`crate::Error::Conflict`] before any event is recorded. Otherwise this
    /// updates the nudge, records a feedback event for the nudge's kind at
    /// the hour of `now`, and mirrors the answer onto the linked insight: a
    /// snooze hides it for [`SNOOZE_DAYS`], the other answers are stored as
    /// feedback.
    pub fn record_nudge_response(
        &self,
        db: &Database,
        nudge_id: i64,
        response: FeedbackResponse,
        now: DateTime<Utc>,
    ) -> Result<Nudge> {
        let nudge = db.respond_nudge(nudge_id, response.nudge_status(), now)?;

        match nudge.kind.parse::<InsightKind>() {
            Ok(kind) => {
                db.record_behavior_event(&nudge.user_id, kind, response, now.hour())?;
            }
            Err(e) => {
                tracing::warn!(nudge_id, kind = %nudge.kind, error = %e, "Nudge has unknown kind, feedback not recorded");
            }
        }

        if let Some(insight_id) = nudge.insight_id {
            if db.get_insight(insight_id)?.is_some() {
                match response {
                    FeedbackResponse::Snoozed => {
                        db.snooze_insight(insight_id, SNOOZE_DAYS, now)?;
                    }
                    _ => db.set_insight_feedback(insight_id, response.as_str())?,
                }
            }
        }

        tracing::debug!(nudge_id, user_id = %nudge.user_id, response = %response, "Nudge response recorded");
        Ok(nudge)
    }
}

/// Same calendar day as `dt`, at `hour:00:00`
fn at_hour(dt: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    dt.date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(dt)
}
