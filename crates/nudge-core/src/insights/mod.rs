//! Insight Engine - proactive coaching nudges
//!
//! Rather than waiting for a user to ask, the engine scans their recent
//! history against a registry of declarative templates and surfaces what is
//! worth acting on: budgets about to break, spending that is trending the
//! wrong way, savings goals slipping.
//!
//! ## Pieces
//!
//! - **Templates** - condition plus `{placeholder}` content, one registry
//! - **Predictive** - month-end projection and budget overrun forecasts
//! - **Behavior** - feedback-driven sensitivity, suppression and timing
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nudge_core::insights::InsightEngine;
//!
//! let engine = InsightEngine::new(&config);
//! let report = engine.run_and_persist(&db, "alex", Some(&hub))?;
//! ```

pub mod behavior;
pub mod engine;
pub mod predictive;
pub mod templates;
pub mod types;

pub use behavior::{
    BehaviorAdapter, BehaviorProfile, FeedbackResponse, ResponseStats, SensitivityLevel,
    ThresholdDirection,
};
pub use engine::{dedupe_key, EvaluationContext, InsightEngine};
pub use predictive::{BudgetForecast, MonthEndProjection, WeekPrediction};
pub use templates::{Condition, InsightTemplate, RenderedContent, RuleMatch, TemplateRegistry};
pub use types::{
    Insight, InsightKind, InsightState, InsightStatus, Priority, RunReport, StoredInsight,
    UpsertOutcome,
};
