//! Nudge Core Library
//!
//! Shared functionality for the Nudge personal finance coach:
//! - Database access and migrations
//! - Category and budget normalization
//! - Spending analytics and month-end projections
//! - Template-driven insight engine with behavior adaptation
//! - Persona datasets and CSV import
//! - Chat context assembly with a pluggable AI backend
//! - Per-user notification hub for real-time nudges

pub mod ai;
pub mod analytics;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod insights;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod personas;

pub use ai::{AIBackend, AIClient, ChatPrompt, ChatTurn, MockBackend, OpenAIBackend};
pub use chat::{ChatContext, ChatReply, ChatService, ChatTopic, ContextBuilder, ReplySource};
pub use config::CoachConfig;
pub use db::{BehaviorEvent, Database};
pub use error::{Error, Result};
pub use import::{import_csv, parse_csv, ImportReport, SignConvention};
pub use insights::{
    BehaviorAdapter, BehaviorProfile, EvaluationContext, FeedbackResponse, Insight, InsightEngine,
    InsightKind, InsightStatus, InsightTemplate, Priority, RunReport, SensitivityLevel,
    StoredInsight, TemplateRegistry,
};
pub use notify::{Notification, NotificationHub};
pub use personas::{LoadOptions, PersonaDataset, PersonaLibrary, PersonaLoadReport, PersonaSummary};
