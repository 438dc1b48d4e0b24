//! One-shot chat command

use anyhow::{Context, Result};
use nudge_core::{AIClient, ChatService, Database, ReplySource};

pub async fn cmd_chat(
    db: &Database,
    ai: Option<AIClient>,
    user_id: &str,
    message: &str,
) -> Result<()> {
    let service = ChatService::new(db.clone(), ai);
    let reply = service
        .reply(user_id, message)
        .await
        .context("Chat failed")?;

    println!("🤖 {}", reply.reply);
    if reply.source == ReplySource::Fallback && service.has_ai() {
        println!();
        println!("   (AI backend unavailable, showing a templated answer)");
    }

    Ok(())
}
