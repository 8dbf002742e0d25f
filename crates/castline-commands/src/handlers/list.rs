//! `!clientes`: lists the directory's active customers and registered contacts.
//!
//! Directory phones are shown in canonical form when they canonicalize, and a
//! registered contact already listed as a directory customer is not repeated.

use async_trait::async_trait;
use std::collections::HashSet;
use castline_core::error::Result;

use crate::command::Command;
use crate::handler::{CommandContext, CommandHandler};

/// Keep replies under the channel's per-message text limit.
const MAX_REPLY_CHARS: usize = 4000;

pub struct ListHandler;

#[async_trait]
impl CommandHandler for ListHandler {
    fn verb(&self) -> &str {
        "clientes"
    }

    fn description(&self) -> &str {
        "Lista los clientes activos"
    }

    async fn handle(&self, ctx: &CommandContext<'_>, _command: &Command) -> Result<()> {
        let services = ctx.services();
        let entries = services.directory_entries().await;
        let contacts = services.registry.list().await;

        if entries.is_empty() && contacts.is_empty() {
            return ctx.reply("❌ No se encontraron clientes activos").await;
        }

        let mut listed = HashSet::new();
        let mut lines = Vec::with_capacity(entries.len() + contacts.len());
        for (i, entry) in entries.iter().enumerate() {
            let phone = match services.numbering.canonicalize(&entry.phone) {
                Ok(number) => {
                    listed.insert(number.clone());
                    number
                }
                Err(_) => entry.phone.clone(),
            };
            lines.push(format!("Cliente {}: {} - {phone}", i + 1, entry.name));
        }
        let extra = contacts.iter().filter(|number| !listed.contains(*number));
        for (j, number) in extra.enumerate() {
            lines.push(format!("Contacto {}: {number}", j + 1));
        }

        let header = format!("📋 *Clientes activos ({})*", lines.len());
        for chunk in chunk_lines(&header, &lines, MAX_REPLY_CHARS) {
            ctx.reply(chunk).await?;
        }
        Ok(())
    }
}

/// Pack `lines` under `header` into messages of at most `limit` characters.
/// A single line longer than `limit` gets a message of its own.
fn chunk_lines(header: &str, lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = header.to_string();
    for line in lines {
        if !current.is_empty() && current.chars().count() + 1 + line.chars().count() > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
