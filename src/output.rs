use clap::ValueEnum;
use colored::Colorize;

use crate::error::Result;
use crate::model::{Message, PeerAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

fn format_date(message: &Message) -> String {
    message
        .record
        .created_at_utc()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| message.record.created_at.to_string())
}

pub fn render_message(message: &Message, format: Format) -> Result<String> {
    let out = match format {
        Format::Json => serde_json::to_string(message)?,
        Format::Pretty => format!(
            "[{}] {} ({})\n  {}\n  port: {}",
            message.id,
            message.record.author_name.bold(),
            format_date(message),
            message.record.body,
            message.record.origin_port
        ),
        Format::Minimal => minimal_row(message),
    };
    Ok(out)
}

fn minimal_row(message: &Message) -> String {
    let short_id: String = message.id.as_str().chars().take(8).collect();
    format!(
        "{:8} {:19} {:12} {}",
        short_id,
        format_date(message).trim_end_matches(" UTC"),
        truncate_text(&message.record.author_name, 12),
        truncate_text(&message.record.body, 40)
    )
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        text.to_string()
    }
}

pub fn render_messages(messages: &[Message], format: Format) -> Result<String> {
    let out = match format {
        Format::Json => serde_json::to_string(messages)?,
        Format::Pretty => {
            if messages.is_empty() {
                return Ok("There is no message to print.".to_string());
            }
            let blocks = messages
                .iter()
                .map(|m| render_message(m, Format::Pretty))
                .collect::<Result<Vec<_>>>()?;
            blocks.join("\n\n")
        }
        Format::Minimal => {
            let mut lines = vec![
                format!("{:8} {:19} {:12} MESSAGE", "ID", "DATE", "AUTHOR"),
                "-".repeat(60),
            ];
            lines.extend(messages.iter().map(minimal_row));
            lines.join("\n")
        }
    };
    Ok(out)
}

pub fn render_peers(peers: &[PeerAddress], format: Format) -> Result<String> {
    let out = match format {
        Format::Json => serde_json::to_string(peers)?,
        Format::Pretty | Format::Minimal => {
            if peers.is_empty() {
                return Ok("No known peers.".to_string());
            }
            peers
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        }
    };
    Ok(out)
}
