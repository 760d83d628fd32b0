use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use peerwire_router::envelope::unix_now;
use peerwire_socket::display_identity;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    sender: String,
    message: &'a Value,
    received_at: i64,
}

pub fn print_message(message: &Value, sender: &[u8], format: OutputFormat) {
    println!("{}", render_message(message, sender, format));
}

fn render_message(message: &Value, sender: &[u8], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                sender: display_identity(sender),
                message,
                received_at: unix_now(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SENDER", "MESSAGE"])
                .add_row(vec![display_identity(sender), message.to_string()]);
            table.to_string()
        }
        OutputFormat::Pretty => format!("sender={} message={message}", display_identity(sender)),
    }
}
