//! Console sinks for running the pipeline from a terminal.

use tracing::{debug, info};

use crate::domain::ChannelId;
use crate::ports::{DisplayKey, DisplaySink, DisplaySpec, Notice, NoticeSink};

/// Renders persistent displays as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDisplay;

impl DisplaySink for TracingDisplay {
    fn register_channel(&self, channel: &ChannelId, name: &str) {
        debug!(%channel, name, "display channel registered");
    }

    fn post(&self, key: DisplayKey, spec: &DisplaySpec) {
        if spec.silent {
            info!(%key, channel = %spec.channel, body = %spec.body, "display updated");
        } else {
            info!(
                %key,
                channel = %spec.channel,
                title = %spec.title,
                body = %spec.body,
                ticker = spec.ticker.as_deref().unwrap_or(""),
                "display shown"
            );
        }
    }

    fn remove(&self, key: DisplayKey) {
        info!(%key, "display removed");
    }
}

/// Prints notices to stdout, errors to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotices;

impl NoticeSink for ConsoleNotices {
    fn notice(&self, notice: Notice) {
        match &notice {
            Notice::Info(msg) => println!("{msg}"),
            Notice::Error(_) => eprintln!("{notice}"),
        }
    }
}
