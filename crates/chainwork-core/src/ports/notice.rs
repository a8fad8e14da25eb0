//! NoticeSink port - 一時的な通知（toast 相当）

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Lightweight success message.
    Info(String),
    /// Failure, surfaced distinctly.
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Info(msg) | Notice::Error(msg) => msg,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Info(msg) => f.write_str(msg),
            Notice::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

pub trait NoticeSink: Send + Sync {
    fn notice(&self, notice: Notice);
}
