//! Run phases and the transitions allowed between them.

use shelfprobe_core::TerminalStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Start,
    Probing,
    Scrolling,
    Finalizing,
    Terminal(TerminalStatus),
}

impl RunPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Start => "start",
            RunPhase::Probing => "probing",
            RunPhase::Scrolling => "scrolling",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Terminal(status) => status.as_str(),
        }
    }

    /// Transition table:
    ///
    /// | from        | to                                   |
    /// |-------------|--------------------------------------|
    /// | start       | probing, timeout                     |
    /// | probing     | scrolling, any flip, timeout         |
    /// | scrolling   | finalizing, any flip, timeout        |
    /// | finalizing  | completed                            |
    /// | terminal    | nothing                              |
    #[must_use]
    pub fn can_advance_to(self, next: RunPhase) -> bool {
        use RunPhase::{Finalizing, Probing, Scrolling, Start, Terminal};
        match (self, next) {
            (Start, Probing)
            | (Probing, Scrolling)
            | (Scrolling, Finalizing)
            | (Start | Probing | Scrolling, Terminal(TerminalStatus::Timeout)) => true,
            (Probing | Scrolling, Terminal(status)) => status.is_flip(),
            (Finalizing, Terminal(TerminalStatus::Completed)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
