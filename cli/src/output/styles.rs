//! Terminal stylesheet. Every style is plain until [`Styles::colorize`].

use owo_colors::Style;
use rediacc_common::QueueStatus;

#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    pub dim: Style,
    pub bold: Style,
    pub header: Style,
    /// Task ids printed by `queue submit`.
    pub task_id: Style,
    /// Queue items that are still queued or executing.
    pub in_flight: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.task_id = Style::new().bold().magenta();
        self.in_flight = Style::new().cyan();
    }

    /// Green for a completed task, yellow for a client-side timeout, red for
    /// the remaining terminal states.
    #[must_use]
    pub fn for_status(&self, status: &QueueStatus) -> Style {
        match status {
            s if s.is_success() => self.success,
            QueueStatus::Timeout => self.warning,
            s if s.is_terminal() => self.error,
            _ => self.in_flight,
        }
    }
}
