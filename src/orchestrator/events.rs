use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Advisory progress notifications emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// About to call the completion endpoint.
    Status { model: String },
    ToolStart { name: String, args_preview: String },
    ToolEnd {
        name: String,
        result_preview: String,
        is_error: bool,
    },
}

/// Sending half of the event channel. Sends never block and a missing or
/// closed receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<UnboundedSender<AgentEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, UnboundedReceiver<AgentEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: AgentEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }
}
