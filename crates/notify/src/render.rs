use storemind_core::domain::alert::{Alert, NotificationChannel};

/// Channel-shaped message. SMS bodies are truncated; email carries a
/// subject line and the action items; in-app mirrors the alert row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub subject: Option<String>,
    pub body: String,
}

const SMS_BODY_LIMIT: usize = 140;

pub fn render(alert: &Alert, channel: NotificationChannel) -> ChannelMessage {
    match channel {
        NotificationChannel::Sms => {
            let mut body =
                format!("[{}] {}: {}", alert.priority.as_str(), alert.title, alert.description);
            if body.chars().count() > SMS_BODY_LIMIT {
                body = body.chars().take(SMS_BODY_LIMIT - 3).collect::<String>() + "...";
            }
            ChannelMessage { subject: None, body }
        }
        NotificationChannel::Email => {
            let mut body = format!("{}\n\nSource: {}", alert.description, alert.source);
            if !alert.action_items.is_empty() {
                body.push_str("\n\nSuggested actions:");
                for item in &alert.action_items {
                    body.push_str("\n- ");
                    body.push_str(item);
                }
            }
            ChannelMessage {
                subject: Some(format!("[{}] {}", alert.priority.as_str(), alert.title)),
                body,
            }
        }
        NotificationChannel::InApp => ChannelMessage {
            subject: Some(alert.title.clone()),
            body: alert.description.clone(),
        },
    }
}
