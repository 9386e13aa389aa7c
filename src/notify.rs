//! Notification Dispatcher
//!
//! Turns inbound push payloads into alert descriptors and routes the user's
//! choice on an alert back into the application. Best-effort: nothing here
//! is retried or persisted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_BODY: &str = "Your order status has been updated!";
const ALERT_ICON: &str = "/icons/icon-192.svg";
const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Page opened when the user asks to see their order.
pub const ORDER_VIEW_PATH: &str = "/cart.html";

// == Notification Action ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    #[serde(alias = "explore")]
    View,
    #[serde(alias = "close")]
    Dismiss,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::View => "view",
            NotificationAction::Dismiss => "dismiss",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            NotificationAction::View => "View Order",
            NotificationAction::Dismiss => "Close",
        }
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "view" | "explore" => Ok(NotificationAction::View),
            "dismiss" | "close" => Ok(NotificationAction::Dismiss),
            _ => Err(()),
        }
    }
}

// == Alert Descriptor ==
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertAction {
    pub action: NotificationAction,
    pub title: String,
    pub icon: String,
}

/// Everything needed to show one user-visible alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertDescriptor {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub arrived_at: DateTime<Utc>,
    pub actions: Vec<AlertAction>,
}

/// Where the application should go after an alert interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationTarget {
    pub navigate: String,
}

// == Dispatcher ==
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    app_name: String,
}

impl NotificationDispatcher {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Builds the alert for a push payload. An empty payload gets the
    /// generic order-status text.
    pub fn on_push(&self, payload: Option<&str>) -> AlertDescriptor {
        let body = payload
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_BODY)
            .to_string();
        info!(%body, "Push received");

        let actions = [NotificationAction::View, NotificationAction::Dismiss]
            .into_iter()
            .map(|action| AlertAction {
                action,
                title: action.title().to_string(),
                icon: ALERT_ICON.to_string(),
            })
            .collect();

        AlertDescriptor {
            title: self.app_name.clone(),
            body,
            icon: ALERT_ICON.to_string(),
            badge: ALERT_ICON.to_string(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            arrived_at: Utc::now(),
            actions,
        }
    }

    /// Routes an action selection. Unknown actions are dropped.
    pub fn on_action(&self, action: &str) -> Option<NavigationTarget> {
        match action.parse::<NotificationAction>() {
            Ok(NotificationAction::View) => Some(NavigationTarget {
                navigate: ORDER_VIEW_PATH.to_string(),
            }),
            Ok(NotificationAction::Dismiss) => None,
            Err(()) => {
                debug!(%action, "Ignoring unknown notification action");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new("Bella Vista Restaurant")
    }

    #[test]
    fn test_push_with_payload() {
        let alert = dispatcher().on_push(Some("Your pizza is in the oven"));
        assert_eq!(alert.title, "Bella Vista Restaurant");
        assert_eq!(alert.body, "Your pizza is in the oven");
        assert_eq!(alert.vibrate, vec![100, 50, 100]);
        let actions: Vec<_> = alert.actions.iter().map(|a| a.action).collect();
        assert_eq!(actions, vec![NotificationAction::View, NotificationAction::Dismiss]);
        assert_eq!(alert.actions[0].title, "View Order");
    }

    #[test]
    fn test_empty_push_uses_default_body() {
        assert_eq!(dispatcher().on_push(None).body, DEFAULT_BODY);
        assert_eq!(dispatcher().on_push(Some("  ")).body, DEFAULT_BODY);
    }

    #[test]
    fn test_view_navigates_to_cart() {
        let target = dispatcher().on_action("view").unwrap();
        assert_eq!(target.navigate, "/cart.html");
        assert_eq!(dispatcher().on_action("explore"), Some(target));
    }

    #[test]
    fn test_dismiss_and_unknown_are_noops() {
        assert_eq!(dispatcher().on_action("dismiss"), None);
        assert_eq!(dispatcher().on_action("close"), None);
        assert_eq!(dispatcher().on_action("share"), None);
    }

    #[test]
    fn test_action_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationAction::View).unwrap();
        assert_eq!(json, "\"view\"");
        let parsed: NotificationAction = serde_json::from_str("\"close\"").unwrap();
        assert_eq!(parsed, NotificationAction::Dismiss);
    }
}
