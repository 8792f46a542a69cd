//! Presentation hints for calendar events.

use super::projector::CalendarEvent;
use crate::models::{ActivityType, Meetup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Colour table for calendar events, keyed by activity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePalette {
    pub default_color: String,
    pub opacity: f32,
    pub cancelled_color: String,
    pub cancelled_opacity: f32,
    #[serde(default)]
    pub type_colors: BTreeMap<String, String>,
}

impl Default for StylePalette {
    fn default() -> Self {
        let type_colors = [
            ("hiking", "#52c41a"),
            ("walk", "#1890ff"),
            ("run", "#fa8c16"),
            ("other", "#722ed1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            type_colors,
            default_color: "#3174ad".to_string(),
            opacity: 0.8,
            cancelled_color: "#bfbfbf".to_string(),
            cancelled_opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStyle {
    pub color: String,
    pub opacity: f32,
    pub strikethrough: bool,
}

pub fn style_for(event: &CalendarEvent, palette: &StylePalette) -> EventStyle {
    style_for_meetup(&event.resource, palette)
}

/// Cancelled meetups are always dimmed gray and struck through, whatever
/// their type colour would be.
pub fn style_for_meetup(meetup: &Meetup, palette: &StylePalette) -> EventStyle {
    if meetup.is_cancelled() {
        return EventStyle {
            color: palette.cancelled_color.clone(),
            opacity: palette.cancelled_opacity,
            strikethrough: true,
        };
    }

    let color = palette
        .type_colors
        .get(meetup.activity_type.as_str())
        .unwrap_or(&palette.default_color)
        .clone();

    EventStyle {
        color,
        opacity: palette.opacity,
        strikethrough: false,
    }
}

/// An entry of the meetup type picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeOption {
    pub value: String,
    pub label: String,
    pub color: String,
}

impl TypeOption {
    fn new(value: &str, label: &str, color: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            color: color.to_string(),
        }
    }
}

pub fn default_type_options() -> Vec<TypeOption> {
    vec![
        TypeOption::new("hiking", "Hiking", "green"),
        TypeOption::new("walk", "Walk", "blue"),
        TypeOption::new("run", "Run", "orange"),
        TypeOption::new("plogging", "Plogging", "cyan"),
        TypeOption::new("social", "Social", "pink"),
        TypeOption::new("other", "Other", "default"),
    ]
}

pub fn default_levels() -> Vec<String> {
    ["beginner", "intermediate", "advanced"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Tag colour for list views; `"default"` for types missing from the table.
pub fn type_tag_color<'a>(activity_type: &ActivityType, options: &'a [TypeOption]) -> &'a str {
    options
        .iter()
        .find(|opt| opt.value == activity_type.as_str())
        .map(|opt| opt.color.as_str())
        .unwrap_or("default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MeetupStatus;
    use serde_json::json;
    use test_case::test_case;

    fn meetup(activity: &str, status: &str) -> Meetup {
        serde_json::from_value(json!({
            "id": 1,
            "date": "2025-03-01",
            "type": activity,
            "status": status
        }))
        .unwrap()
    }

    #[test_case("hiking", "#52c41a")]
    #[test_case("walk", "#1890ff")]
    #[test_case("run", "#fa8c16")]
    #[test_case("other", "#722ed1")]
    #[test_case("kayak", "#3174ad" ; "unknown type falls back")]
    fn test_type_colors(activity: &str, color: &str) {
        let style = style_for_meetup(&meetup(activity, "pending"), &StylePalette::default());
        assert_eq!(style.color, color);
        assert!(!style.strikethrough);
    }

    #[test]
    fn test_cancelled_hiking_is_dimmed() {
        let palette = StylePalette::default();
        let m = meetup("hiking", "cancelled");
        assert_eq!(m.status, MeetupStatus::Cancelled);

        let style = style_for_meetup(&m, &palette);
        assert_eq!(style.color, palette.cancelled_color);
        assert_ne!(style.color, palette.type_colors["hiking"]);
        assert!(style.opacity < palette.opacity);
        assert!(style.strikethrough);
    }

    #[test]
    fn test_type_tag_color() {
        let options = default_type_options();
        assert_eq!(type_tag_color(&ActivityType::new("hiking"), &options), "green");
        assert_eq!(type_tag_color(&ActivityType::new("unknown"), &options), "default");
    }
}
