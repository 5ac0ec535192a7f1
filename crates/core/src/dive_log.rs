//! Structured dive-log record attached to a dive.

use serde::{Deserialize, Serialize};

use crate::id::null_as_default;

/// Log book entry for a dive. Every field is optional; a dive may have no log
/// at all, in which case `GET /dives/<id>/log` answers 404.
///
/// Fields the client does not model are kept in `extra` and written back
/// unchanged on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiveLog {
    /// Tank pressure at entry, in bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_air: Option<f64>,
    /// Tank pressure at exit, in bar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_air: Option<f64>,
    /// Entry time, ISO 8601.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dive_start_time: Option<String>,
    /// Bottom time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dive_duration: Option<f64>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<f64>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
    /// Degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_temperature: Option<f64>,
    /// Millimeters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wetsuit_thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wetsuit_type: Option<String>,
    /// Kilograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<f64>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub fish_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DiveLog {
    /// Air consumed over the dive, if both pressures are known.
    pub fn air_used(&self) -> Option<f64> {
        Some(self.starting_air? - self.ending_air?)
    }

    /// Parse a comma-separated species list, trimming blanks.
    pub fn parse_fish_ids(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_survive_a_save() {
        let log: DiveLog = serde_json::from_value(serde_json::json!({
            "starting_air": 200,
            "ending_air": 60,
            "buddy": "Sam",
        }))
        .unwrap();
        assert_eq!(log.air_used(), Some(140.0));

        let back = serde_json::to_value(&log).unwrap();
        assert_eq!(back["buddy"], "Sam");
        assert!(back.get("notes").is_none());
    }

    #[test]
    fn air_used_requires_both_pressures() {
        let log = DiveLog {
            starting_air: Some(200.0),
            ..DiveLog::default()
        };
        assert_eq!(log.air_used(), None);
    }

    #[test]
    fn null_fish_list_decodes_as_empty() {
        let log: DiveLog =
            serde_json::from_str(r#"{"fish_ids":null,"max_depth":18}"#).unwrap();
        assert!(log.fish_ids.is_empty());
        assert_eq!(log.max_depth, Some(18.0));
        assert!(!log.extra.contains_key("fish_ids"));
    }

    #[test]
    fn fish_ids_are_trimmed() {
        assert_eq!(
            DiveLog::parse_fish_ids(" clownfish, , moray eel ,"),
            vec!["clownfish".to_string(), "moray eel".to_string()]
        );
    }
}
