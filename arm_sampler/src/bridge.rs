//! Data contract of the live remote-control bridge.
//!
//! A remote process periodically sends the joint angles the arm should hold,
//! one JSON object per message:
//!
//! ```json
//! {"Target_position": [12.5, -30.0, 45.0, 0.0]}
//! ```
//!
//! The bridge keeps only the most recent array. It is applied to the drives
//! only when present and long enough for the actuated-joint count.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemoteAngles {
    #[serde(rename = "Target_position")]
    pub target_position: Vec<f64>,
}

impl RemoteAngles {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text.trim())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Latest angle array received from the remote side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTargets {
    angles: Option<Vec<f64>>,
    updates: u64,
}

impl RemoteTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, angles: Vec<f64>) {
        self.angles = Some(angles);
        self.updates += 1;
    }

    pub fn clear(&mut self) {
        self.angles = None;
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// The angle array, if one is present and covers `actuated` joints.
    pub fn applicable(&self, actuated: usize) -> Option<&[f64]> {
        self.angles
            .as_deref()
            .filter(|angles| angles.len() >= actuated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_message() {
        let msg = RemoteAngles::parse("{\"Target_position\": [1.0, 2.5, -3.0, 4.0]}\r\n").unwrap();
        assert_eq!(msg.target_position, vec![1.0, 2.5, -3.0, 4.0]);
    }

    #[test]
    fn serializes_with_wire_field_name() {
        let msg = RemoteAngles {
            target_position: vec![0.5, -1.0, 2.0],
        };
        assert_eq!(msg.to_json().unwrap(), r#"{"Target_position":[0.5,-1.0,2.0]}"#);
    }

    #[test]
    fn rejects_message_without_angles() {
        assert!(RemoteAngles::parse("{\"Target\": []}").is_err());
    }

    #[test]
    fn gating_requires_presence_and_length() {
        let mut remote = RemoteTargets::new();
        assert!(remote.applicable(4).is_none());

        remote.update(vec![1.0, 2.0, 3.0]);
        assert!(remote.applicable(4).is_none());
        assert_eq!(remote.applicable(3), Some(&[1.0, 2.0, 3.0][..]));

        remote.update(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(remote.applicable(4).map(|a| a.len()), Some(5));
        assert_eq!(remote.updates(), 2);

        remote.clear();
        assert!(remote.applicable(0).is_none());
    }
}
