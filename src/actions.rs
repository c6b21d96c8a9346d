use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name keying the device registry
pub type DeviceName = String;

/// Motor imagery classes carried by recognized event codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageryClass {
    LeftHand,
    RightHand,
    Feet,
    Tongue,
}

impl fmt::Display for ImageryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageryClass::LeftHand => "left hand",
            ImageryClass::RightHand => "right hand",
            ImageryClass::Feet => "feet",
            ImageryClass::Tongue => "tongue",
        };
        f.write_str(name)
    }
}

/// Effect applied to the device registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEffect {
    TurnOn,
    TurnOff,
    Toggle,
    AllOff,
}

/// A device action derived from one detected event code.
/// Produced by [`ActionMap::map`], consumed immediately, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub event_type: ImageryClass,
    pub effect: DeviceEffect,
    /// Absent when the effect is AllOff
    pub target: Option<DeviceName>,
}

#[derive(Debug, Clone)]
struct ActionEntry {
    code: u16,
    action: Action,
}

/// Fixed lookup from event code to device action. The mapping is a table
/// of records, not branching code; unknown codes map to nothing.
#[derive(Debug, Clone)]
pub struct ActionMap {
    entries: Vec<ActionEntry>,
}

impl Default for ActionMap {
    fn default() -> Self {
        let entry = |code, event_type, effect, target: Option<&str>| ActionEntry {
            code,
            action: Action {
                event_type,
                effect,
                target: target.map(str::to_string),
            },
        };

        Self {
            entries: vec![
                entry(7, ImageryClass::LeftHand, DeviceEffect::Toggle, Some("Light Bulb")),
                entry(8, ImageryClass::RightHand, DeviceEffect::Toggle, Some("Tube Light")),
                entry(9, ImageryClass::Feet, DeviceEffect::Toggle, Some("Fan")),
                entry(10, ImageryClass::Tongue, DeviceEffect::AllOff, None),
            ],
        }
    }
}

impl ActionMap {
    /// Pure lookup, no side effects
    pub fn map(&self, code: u16) -> Option<Action> {
        self.entries
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.action.clone())
    }

    /// Event codes the detector should recognize
    pub fn codes(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.code).collect()
    }
}
