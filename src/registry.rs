use crate::actions::{Action, DeviceEffect, DeviceName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// State of one simulated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub is_on: bool,
    pub location: String,
}

/// Name-keyed table of simulated devices. Mutated only through [`apply`];
/// owned exclusively by the streaming task, request handlers read
/// published snapshots.
///
/// [`apply`]: DeviceRegistry::apply
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceName, Device>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        let device = |location: &str| Device {
            is_on: false,
            location: location.to_string(),
        };

        let mut devices = BTreeMap::new();
        devices.insert("Light Bulb".to_string(), device("Living Room"));
        devices.insert("Tube Light".to_string(), device("Kitchen"));
        devices.insert("Fan".to_string(), device("Bedroom"));
        Self { devices }
    }
}

impl DeviceRegistry {
    /// Apply an action's effect to its target device. Returns false when
    /// the target is not a registered name; all_off is unconditionally
    /// valid and clears every device.
    pub fn apply(&mut self, action: &Action) -> bool {
        match action.effect {
            DeviceEffect::AllOff => {
                for device in self.devices.values_mut() {
                    device.is_on = false;
                }
                true
            }
            DeviceEffect::TurnOn => self.set(action.target.as_deref(), true),
            DeviceEffect::TurnOff => self.set(action.target.as_deref(), false),
            DeviceEffect::Toggle => self.toggle(action.target.as_deref()),
        }
    }

    /// Read-only status report
    pub fn snapshot(&self) -> BTreeMap<DeviceName, Device> {
        self.devices.clone()
    }

    pub fn is_on(&self, name: &str) -> Option<bool> {
        self.devices.get(name).map(|d| d.is_on)
    }

    fn set(&mut self, name: Option<&str>, on: bool) -> bool {
        match name.and_then(|n| self.devices.get_mut(n)) {
            Some(device) => {
                device.is_on = on;
                true
            }
            None => false,
        }
    }

    fn toggle(&mut self, name: Option<&str>) -> bool {
        match name.and_then(|n| self.devices.get_mut(n)) {
            Some(device) => {
                device.is_on = !device.is_on;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ImageryClass;

    fn action(effect: DeviceEffect, target: Option<&str>) -> Action {
        Action {
            event_type: ImageryClass::LeftHand,
            effect,
            target: target.map(str::to_string),
        }
    }

    #[test]
    fn devices_start_off() {
        let registry = DeviceRegistry::default();
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.values().all(|d| !d.is_on));
        assert_eq!(snapshot["Fan"].location, "Bedroom");
        assert_eq!(snapshot["Light Bulb"].location, "Living Room");
        assert_eq!(snapshot["Tube Light"].location, "Kitchen");
    }

    #[test]
    fn toggle_flips_state() {
        let mut registry = DeviceRegistry::default();
        let toggle = action(DeviceEffect::Toggle, Some("Fan"));

        assert!(registry.apply(&toggle));
        assert_eq!(registry.is_on("Fan"), Some(true));
        assert!(registry.apply(&toggle));
        assert_eq!(registry.is_on("Fan"), Some(false));
    }

    #[test]
    fn set_effects_are_unconditional() {
        let mut registry = DeviceRegistry::default();
        let on = action(DeviceEffect::TurnOn, Some("Light Bulb"));
        let off = action(DeviceEffect::TurnOff, Some("Light Bulb"));

        assert!(registry.apply(&on));
        assert!(registry.apply(&on));
        assert_eq!(registry.is_on("Light Bulb"), Some(true));
        assert!(registry.apply(&off));
        assert!(registry.apply(&off));
        assert_eq!(registry.is_on("Light Bulb"), Some(false));
    }

    #[test]
    fn all_off_clears_every_device_regardless_of_prior_state() {
        let mut registry = DeviceRegistry::default();
        registry.apply(&action(DeviceEffect::TurnOn, Some("Fan")));
        registry.apply(&action(DeviceEffect::TurnOn, Some("Tube Light")));

        assert!(registry.apply(&action(DeviceEffect::AllOff, None)));
        assert!(registry.snapshot().values().all(|d| !d.is_on));
    }

    #[test]
    fn unknown_device_is_rejected() {
        let mut registry = DeviceRegistry::default();
        assert!(!registry.apply(&action(DeviceEffect::Toggle, Some("Heater"))));
        assert!(!registry.apply(&action(DeviceEffect::TurnOn, None)));
        assert!(registry.snapshot().values().all(|d| !d.is_on));
    }

    #[test]
    fn snapshot_does_not_mutate() {
        let registry = DeviceRegistry::default();
        let first = registry.snapshot();
        let second = registry.snapshot();
        assert_eq!(first, second);
    }
}
