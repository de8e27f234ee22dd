//! Controller selection by modem model.

use super::{Controller, SimulatedModem, VodafoneM300z};
use crate::db::Modem;

type Constructor = fn(&Modem) -> Controller;

/// Model identifier → driver constructor. New modem models register here;
/// call sites go through [`controller_for`] and never change.
const REGISTRY: &[(&str, Constructor)] = &[
    ("M300z", |m| Controller::VodafoneM300z(VodafoneM300z::new(m))),
    ("simulated", |m| Controller::Simulated(SimulatedModem::new(m))),
];

/// Fallback for unrecognized model identifiers.
const DEFAULT: Constructor = |m| Controller::VodafoneM300z(VodafoneM300z::new(m));

/// Select the driver for a modem record by its model field.
///
/// Unknown models deliberately fall back to the default driver so that a
/// controller can always be produced.
pub fn controller_for(modem: &Modem) -> Controller {
    REGISTRY
        .iter()
        .find(|(model, _)| *model == modem.model)
        .map_or_else(|| DEFAULT(modem), |(_, ctor)| ctor(modem))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modem_with_model(model: &str) -> Modem {
        Modem {
            name: "m".to_string(),
            imei: "1".to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_known_model() {
        let controller = controller_for(&modem_with_model("M300z"));
        assert!(matches!(controller, Controller::VodafoneM300z(_)));
    }

    #[test]
    fn test_simulated_model() {
        let controller = controller_for(&modem_with_model("simulated"));
        assert!(matches!(controller, Controller::Simulated(_)));
    }

    #[test]
    fn test_unknown_model_falls_back_to_default() {
        let controller = controller_for(&modem_with_model("X9000"));
        assert!(matches!(controller, Controller::VodafoneM300z(_)));
    }
}
