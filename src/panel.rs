use serde::Serialize;

/// Fixed label shown when a reading is aborted mid-flight.
pub const BAD_READ_LABEL: &str = "BAD READ";

/// Caption revealed next to the verdict once a reading completes.
pub const GIVEN_LABEL: &str = "this is how much you give";

/// Display-side updates posted by the controller. The panel (terminal shell,
/// JSON stream, test collector) is the single consumer; the controller never
/// touches the screen itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PanelEvent {
    /// Show a numeric readout. Formatting is the panel's job.
    Readout { value: f64 },
    /// Show the fixed `BAD READ` label instead of a number.
    BadRead,
    /// Show or hide the GIVEN stamp next to the readout.
    GivenLabel { visible: bool },
}

/// Format a readout value with at least one and at most six fractional
/// digits, trailing zeros trimmed (the instrument's `0.0#####` display
/// pattern).
pub fn format_readout(value: f64) -> String {
    let mut text = format!("{:.6}", value);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.push('0');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keeps_at_least_one_fraction_digit() {
        assert_eq!(format_readout(1.0), "1.0");
        assert_eq!(format_readout(0.0), "0.0");
        assert_eq!(format_readout(2.0), "2.0");
    }

    #[test]
    fn trims_trailing_zeros() {
        assert_eq!(format_readout(1.05), "1.05");
        assert_eq!(format_readout(0.85), "0.85");
        assert_eq!(format_readout(1.0375), "1.0375");
    }

    #[test]
    fn caps_at_six_fraction_digits() {
        assert_eq!(format_readout(0.000047183), "0.000047");
        assert_eq!(format_readout(0.00005), "0.00005");
        // Below the sixth place the readout collapses to a bare zero.
        assert_eq!(format_readout(0.00000025), "0.0");
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_string(&PanelEvent::Readout { value: 1.5 }).unwrap();
        assert_eq!(json, r#"{"event":"readout","value":1.5}"#);
        let json = serde_json::to_string(&PanelEvent::GivenLabel { visible: true }).unwrap();
        assert_eq!(json, r#"{"event":"givenLabel","visible":true}"#);
    }
}
