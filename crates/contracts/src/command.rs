//! Command - CommandChannel input
//!
//! Inbound actuator command, consumed as soon as it is decoded.

use serde::{Deserialize, Serialize};

/// LED colour + motor duty cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "RED")]
    pub red: u8,
    #[serde(rename = "GREEN")]
    pub green: u8,
    #[serde(rename = "BLUE")]
    pub blue: u8,
    #[serde(rename = "DutyCycle")]
    pub duty_cycle: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_names() {
        let cmd: Command =
            serde_json::from_str(r#"{"RED":10,"GREEN":20,"BLUE":30,"DutyCycle":512}"#).unwrap();
        assert_eq!(
            cmd,
            Command {
                red: 10,
                green: 20,
                blue: 30,
                duty_cycle: 512
            }
        );
    }

    #[test]
    fn test_command_rejects_out_of_range_colour() {
        let res: Result<Command, _> =
            serde_json::from_str(r#"{"RED":300,"GREEN":0,"BLUE":0,"DutyCycle":0}"#);
        assert!(res.is_err());
    }
}
