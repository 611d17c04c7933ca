//! VIP bundle saga stages.

use serde::{Deserialize, Serialize};

/// The stage of a VIP bundle saga, derived from the aggregate's fields.
///
/// Stage transitions:
/// ```text
/// Initialized ──► ShowBookingRequested ──► ShowBooked ──► InboundFlightBooked
///      │                   │                   │                  │
///      │                   │                   │                  ▼
///      │                   │                   │          ReturnFlightBooked ──► Finalized
///      └───────────────────┴───────────────────┴──────────────────┴────────────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VipBundleStage {
    /// The bundle exists but no command has been issued yet.
    #[default]
    Initialized,

    /// Show tickets were requested.
    ShowBookingRequested,

    /// The show booking was made.
    ShowBooked,

    /// The inbound flight was booked.
    InboundFlightBooked,

    /// Both flights were booked; the taxi is pending.
    ReturnFlightBooked,

    /// The taxi was booked and the bundle is complete (terminal state).
    Finalized,

    /// A step failed and compensation was issued (terminal state).
    Failed,
}

impl VipBundleStage {
    /// Returns true if a failure at this stage should trigger compensation.
    pub fn can_compensate(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, VipBundleStage::Finalized | VipBundleStage::Failed)
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VipBundleStage::Initialized => "Initialized",
            VipBundleStage::ShowBookingRequested => "ShowBookingRequested",
            VipBundleStage::ShowBooked => "ShowBooked",
            VipBundleStage::InboundFlightBooked => "InboundFlightBooked",
            VipBundleStage::ReturnFlightBooked => "ReturnFlightBooked",
            VipBundleStage::Finalized => "Finalized",
            VipBundleStage::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for VipBundleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stage_is_initialized() {
        assert_eq!(VipBundleStage::default(), VipBundleStage::Initialized);
    }

    #[test]
    fn test_terminal_stages() {
        assert!(!VipBundleStage::Initialized.is_terminal());
        assert!(!VipBundleStage::ShowBookingRequested.is_terminal());
        assert!(!VipBundleStage::ShowBooked.is_terminal());
        assert!(!VipBundleStage::InboundFlightBooked.is_terminal());
        assert!(!VipBundleStage::ReturnFlightBooked.is_terminal());
        assert!(VipBundleStage::Finalized.is_terminal());
        assert!(VipBundleStage::Failed.is_terminal());
    }

    #[test]
    fn test_can_compensate_until_terminal() {
        assert!(VipBundleStage::ShowBooked.can_compensate());
        assert!(VipBundleStage::ReturnFlightBooked.can_compensate());
        assert!(!VipBundleStage::Finalized.can_compensate());
        assert!(!VipBundleStage::Failed.can_compensate());
    }

    #[test]
    fn test_display() {
        assert_eq!(VipBundleStage::Initialized.to_string(), "Initialized");
        assert_eq!(
            VipBundleStage::ShowBookingRequested.to_string(),
            "ShowBookingRequested"
        );
        assert_eq!(VipBundleStage::Finalized.to_string(), "Finalized");
        assert_eq!(VipBundleStage::Failed.to_string(), "Failed");
    }
}
