//! Message kinds and topic naming.
//!
//! Topic layout:
//! ```text
//! events.<Name>                        domain-facing events
//! internal-events.<service>.<Name>     saga-internal events
//! commands.<Name>                      commands
//! ```

/// Service segment used for saga-internal topics.
pub const SERVICE_NAME: &str = "svc-tickets";

/// Every message variant known to the system.
///
/// Used as the key of the routing table so dispatch is driven by a closed
/// enumeration rather than by type names discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    VipBundleInitialized,
    BookingMade,
    TicketBookingConfirmed,
    TicketReceiptIssued,
    TicketPrinted,
    TicketRefunded,
    BookingFailed,
    FlightBooked,
    FlightBookingFailed,
    TaxiBooked,
    TaxiBookingFailed,
    VipBundleFinalized,
    VipBundleFailed,
    BookShowTickets,
    BookFlight,
    BookTaxi,
    CancelFlightTickets,
    RefundTicket,
}

/// Which family of topics a message kind is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicCategory {
    Event,
    InternalEvent,
    Command,
}

impl MessageKind {
    /// Returns the message name as used in topics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::VipBundleInitialized => "VipBundleInitialized",
            MessageKind::BookingMade => "BookingMade",
            MessageKind::TicketBookingConfirmed => "TicketBookingConfirmed",
            MessageKind::TicketReceiptIssued => "TicketReceiptIssued",
            MessageKind::TicketPrinted => "TicketPrinted",
            MessageKind::TicketRefunded => "TicketRefunded",
            MessageKind::BookingFailed => "BookingFailed",
            MessageKind::FlightBooked => "FlightBooked",
            MessageKind::FlightBookingFailed => "FlightBookingFailed",
            MessageKind::TaxiBooked => "TaxiBooked",
            MessageKind::TaxiBookingFailed => "TaxiBookingFailed",
            MessageKind::VipBundleFinalized => "VipBundleFinalized",
            MessageKind::VipBundleFailed => "VipBundleFailed",
            MessageKind::BookShowTickets => "BookShowTickets",
            MessageKind::BookFlight => "BookFlight",
            MessageKind::BookTaxi => "BookTaxi",
            MessageKind::CancelFlightTickets => "CancelFlightTickets",
            MessageKind::RefundTicket => "RefundTicket",
        }
    }

    /// Returns the topic family of this kind.
    pub fn category(&self) -> TopicCategory {
        match self {
            MessageKind::VipBundleInitialized => TopicCategory::InternalEvent,
            MessageKind::BookShowTickets
            | MessageKind::BookFlight
            | MessageKind::BookTaxi
            | MessageKind::CancelFlightTickets
            | MessageKind::RefundTicket => TopicCategory::Command,
            _ => TopicCategory::Event,
        }
    }

    /// Returns the topic this kind is published on.
    pub fn topic(&self) -> String {
        match self.category() {
            TopicCategory::Event => format!("events.{}", self.as_str()),
            TopicCategory::InternalEvent => {
                format!("internal-events.{SERVICE_NAME}.{}", self.as_str())
            }
            TopicCategory::Command => format!("commands.{}", self.as_str()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_naming() {
        assert_eq!(MessageKind::BookingMade.topic(), "events.BookingMade");
        assert_eq!(
            MessageKind::VipBundleInitialized.topic(),
            "internal-events.svc-tickets.VipBundleInitialized"
        );
        assert_eq!(MessageKind::BookFlight.topic(), "commands.BookFlight");
        assert_eq!(
            MessageKind::VipBundleFinalized.topic(),
            "events.VipBundleFinalized"
        );
    }

    #[test]
    fn test_command_kinds() {
        assert_eq!(MessageKind::RefundTicket.category(), TopicCategory::Command);
        assert_eq!(MessageKind::TaxiBooked.category(), TopicCategory::Event);
    }
}
