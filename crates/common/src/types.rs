use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic event ids derived from idempotency keys.
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1d_2c7a_93b4_4e0f_8a51_c2d9_7e40_b318);

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier wraps a UUID to provide type safety and prevent mixing up
/// a booking id with a VIP bundle id, a ticket id with a flight ticket id, etc.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Returns true for the all-zero UUID.
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of a VIP bundle saga instance.
    VipBundleId
);
uuid_id!(
    /// Identifier of a show booking. One VIP bundle owns exactly one booking.
    BookingId
);
uuid_id!(
    /// Identifier of a show.
    ShowId
);
uuid_id!(
    /// Identifier of a single show ticket.
    TicketId
);
uuid_id!(
    /// Identifier of a flight.
    FlightId
);
uuid_id!(
    /// Identifier of a ticket issued by the flights service.
    FlightTicketId
);
uuid_id!(
    /// Identifier of a taxi booking issued by the taxi service.
    TaxiBookingId
);
uuid_id!(
    /// Unique identifier of a single event or command instance.
    EventId
);

impl EventId {
    /// Derives a deterministic event id from a stable name.
    ///
    /// A handler that is re-executed for the same business fact derives the
    /// same id, so the outbox and downstream consumers can deduplicate it.
    pub fn derive(name: &str) -> Self {
        Self(Uuid::new_v5(&EVENT_ID_NAMESPACE, name.as_bytes()))
    }
}

/// A monetary amount as reported by the external booking services.
///
/// The amount is kept in its decimal string form; this system never does
/// arithmetic on prices, it only carries them into the read model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    /// Creates a money value.
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_unique_ids() {
        let id1 = VipBundleId::new();
        let id2 = VipBundleId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = BookingId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn test_nil_is_detected() {
        assert!(TicketId::from_uuid(Uuid::nil()).is_nil());
        assert!(!TicketId::new().is_nil());
    }

    #[test]
    fn test_serializes_as_plain_uuid() {
        let id = FlightId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
        let parsed: FlightId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_parses_from_str() {
        let uuid = Uuid::new_v4();
        let id: ShowId = uuid.to_string().parse().unwrap();
        assert_eq!(id.as_uuid(), uuid);
        assert!("not-a-uuid".parse::<ShowId>().is_err());
    }

    #[test]
    fn test_derived_event_ids_are_stable() {
        let a = EventId::derive("booking-1:BookingMade");
        let b = EventId::derive("booking-1:BookingMade");
        let c = EventId::derive("booking-1:BookingFailed");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new("49.90", "EUR").to_string(), "49.90 EUR");
    }
}
