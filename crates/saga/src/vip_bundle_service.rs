//! Starting VIP bundle sagas.

use common::{BookingId, FlightId, ShowId, VipBundleId};
use domain::{
    Event, EventHeader, MessageKind, NewVipBundle, VipBundle, VipBundleInitialized,
};
use serde::{Deserialize, Serialize};
use store::{OutboxMessage, SagaStore, VipBundleRepository};
use tracing::{info, instrument};

use crate::Result;
use crate::process_manager::vip_bundle_fact_key;

/// A request for a VIP bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookVipBundle {
    pub customer_email: String,
    pub number_of_tickets: u32,
    pub show_id: ShowId,
    pub passengers: Vec<String>,
    pub inbound_flight_id: FlightId,
    pub return_flight_id: FlightId,
}

/// Identifiers of an accepted VIP bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedVipBundle {
    pub vip_bundle_id: VipBundleId,
    pub booking_id: BookingId,
}

/// Creates VIP bundles and starts their sagas.
#[derive(Clone)]
pub struct VipBundleService<S> {
    repository: VipBundleRepository<S>,
}

impl<S: SagaStore> VipBundleService<S> {
    /// Creates a new service over `repository`.
    pub fn new(repository: VipBundleRepository<S>) -> Self {
        Self { repository }
    }

    /// Accepts a VIP bundle for processing.
    ///
    /// The bundle and its `VipBundleInitialized` event are stored together;
    /// everything after that happens asynchronously.
    #[instrument(skip_all, fields(show_id = %request.show_id, tickets = request.number_of_tickets))]
    pub async fn book_vip_bundle(&self, request: BookVipBundle) -> Result<BookedVipBundle> {
        let bundle = VipBundle::new(NewVipBundle {
            vip_bundle_id: VipBundleId::new(),
            booking_id: BookingId::new(),
            customer_email: request.customer_email,
            number_of_tickets: request.number_of_tickets,
            show_id: request.show_id,
            passengers: request.passengers,
            inbound_flight_id: request.inbound_flight_id,
            return_flight_id: request.return_flight_id,
        })?;

        let initialized = Event::VipBundleInitialized(VipBundleInitialized {
            header: EventHeader::for_fact(
                vip_bundle_fact_key(bundle.vip_bundle_id(), "initialized"),
                MessageKind::VipBundleInitialized.as_str(),
            ),
            vip_bundle_id: bundle.vip_bundle_id(),
        });
        self.repository
            .add(&bundle, vec![OutboxMessage::event(&initialized)?])
            .await?;

        metrics::counter!("vip_bundles_booked_total").increment(1);
        info!(vip_bundle_id = %bundle.vip_bundle_id(), booking_id = %bundle.booking_id(), "VIP bundle accepted");

        Ok(BookedVipBundle {
            vip_bundle_id: bundle.vip_bundle_id(),
            booking_id: bundle.booking_id(),
        })
    }

    /// Loads a bundle by id.
    pub async fn get(&self, vip_bundle_id: VipBundleId) -> Result<VipBundle> {
        Ok(self.repository.get(vip_bundle_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use domain::VipBundleError;
    use store::InMemoryStore;

    use super::*;
    use crate::SagaError;

    fn request(passengers: &[&str]) -> BookVipBundle {
        BookVipBundle {
            customer_email: "vip@example.com".to_string(),
            number_of_tickets: 2,
            show_id: ShowId::new(),
            passengers: passengers.iter().map(|p| p.to_string()).collect(),
            inbound_flight_id: FlightId::new(),
            return_flight_id: FlightId::new(),
        }
    }

    #[tokio::test]
    async fn test_bundle_and_event_stored_together() {
        let store = InMemoryStore::new();
        let service = VipBundleService::new(VipBundleRepository::new(store.clone()));

        let booked = service.book_vip_bundle(request(&["A", "B"])).await.unwrap();

        let bundle = service.get(booked.vip_bundle_id).await.unwrap();
        assert_eq!(bundle.booking_id(), booked.booking_id);
        let records = store.pending_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].message.topic,
            "internal-events.svc-tickets.VipBundleInitialized"
        );
        assert_eq!(
            records[0].message.metadata[store::META_IDEMPOTENCY_KEY],
            format!("vip-bundle-{}-initialized", booked.vip_bundle_id)
        );
    }

    #[tokio::test]
    async fn test_invalid_request_stores_nothing() {
        let store = InMemoryStore::new();
        let service = VipBundleService::new(VipBundleRepository::new(store.clone()));

        let err = service.book_vip_bundle(request(&["A"])).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::VipBundle(VipBundleError::PassengerCountMismatch { .. })
        ));
        assert_eq!(store.bundle_count().await, 0);
        assert!(store.pending_records().await.is_empty());
    }
}
