use chrono::Utc;
use common::{BookingId, Money, ShowId, TicketId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{BookingMade, Event, EventHeader, TicketBookingConfirmed, TicketReceiptIssued};
use projections::{InMemoryOpsBookingStore, OpsBookingProjection, Projection};

/// Builds the events of one booking: created, N tickets confirmed, N receipts.
fn booking_events(tickets: usize) -> Vec<Event> {
    let booking_id = BookingId::new();
    let mut events = vec![Event::BookingMade(BookingMade {
        header: EventHeader::new(),
        booking_id,
        number_of_tickets: tickets as u32,
        customer_email: "vip@example.com".to_string(),
        show_id: ShowId::new(),
        booked_at: Utc::now(),
    })];

    for n in 0..tickets {
        let ticket_id = TicketId::new();
        events.push(Event::TicketBookingConfirmed(TicketBookingConfirmed {
            header: EventHeader::new(),
            booking_id,
            ticket_id,
            customer_email: "vip@example.com".to_string(),
            price: Money::new("75.00", "EUR"),
        }));
        events.push(Event::TicketReceiptIssued(TicketReceiptIssued {
            header: EventHeader::new(),
            ticket_id,
            receipt_number: format!("R-{n:04}"),
            issued_at: Utc::now(),
        }));
    }
    events
}

fn bench_project_100_bookings(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let bookings: Vec<_> = (0..100).map(|_| booking_events(2)).collect();

    c.bench_function("projections/ops_bookings_500_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let projection = OpsBookingProjection::new(InMemoryOpsBookingStore::new());
                for events in &bookings {
                    for event in events {
                        projection.handle(event).await.unwrap();
                    }
                }
            });
        });
    });
}

fn bench_redelivered_updates(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let events = booking_events(10);
    let projection = OpsBookingProjection::new(InMemoryOpsBookingStore::new());
    rt.block_on(async {
        for event in &events {
            projection.handle(event).await.unwrap();
        }
    });

    c.bench_function("projections/redelivered_20_updates", |b| {
        b.iter(|| {
            rt.block_on(async {
                for event in &events[1..] {
                    projection.handle(event).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_project_100_bookings, bench_redelivered_updates);
criterion_main!(benches);
