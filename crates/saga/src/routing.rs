//! The handler table.
//!
//! Built once at startup: every route maps one message kind to one handler.
//! The route name doubles as the consumer group, so each route sees every
//! message of its kind.

use std::sync::Arc;

use domain::MessageKind;
use messaging::{MessageHandler, Router};
use projections::{Projection, ProjectionHandler};
use store::{OutboxStore, SagaStore};

use crate::handlers::{
    BookFlightHandler, BookShowTicketsHandler, BookTaxiHandler, CancelFlightTicketsHandler,
    IssueReceiptHandler, PrintTicketHandler, ProcessManagerHandler, RefundTicketHandler,
};
use crate::process_manager::{HANDLED_EVENTS, VipBundleProcessManager};
use crate::services::ExternalServices;

pub struct Route {
    pub name: String,
    pub kind: MessageKind,
    pub handler: Arc<dyn MessageHandler>,
}

#[derive(Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Creates an empty routing table.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: MessageKind,
        handler: Arc<dyn MessageHandler>,
    ) -> &mut Self {
        self.routes.push(Route {
            name: name.into(),
            kind,
            handler,
        });
        self
    }

    /// Adds the process manager and every command and ticket handler.
    pub fn with_saga<S: SagaStore + 'static>(
        mut self,
        manager: Arc<VipBundleProcessManager<S>>,
        outbox: Arc<dyn OutboxStore>,
        services: &ExternalServices,
    ) -> Self {
        for kind in HANDLED_EVENTS {
            self.add(
                format!("vip-bundle-process-manager.{kind}"),
                *kind,
                Arc::new(ProcessManagerHandler::new(manager.clone(), *kind)),
            );
        }

        self.add(
            "book-show-tickets",
            MessageKind::BookShowTickets,
            Arc::new(BookShowTicketsHandler::new(
                services.shows.clone(),
                outbox.clone(),
            )),
        )
        .add(
            "book-flight",
            MessageKind::BookFlight,
            Arc::new(BookFlightHandler::new(
                services.flights.clone(),
                outbox.clone(),
            )),
        )
        .add(
            "book-taxi",
            MessageKind::BookTaxi,
            Arc::new(BookTaxiHandler::new(services.taxis.clone(), outbox.clone())),
        )
        .add(
            "cancel-flight-tickets",
            MessageKind::CancelFlightTickets,
            Arc::new(CancelFlightTicketsHandler::new(services.flights.clone())),
        )
        .add(
            "refund-ticket",
            MessageKind::RefundTicket,
            Arc::new(RefundTicketHandler::new(
                services.receipts.clone(),
                services.payments.clone(),
                outbox.clone(),
            )),
        )
        .add(
            "issue-receipt",
            MessageKind::TicketBookingConfirmed,
            Arc::new(IssueReceiptHandler::new(
                services.receipts.clone(),
                outbox.clone(),
            )),
        )
        .add(
            "print-ticket",
            MessageKind::TicketBookingConfirmed,
            Arc::new(PrintTicketHandler::new(services.printer.clone(), outbox)),
        );
        self
    }

    /// Adds a route for every event kind a projection consumes.
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        let name = projection.name();
        for (kind, handler) in ProjectionHandler::for_projection(projection) {
            self.add(format!("{name}.{kind}"), kind, Arc::new(handler));
        }
        self
    }

    /// Returns every route in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the names of the routes handling `kind`.
    pub fn handlers_for(&self, kind: MessageKind) -> Vec<&str> {
        self.routes
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Registers every route with the router.
    pub fn install(self, router: &mut Router) {
        for route in self.routes {
            router.add_handler(route.name, route.kind.topic(), route.handler);
        }
    }
}
