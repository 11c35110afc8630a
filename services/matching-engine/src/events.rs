//! Outbound event stream
//!
//! Every state change the engine makes is reported as an `EngineEvent`
//! on the per-symbol sequence. An order's admission event reuses the
//! admission sequence; every later event consumes a fresh number, so
//! sorting by sequence reconstructs exactly what the engine did.
//!
//! Events are not persisted. The journal holds accepted operations;
//! consumers that miss events re-synchronize from a depth view.

use serde::{Deserialize, Serialize};
use types::ids::{FillId, OrderId, OwnerId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{CancelReason, OrderType, RejectReason, Side, TimeInForce};
use uuid::Uuid;

/// Event schema version, bumped on any wire-visible change
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Source tag stamped on every event
pub const EVENT_SOURCE: &str = "matching-engine";

/// Who initiated a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancelSource {
    User,
    System,
}

impl From<CancelReason> for CancelSource {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::UserRequested => CancelSource::User,
            CancelReason::IocUnfilled | CancelReason::MarketUnfilled => CancelSource::System,
        }
    }
}

/// What happened, tagged for wire consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventPayload {
    /// Order passed admission; its sequence is the admission sequence.
    OrderAccepted {
        order_id: OrderId,
        owner_id: OwnerId,
        side: Side,
        order_type: OrderType,
        time_in_force: TimeInForce,
        price: Option<Price>,
        quantity: Quantity,
    },
    /// Unfilled remainder entered the book.
    OrderRested {
        order_id: OrderId,
        side: Side,
        price: Price,
        remaining_quantity: Quantity,
    },
    /// One match between a maker and a taker, at the maker's price.
    FillExecuted {
        fill_id: FillId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_owner_id: OwnerId,
        taker_owner_id: OwnerId,
        /// Taker's side, the aggressor.
        side: Side,
        price: Price,
        quantity: Quantity,
        maker_remaining: Quantity,
        taker_remaining: Quantity,
    },
    /// A maker gave up part of its quantity and still rests.
    OrderPartiallyFilled {
        order_id: OrderId,
        side: Side,
        price: Price,
        filled_quantity: Quantity,
        remaining_quantity: Quantity,
    },
    /// Order completely filled (maker or taker).
    OrderFilled {
        order_id: OrderId,
        side: Side,
        price: Option<Price>,
        filled_quantity: Quantity,
    },
    /// Live remainder withdrawn, by the user or by time-in-force policy.
    OrderCancelled {
        order_id: OrderId,
        side: Side,
        price: Option<Price>,
        cancelled_by: CancelSource,
        reason: CancelReason,
        filled_quantity: Quantity,
        remaining_quantity: Quantity,
    },
    /// Order refused after admission without touching the book.
    OrderRejected {
        order_id: OrderId,
        owner_id: OwnerId,
        reason: RejectReason,
    },
}

impl EventPayload {
    /// Stable name for logs and metrics
    pub fn event_type(&self) -> &'static str {
        match self {
            EventPayload::OrderAccepted { .. } => "OrderAccepted",
            EventPayload::OrderRested { .. } => "OrderRested",
            EventPayload::FillExecuted { .. } => "FillExecuted",
            EventPayload::OrderPartiallyFilled { .. } => "OrderPartiallyFilled",
            EventPayload::OrderFilled { .. } => "OrderFilled",
            EventPayload::OrderCancelled { .. } => "OrderCancelled",
            EventPayload::OrderRejected { .. } => "OrderRejected",
        }
    }
}

/// Mint the deterministic id for the event at `sequence`
///
/// The "event:" prefix keeps the namespace disjoint from fill ids,
/// which are minted the same way.
pub fn deterministic_event_id(symbol: &Symbol, sequence: u64) -> Uuid {
    let name = format!("event:{}:{}", symbol, sequence);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

/// Envelope carried by every outbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_id: Uuid,
    /// Per-symbol sequence; the total order of the stream.
    pub sequence: u64,
    pub timestamp: i64,
    pub source: String,
    pub symbol: Symbol,
    pub payload: EventPayload,
    pub schema_version: String,
    /// The order this event concerns; fills correlate to the taker.
    pub correlation_id: Uuid,
}

impl EngineEvent {
    pub fn new(
        sequence: u64,
        timestamp: i64,
        symbol: Symbol,
        correlation_id: Uuid,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: deterministic_event_id(&symbol, sequence),
            sequence,
            timestamp,
            source: EVENT_SOURCE.to_string(),
            symbol,
            payload,
            schema_version: SCHEMA_VERSION.to_string(),
            correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted_event(sequence: u64) -> EngineEvent {
        let order_id = OrderId::new();
        EngineEvent::new(
            sequence,
            1708123456789000000,
            Symbol::new("BTCUSDT"),
            *order_id.as_uuid(),
            EventPayload::OrderAccepted {
                order_id,
                owner_id: OwnerId::new(),
                side: Side::BUY,
                order_type: OrderType::LIMIT,
                time_in_force: TimeInForce::GTC,
                price: Some(Price::from_u64(50000)),
                quantity: Quantity::from_str("1.0").unwrap(),
            },
        )
    }

    #[test]
    fn test_event_envelope_fields() {
        let event = accepted_event(42);
        assert_eq!(event.sequence, 42);
        assert_eq!(event.source, EVENT_SOURCE);
        assert_eq!(event.schema_version, SCHEMA_VERSION);
        assert_eq!(
            event.event_id,
            deterministic_event_id(&Symbol::new("BTCUSDT"), 42)
        );
    }

    #[test]
    fn test_event_id_deterministic_and_disjoint() {
        let symbol = Symbol::new("BTCUSDT");
        assert_eq!(
            deterministic_event_id(&symbol, 7),
            deterministic_event_id(&symbol, 7)
        );
        assert_ne!(
            deterministic_event_id(&symbol, 7),
            deterministic_event_id(&symbol, 8)
        );
        // Same sequence, different namespace prefix: fills never collide
        // with events.
        let fill_id = crate::matching::deterministic_fill_id(&symbol, 7);
        assert_ne!(deterministic_event_id(&symbol, 7), *fill_id.as_uuid());
    }

    #[test]
    fn test_payload_serializes_with_tag() {
        let event = accepted_event(1);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["event_type"], "OrderAccepted");
        assert_eq!(json["schema_version"], "1.0.0");

        let back: EngineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_cancel_source_mapping() {
        assert_eq!(
            CancelSource::from(CancelReason::UserRequested),
            CancelSource::User
        );
        assert_eq!(
            CancelSource::from(CancelReason::IocUnfilled),
            CancelSource::System
        );
        assert_eq!(
            CancelSource::from(CancelReason::MarketUnfilled),
            CancelSource::System
        );
    }

    #[test]
    fn test_cancel_source_wire_format() {
        let json = serde_json::to_string(&CancelSource::System).unwrap();
        assert_eq!(json, "\"SYSTEM\"");
    }
}
