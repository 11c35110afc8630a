//! Matching engine core
//!
//! One `SymbolEngine` owns one symbol's book, sequence counter, and
//! admission pipeline. Everything that mutates the book arrives as an
//! [`EngineOp`]; the same code path serves live traffic and journal
//! replay, which is what makes recovery deterministic.
//!
//! **Key Invariants:**
//! - Price-time priority: better price first, earlier admission
//!   sequence first within a price; fills execute at the maker's price.
//! - A resting order always has positive remaining quantity.
//! - After a limit order rests, no opposing liquidity owned by other
//!   owners crosses it; the taker's own orders may.
//! - Rejected submissions and failed cancels consume no sequence and
//!   produce no events.
//! - Market orders never rest; an unfilled market remainder cancels.
//! - Terminal order records may be pruned at snapshot boundaries;
//!   admission and matching never depend on them.

use serde::{Deserialize, Serialize};

use persistence::snapshot::BookState;
use types::errors::{AdmissionError, BookError, EngineError, TransitionError};
use types::fill::Fill;
use types::ids::{OrderId, Symbol};
use types::numeric::Quantity;
use types::order::{
    CancelReason, Order, OrderRequest, OrderStatus, RejectReason, TimeInForce,
};

use crate::book::OrderBook;
use crate::depth::{DepthSnapshot, TopOfBook};
use crate::events::{CancelSource, EngineEvent, EventPayload};
use crate::matching;
use crate::sequence::Sequencer;

/// A book-mutating operation, exactly as journaled
///
/// Only operations that passed admission are journaled, so replaying
/// the journal re-runs precisely the accepted history. Timestamps are
/// carried in the operation, never taken from the clock, which keeps
/// replay byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineOp {
    Submit { request: OrderRequest },
    Cancel { order_id: OrderId, timestamp: i64 },
}

impl EngineOp {
    /// Stable operation label used in journal entries
    pub fn op_type(&self) -> &'static str {
        match self {
            EngineOp::Submit { .. } => "SubmitOrder",
            EngineOp::Cancel { .. } => "CancelOrder",
        }
    }
}

/// Outcome of an accepted submission
#[derive(Debug, Clone)]
pub struct SubmitReport {
    pub order_id: OrderId,
    /// Admission sequence assigned to the order.
    pub sequence: u64,
    /// Final status after resolution (never `Accepted`).
    pub status: OrderStatus,
    pub fills: Vec<Fill>,
    pub remaining_quantity: Quantity,
    /// Every event this submission produced, in sequence order.
    pub events: Vec<EngineEvent>,
}

/// Outcome of a successful cancellation
#[derive(Debug, Clone)]
pub struct CancelReport {
    pub order_id: OrderId,
    pub status: OrderStatus,
    /// Quantity that was withdrawn from the book.
    pub remaining_quantity: Quantity,
    pub events: Vec<EngineEvent>,
}

/// One symbol's complete matching state
pub struct SymbolEngine {
    symbol: Symbol,
    book: OrderBook,
    sequencer: Sequencer,
}

impl SymbolEngine {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            book: OrderBook::new(symbol.clone()),
            sequencer: Sequencer::new(),
            symbol,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Last sequence consumed; 0 on a fresh engine
    pub fn last_sequence(&self) -> u64 {
        self.sequencer.last_consumed()
    }

    /// The admission sequence the next accepted operation will get
    ///
    /// The actor journals under this number before applying.
    pub fn next_sequence_hint(&self) -> u64 {
        self.sequencer.peek()
    }

    /// Admission checks for a submission
    ///
    /// Pure: no sequence is consumed and nothing is mutated, so a
    /// rejection here leaves no trace in the journal or event stream.
    /// The duplicate check is against live orders only; it answers the
    /// same during replay whether or not terminal records were pruned
    /// in between.
    pub fn validate_submit(&self, request: &OrderRequest) -> Result<(), EngineError> {
        if request.symbol != self.symbol {
            return Err(AdmissionError::UnknownSymbol {
                symbol: request.symbol.to_string(),
            }
            .into());
        }
        if self.book.has_open(&request.order_id) {
            return Err(AdmissionError::DuplicateOrderId {
                order_id: request.order_id.to_string(),
            }
            .into());
        }
        request.validate()?;
        Ok(())
    }

    /// Preconditions for a cancellation
    ///
    /// `OrderNotFound` for an id this book is not tracking (never
    /// admitted, or terminal and pruned); `AlreadyTerminal` for the
    /// loser of a cancel/fill race. Neither consumes a sequence.
    pub fn validate_cancel(&self, order_id: &OrderId) -> Result<(), EngineError> {
        let order = self
            .book
            .get(order_id)
            .ok_or_else(|| BookError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        if order.status.is_terminal() {
            return Err(TransitionError::AlreadyTerminal {
                status: order.status.name().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Admit, match, and resolve one submission
    ///
    /// On success the order is in a resolved state: resting, filled,
    /// cancelled by policy, or rejected by the fill-or-kill pre-check.
    /// The report's events are final; nothing about the order is
    /// published later except through fills against it.
    pub fn submit(&mut self, request: OrderRequest) -> Result<SubmitReport, EngineError> {
        self.validate_submit(&request)?;

        let timestamp = request.timestamp;
        let sequence = self.sequencer.next_sequence();
        let mut order = Order::from_request(request, sequence);
        let correlation_id = *order.order_id.as_uuid();

        // The admission event reuses the admission sequence.
        let mut events = vec![EngineEvent::new(
            sequence,
            timestamp,
            self.symbol.clone(),
            correlation_id,
            EventPayload::OrderAccepted {
                order_id: order.order_id,
                owner_id: order.owner_id,
                side: order.side,
                order_type: order.order_type,
                time_in_force: order.time_in_force,
                price: order.price,
                quantity: order.quantity,
            },
        )];

        // Fill-or-kill admits only if the book can fill it entirely.
        // Self-owned liquidity does not count: it would be skipped.
        if order.time_in_force == TimeInForce::FOK {
            let available =
                self.book
                    .available_opposing(order.side, order.price, &order.owner_id);
            if available < order.quantity {
                order.reject(RejectReason::FillOrKill, timestamp)?;
                let reject_sequence = self.sequencer.next_sequence();
                events.push(EngineEvent::new(
                    reject_sequence,
                    timestamp,
                    self.symbol.clone(),
                    correlation_id,
                    EventPayload::OrderRejected {
                        order_id: order.order_id,
                        owner_id: order.owner_id,
                        reason: RejectReason::FillOrKill,
                    },
                ));
                let report = SubmitReport {
                    order_id: order.order_id,
                    sequence,
                    status: order.status.clone(),
                    fills: Vec::new(),
                    remaining_quantity: order.remaining_quantity,
                    events,
                };
                self.book.track(order)?;
                return Ok(report);
            }
        }

        let maker_fills =
            matching::match_incoming(&mut self.book, &mut order, &mut self.sequencer, timestamp)?;

        let mut fills = Vec::with_capacity(maker_fills.len());
        let mut taker_remaining = order.quantity;
        for maker_fill in &maker_fills {
            taker_remaining = taker_remaining.saturating_sub(maker_fill.fill.quantity);
            events.push(EngineEvent::new(
                maker_fill.fill.sequence,
                timestamp,
                self.symbol.clone(),
                correlation_id,
                EventPayload::FillExecuted {
                    fill_id: maker_fill.fill.fill_id,
                    maker_order_id: maker_fill.fill.maker_order_id,
                    taker_order_id: maker_fill.fill.taker_order_id,
                    maker_owner_id: maker_fill.fill.maker_owner_id,
                    taker_owner_id: maker_fill.fill.taker_owner_id,
                    side: maker_fill.fill.side,
                    price: maker_fill.fill.price,
                    quantity: maker_fill.fill.quantity,
                    maker_remaining: maker_fill.maker_remaining,
                    taker_remaining,
                },
            ));

            let maker_payload = if maker_fill.maker_is_filled() {
                EventPayload::OrderFilled {
                    order_id: maker_fill.fill.maker_order_id,
                    side: maker_fill.maker_side,
                    price: Some(maker_fill.maker_price),
                    filled_quantity: maker_fill.maker_filled_quantity,
                }
            } else {
                EventPayload::OrderPartiallyFilled {
                    order_id: maker_fill.fill.maker_order_id,
                    side: maker_fill.maker_side,
                    price: maker_fill.maker_price,
                    filled_quantity: maker_fill.maker_filled_quantity,
                    remaining_quantity: maker_fill.maker_remaining,
                }
            };
            events.push(EngineEvent::new(
                maker_fill.maker_event_sequence,
                timestamp,
                self.symbol.clone(),
                *maker_fill.fill.maker_order_id.as_uuid(),
                maker_payload,
            ));

            fills.push(maker_fill.fill.clone());
        }

        // Resolve the taker.
        if order.is_filled() {
            let fill_sequence = self.sequencer.next_sequence();
            events.push(EngineEvent::new(
                fill_sequence,
                timestamp,
                self.symbol.clone(),
                correlation_id,
                EventPayload::OrderFilled {
                    order_id: order.order_id,
                    side: order.side,
                    price: order.price,
                    filled_quantity: order.filled_quantity,
                },
            ));
        } else if order.order_type.is_market() {
            // A market remainder cancels regardless of time in force.
            order.cancel(CancelReason::MarketUnfilled, timestamp)?;
            events.push(self.cancel_event(&order, CancelReason::MarketUnfilled, timestamp));
        } else {
            match order.time_in_force {
                TimeInForce::GTC => {
                    if !order.has_fills() {
                        order.rest(timestamp)?;
                    }
                    // A partial remainder keeps PARTIALLY_FILLED and its
                    // original sequence; it re-enters at its old priority.
                    self.book.index_resting(&order)?;
                    let rest_sequence = self.sequencer.next_sequence();
                    let price = order.price.ok_or_else(|| EngineError::System {
                        message: format!("resting order {} without price", order.order_id),
                    })?;
                    events.push(EngineEvent::new(
                        rest_sequence,
                        timestamp,
                        self.symbol.clone(),
                        correlation_id,
                        EventPayload::OrderRested {
                            order_id: order.order_id,
                            side: order.side,
                            price,
                            remaining_quantity: order.remaining_quantity,
                        },
                    ));
                    debug_assert!(
                        self.book
                            .available_opposing(order.side, order.price, &order.owner_id)
                            .is_zero(),
                        "Resting order left marketable liquidity uncrossed"
                    );
                }
                TimeInForce::IOC => {
                    order.cancel(CancelReason::IocUnfilled, timestamp)?;
                    events.push(self.cancel_event(&order, CancelReason::IocUnfilled, timestamp));
                }
                TimeInForce::FOK => {
                    // The pre-check admitted it, so matching must have
                    // consumed it entirely.
                    return Err(EngineError::System {
                        message: format!(
                            "fill-or-kill order {} passed admission but did not fill",
                            order.order_id
                        ),
                    });
                }
            }
        }

        let report = SubmitReport {
            order_id: order.order_id,
            sequence,
            status: order.status.clone(),
            fills,
            remaining_quantity: order.remaining_quantity,
            events,
        };
        self.book.track(order)?;
        Ok(report)
    }

    /// Cancel a live order's remainder
    pub fn cancel(
        &mut self,
        order_id: &OrderId,
        timestamp: i64,
    ) -> Result<CancelReport, EngineError> {
        self.validate_cancel(order_id)?;

        // Sequence is consumed only after validation.
        let sequence = self.sequencer.next_sequence();

        let snapshot = self
            .book
            .get(order_id)
            .cloned()
            .ok_or_else(|| EngineError::System {
                message: format!("validated cancel lost order {order_id}"),
            })?;
        self.book.unindex(&snapshot);

        let order = self
            .book
            .get_mut(order_id)
            .ok_or_else(|| EngineError::System {
                message: format!("validated cancel lost order {order_id}"),
            })?;
        order.cancel(CancelReason::UserRequested, timestamp)?;
        let status = order.status.clone();
        let remaining_quantity = order.remaining_quantity;
        let event_order = order.clone();

        let event = EngineEvent::new(
            sequence,
            timestamp,
            self.symbol.clone(),
            *order_id.as_uuid(),
            EventPayload::OrderCancelled {
                order_id: *order_id,
                side: event_order.side,
                price: event_order.price,
                cancelled_by: CancelSource::User,
                reason: CancelReason::UserRequested,
                filled_quantity: event_order.filled_quantity,
                remaining_quantity: event_order.remaining_quantity,
            },
        );

        Ok(CancelReport {
            order_id: *order_id,
            status,
            remaining_quantity,
            events: vec![event],
        })
    }

    /// Re-run a journaled operation under its original sequence
    ///
    /// The sequencer is rewound so the admission consumes exactly
    /// `sequence`; from there the live code path runs unchanged.
    pub fn replay(&mut self, sequence: u64, op: &EngineOp) -> Result<(), EngineError> {
        self.sequencer.rewind_to(sequence);
        match op {
            EngineOp::Submit { request } => self.submit(request.clone()).map(|_| ()),
            EngineOp::Cancel {
                order_id,
                timestamp,
            } => self.cancel(order_id, *timestamp).map(|_| ()),
        }
    }

    /// Adopt a restored book and resume sequencing after `last_sequence`
    pub fn restore_from(
        &mut self,
        state: &BookState,
        last_sequence: u64,
    ) -> Result<(), EngineError> {
        if state.symbol != self.symbol {
            return Err(EngineError::System {
                message: format!(
                    "state for {} restored into engine for {}",
                    state.symbol, self.symbol
                ),
            });
        }
        let mut book = OrderBook::new(self.symbol.clone());
        book.restore(state.orders.clone())?;
        self.book = book;
        self.sequencer.restore(last_sequence);
        Ok(())
    }

    /// Export the full tracked state for a snapshot
    pub fn export_state(&self) -> BookState {
        BookState::from_orders(self.symbol.clone(), self.book.tracked_orders())
    }

    /// Drop terminal order records from the book's map
    ///
    /// Consumes no sequence and leaves the live book untouched. The
    /// worker runs this before exporting a snapshot, so persisted
    /// state stays proportional to the open book. A cancel or status
    /// query for a pruned id answers `OrderNotFound`.
    pub fn prune_terminal(&mut self) -> usize {
        self.book.prune_terminal()
    }

    pub fn get_order(&self, order_id: &OrderId) -> Option<&Order> {
        self.book.get(order_id)
    }

    /// Aggregated depth, stamped with the current sequence
    pub fn depth(&self, max_levels: usize) -> DepthSnapshot {
        let (bids, asks) = self.book.depth(max_levels);
        DepthSnapshot::from_sides(self.symbol.clone(), bids, asks, self.last_sequence())
    }

    /// Best bid and ask, stamped with the current sequence
    pub fn top_of_book(&self) -> TopOfBook {
        TopOfBook::new(
            self.symbol.clone(),
            self.book.best_bid(),
            self.book.best_ask(),
            self.last_sequence(),
        )
    }

    /// Orders currently indexed on a side
    pub fn resting_count(&self) -> usize {
        self.book.resting_count()
    }

    /// Orders currently tracked, terminal included
    pub fn tracked_count(&self) -> usize {
        self.book.tracked_count()
    }

    fn cancel_event(&mut self, order: &Order, reason: CancelReason, timestamp: i64) -> EngineEvent {
        let sequence = self.sequencer.next_sequence();
        EngineEvent::new(
            sequence,
            timestamp,
            self.symbol.clone(),
            *order.order_id.as_uuid(),
            EventPayload::OrderCancelled {
                order_id: order.order_id,
                side: order.side,
                price: order.price,
                cancelled_by: CancelSource::from(reason.clone()),
                reason,
                filled_quantity: order.filled_quantity,
                remaining_quantity: order.remaining_quantity,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::OwnerId;
    use types::numeric::Price;
    use types::order::{OrderType, Side};

    fn symbol() -> Symbol {
        Symbol::new("BTCUSDT")
    }

    fn request(
        owner: OwnerId,
        side: Side,
        price: Option<u64>,
        qty: &str,
        tif: TimeInForce,
    ) -> OrderRequest {
        OrderRequest {
            order_id: OrderId::new(),
            owner_id: owner,
            symbol: symbol(),
            side,
            order_type: if price.is_some() {
                OrderType::LIMIT
            } else {
                OrderType::MARKET
            },
            time_in_force: tif,
            price: price.map(Price::from_u64),
            quantity: Quantity::from_str(qty).unwrap(),
            timestamp: 1708123456789000000,
        }
    }

    fn gtc(owner: OwnerId, side: Side, price: u64, qty: &str) -> OrderRequest {
        request(owner, side, Some(price), qty, TimeInForce::GTC)
    }

    #[test]
    fn test_submit_resting_order() {
        let mut engine = SymbolEngine::new(symbol());
        let report = engine
            .submit(gtc(OwnerId::new(), Side::BUY, 10, "100"))
            .unwrap();

        assert_eq!(report.sequence, 1);
        assert_eq!(report.status, OrderStatus::Resting);
        assert!(report.fills.is_empty());
        assert_eq!(report.remaining_quantity, Quantity::from_u64(100));
        // Accepted (reusing the admission sequence) then Rested.
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].sequence, 1);
        assert_eq!(report.events[0].payload.event_type(), "OrderAccepted");
        assert_eq!(report.events[1].sequence, 2);
        assert_eq!(report.events[1].payload.event_type(), "OrderRested");
    }

    #[test]
    fn test_partial_fill_rests_remainder_at_maker_price() {
        let mut engine = SymbolEngine::new(symbol());
        let buyer = OwnerId::new();
        let seller = OwnerId::new();

        let buy = engine.submit(gtc(buyer, Side::BUY, 10, "100")).unwrap();
        let sell = engine.submit(gtc(seller, Side::SELL, 10, "50")).unwrap();

        // Exactly one fill of 50 at the maker's price of 10.
        assert_eq!(sell.fills.len(), 1);
        assert_eq!(sell.fills[0].price, Price::from_u64(10));
        assert_eq!(sell.fills[0].quantity, Quantity::from_u64(50));
        assert_eq!(sell.status, OrderStatus::Filled);

        // Buyer's remainder of 50 still rests at 10.
        let resting = engine.get_order(&buy.order_id).unwrap();
        assert_eq!(resting.status, OrderStatus::PartiallyFilled);
        assert_eq!(resting.remaining_quantity, Quantity::from_u64(50));
        assert_eq!(engine.top_of_book().bid.unwrap().price, Price::from_u64(10));
        assert_eq!(
            engine.top_of_book().bid.unwrap().quantity,
            Quantity::from_u64(50)
        );
    }

    #[test]
    fn test_fill_events_interleave_in_sequence_order() {
        let mut engine = SymbolEngine::new(symbol());
        let buyer = OwnerId::new();
        let seller = OwnerId::new();

        engine.submit(gtc(buyer, Side::BUY, 10, "100")).unwrap();
        let sell = engine.submit(gtc(seller, Side::SELL, 10, "50")).unwrap();

        let kinds: Vec<&str> = sell
            .events
            .iter()
            .map(|e| e.payload.event_type())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "OrderAccepted",
                "FillExecuted",
                "OrderPartiallyFilled",
                "OrderFilled"
            ]
        );
        // Sequences strictly increase across the report.
        let sequences: Vec<u64> = sell.events.iter().map(|e| e.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_ioc_cancels_unfilled_remainder() {
        let mut engine = SymbolEngine::new(symbol());
        let report = engine
            .submit(request(
                OwnerId::new(),
                Side::BUY,
                Some(10),
                "100",
                TimeInForce::IOC,
            ))
            .unwrap();

        assert_eq!(
            report.status,
            OrderStatus::Cancelled(CancelReason::IocUnfilled)
        );
        assert!(report.fills.is_empty());
        assert_eq!(engine.resting_count(), 0);
        assert_eq!(report.events[1].payload.event_type(), "OrderCancelled");
    }

    #[test]
    fn test_fok_rejects_when_book_cannot_fill() {
        let mut engine = SymbolEngine::new(symbol());
        let seller = OwnerId::new();
        engine.submit(gtc(seller, Side::SELL, 10, "60")).unwrap();
        let before = engine.depth(10);

        let report = engine
            .submit(request(
                OwnerId::new(),
                Side::BUY,
                Some(10),
                "100",
                TimeInForce::FOK,
            ))
            .unwrap();

        assert_eq!(report.status, OrderStatus::Rejected(RejectReason::FillOrKill));
        assert!(report.fills.is_empty());
        // Book unchanged apart from the sequence stamp.
        let after = engine.depth(10);
        assert_eq!(before.asks, after.asks);
        assert_eq!(before.bids, after.bids);
    }

    #[test]
    fn test_fok_fills_completely_when_possible() {
        let mut engine = SymbolEngine::new(symbol());
        let seller = OwnerId::new();
        engine.submit(gtc(seller, Side::SELL, 10, "60")).unwrap();
        engine.submit(gtc(seller, Side::SELL, 11, "60")).unwrap();

        let report = engine
            .submit(request(
                OwnerId::new(),
                Side::BUY,
                Some(11),
                "100",
                TimeInForce::FOK,
            ))
            .unwrap();

        assert_eq!(report.status, OrderStatus::Filled);
        assert_eq!(report.fills.len(), 2);
        assert!(report.remaining_quantity.is_zero());
    }

    #[test]
    fn test_fok_excludes_self_owned_liquidity() {
        let mut engine = SymbolEngine::new(symbol());
        let owner = OwnerId::new();
        // 100 available, but 60 of it is the submitter's own.
        engine.submit(gtc(owner, Side::SELL, 10, "60")).unwrap();
        engine
            .submit(gtc(OwnerId::new(), Side::SELL, 10, "40"))
            .unwrap();

        let fok = request(owner, Side::BUY, Some(10), "100", TimeInForce::FOK);
        let report = engine.submit(fok).unwrap();

        assert_eq!(report.status, OrderStatus::Rejected(RejectReason::FillOrKill));
    }

    #[test]
    fn test_market_order_never_rests() {
        let mut engine = SymbolEngine::new(symbol());
        engine
            .submit(gtc(OwnerId::new(), Side::SELL, 10, "30"))
            .unwrap();

        let report = engine
            .submit(request(
                OwnerId::new(),
                Side::BUY,
                None,
                "100",
                TimeInForce::GTC,
            ))
            .unwrap();

        // Fills what it can, cancels the rest even under GTC.
        assert_eq!(report.fills.len(), 1);
        assert_eq!(
            report.status,
            OrderStatus::Cancelled(CancelReason::MarketUnfilled)
        );
        assert_eq!(report.remaining_quantity, Quantity::from_u64(70));
        assert_eq!(engine.resting_count(), 0);
    }

    #[test]
    fn test_self_trade_gtc_rests_crossed_against_self() {
        let mut engine = SymbolEngine::new(symbol());
        let owner = OwnerId::new();

        engine.submit(gtc(owner, Side::SELL, 10, "50")).unwrap();
        let report = engine.submit(gtc(owner, Side::BUY, 10, "50")).unwrap();

        // No fill against own liquidity; the degenerate GTC rests.
        assert!(report.fills.is_empty());
        assert_eq!(report.status, OrderStatus::Resting);
        assert_eq!(engine.resting_count(), 2);
        // Both sides quote 10: crossed only against the same owner.
        let top = engine.top_of_book();
        assert_eq!(top.bid.unwrap().price, Price::from_u64(10));
        assert_eq!(top.ask.unwrap().price, Price::from_u64(10));
    }

    #[test]
    fn test_self_trade_ioc_cancels() {
        let mut engine = SymbolEngine::new(symbol());
        let owner = OwnerId::new();

        engine.submit(gtc(owner, Side::SELL, 10, "50")).unwrap();
        let report = engine
            .submit(request(owner, Side::BUY, Some(10), "50", TimeInForce::IOC))
            .unwrap();

        assert!(report.fills.is_empty());
        assert_eq!(
            report.status,
            OrderStatus::Cancelled(CancelReason::IocUnfilled)
        );
    }

    #[test]
    fn test_duplicate_order_id_rejected_synchronously() {
        let mut engine = SymbolEngine::new(symbol());
        let req = gtc(OwnerId::new(), Side::BUY, 10, "1");
        let dup = req.clone();

        engine.submit(req).unwrap();
        let seq_after_first = engine.last_sequence();

        let err = engine.submit(dup).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Admission(AdmissionError::DuplicateOrderId { .. })
        ));
        // A rejection consumes no sequence.
        assert_eq!(engine.last_sequence(), seq_after_first);
    }

    #[test]
    fn test_id_reuse_after_terminal_is_accepted() {
        let mut engine = SymbolEngine::new(symbol());
        let maker = gtc(OwnerId::new(), Side::SELL, 10, "50");
        let maker_id = maker.order_id;
        engine.submit(maker).unwrap();
        engine
            .submit(gtc(OwnerId::new(), Side::BUY, 10, "50"))
            .unwrap();
        assert_eq!(
            engine.get_order(&maker_id).unwrap().status,
            OrderStatus::Filled
        );

        // The id is no longer held by a live order.
        let mut reuse = gtc(OwnerId::new(), Side::SELL, 12, "5");
        reuse.order_id = maker_id;
        let report = engine.submit(reuse).unwrap();
        assert_eq!(report.status, OrderStatus::Resting);
        assert_eq!(
            engine.get_order(&maker_id).unwrap().status,
            OrderStatus::Resting
        );
    }

    #[test]
    fn test_prune_terminal_drops_only_terminal_records() {
        let mut engine = SymbolEngine::new(symbol());
        let resting = engine
            .submit(gtc(OwnerId::new(), Side::BUY, 9, "10"))
            .unwrap();
        let maker = engine
            .submit(gtc(OwnerId::new(), Side::SELL, 10, "30"))
            .unwrap();
        let taker = engine
            .submit(gtc(OwnerId::new(), Side::BUY, 10, "30"))
            .unwrap();
        assert_eq!(taker.status, OrderStatus::Filled);
        let depth_before = engine.depth(10);

        // Maker, taker, and nothing else drop; sequencing is untouched.
        let last = engine.last_sequence();
        assert_eq!(engine.prune_terminal(), 2);
        assert_eq!(engine.last_sequence(), last);
        assert_eq!(engine.tracked_count(), 1);
        assert!(engine.get_order(&resting.order_id).is_some());
        assert!(engine.get_order(&maker.order_id).is_none());

        let depth_after = engine.depth(10);
        assert_eq!(depth_before.bids, depth_after.bids);
        assert_eq!(depth_before.asks, depth_after.asks);

        // A cancel for a pruned id reads as unknown.
        let err = engine.cancel(&maker.order_id, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Book(BookError::OrderNotFound { .. })
        ));
    }

    #[test]
    fn test_wrong_symbol_rejected() {
        let mut engine = SymbolEngine::new(symbol());
        let mut req = gtc(OwnerId::new(), Side::BUY, 10, "1");
        req.symbol = Symbol::new("ETHUSDT");

        let err = engine.submit(req).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Admission(AdmissionError::UnknownSymbol { .. })
        ));
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut engine = SymbolEngine::new(symbol());
        let report = engine
            .submit(gtc(OwnerId::new(), Side::BUY, 10, "100"))
            .unwrap();

        let cancel = engine
            .cancel(&report.order_id, 1708123456790000000)
            .unwrap();
        assert_eq!(
            cancel.status,
            OrderStatus::Cancelled(CancelReason::UserRequested)
        );
        assert_eq!(cancel.remaining_quantity, Quantity::from_u64(100));
        assert_eq!(engine.resting_count(), 0);
        assert_eq!(cancel.events.len(), 1);
        assert_eq!(cancel.events[0].payload.event_type(), "OrderCancelled");
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut engine = SymbolEngine::new(symbol());
        let err = engine.cancel(&OrderId::new(), 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Book(BookError::OrderNotFound { .. })
        ));
        assert_eq!(engine.last_sequence(), 0);
    }

    #[test]
    fn test_cancel_terminal_order_reports_already_terminal() {
        let mut engine = SymbolEngine::new(symbol());
        let buyer = OwnerId::new();
        let buy = engine.submit(gtc(buyer, Side::BUY, 10, "50")).unwrap();
        engine
            .submit(gtc(OwnerId::new(), Side::SELL, 10, "50"))
            .unwrap();

        // The buy is fully filled; a late cancel loses the race.
        let seq_before = engine.last_sequence();
        let err = engine.cancel(&buy.order_id, 2).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transition(TransitionError::AlreadyTerminal { .. })
        ));
        assert_eq!(engine.last_sequence(), seq_before);
    }

    #[test]
    fn test_replay_reproduces_state() {
        let mut live = SymbolEngine::new(symbol());
        let buyer = OwnerId::new();
        let seller = OwnerId::new();

        let buy_req = gtc(buyer, Side::BUY, 10, "100");
        let sell_req = gtc(seller, Side::SELL, 10, "50");
        let buy = live.submit(buy_req.clone()).unwrap();
        let buy_seq = buy.sequence;
        let sell = live.submit(sell_req.clone()).unwrap();
        let sell_seq = sell.sequence;
        let cancel_seq = live.next_sequence_hint();
        live.cancel(&buy.order_id, 1708123456791000000).unwrap();

        let mut replayed = SymbolEngine::new(symbol());
        replayed
            .replay(buy_seq, &EngineOp::Submit { request: buy_req })
            .unwrap();
        replayed
            .replay(sell_seq, &EngineOp::Submit { request: sell_req })
            .unwrap();
        replayed
            .replay(
                cancel_seq,
                &EngineOp::Cancel {
                    order_id: buy.order_id,
                    timestamp: 1708123456791000000,
                },
            )
            .unwrap();

        assert_eq!(live.last_sequence(), replayed.last_sequence());
        assert_eq!(
            live.export_state().compute_hash(),
            replayed.export_state().compute_hash()
        );
    }

    #[test]
    fn test_restore_then_resume() {
        let mut engine = SymbolEngine::new(symbol());
        engine
            .submit(gtc(OwnerId::new(), Side::BUY, 10, "100"))
            .unwrap();
        let state = engine.export_state();
        let last = engine.last_sequence();

        let mut restored = SymbolEngine::new(symbol());
        restored.restore_from(&state, last).unwrap();
        assert_eq!(restored.last_sequence(), last);
        assert_eq!(restored.resting_count(), 1);

        // New traffic sequences after the restored point.
        let report = restored
            .submit(gtc(OwnerId::new(), Side::SELL, 10, "100"))
            .unwrap();
        assert!(report.sequence > last);
        assert_eq!(report.status, OrderStatus::Filled);
    }

    #[test]
    fn test_depth_reflects_book() {
        let mut engine = SymbolEngine::new(symbol());
        let owner = OwnerId::new();
        engine.submit(gtc(owner, Side::BUY, 10, "5")).unwrap();
        engine.submit(gtc(owner, Side::BUY, 10, "5")).unwrap();
        engine.submit(gtc(owner, Side::BUY, 9, "3")).unwrap();
        engine.submit(gtc(owner, Side::SELL, 12, "7")).unwrap();

        let depth = engine.depth(10);
        assert_eq!(depth.bids.len(), 2);
        assert_eq!(depth.bids[0].price, Price::from_u64(10));
        assert_eq!(depth.bids[0].quantity, Quantity::from_u64(10));
        assert_eq!(depth.bids[0].order_count, 2);
        assert_eq!(depth.asks.len(), 1);
        assert_eq!(depth.sequence, engine.last_sequence());
    }
}
