use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use matching_engine::engine::SymbolEngine;
use types::ids::{OrderId, OwnerId, Symbol};
use types::numeric::{Price, Quantity};
use types::order::{OrderRequest, OrderType, Side, TimeInForce};

const BASE_TS: i64 = 1708123456789000000;

fn symbol() -> Symbol {
    Symbol::new("BTCUSDT")
}

fn limit(owner: OwnerId, side: Side, price: u64, qty: u64, stamp: i64) -> OrderRequest {
    OrderRequest {
        order_id: OrderId::new(),
        owner_id: owner,
        symbol: symbol(),
        side,
        order_type: OrderType::LIMIT,
        time_in_force: TimeInForce::GTC,
        price: Some(Price::from_u64(price)),
        quantity: Quantity::from_u64(qty),
        timestamp: stamp,
    }
}

fn bench_order_submission(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_submission");

    for &num_orders in [100u64, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("non_crossing_orders", num_orders),
            &num_orders,
            |b, &num_orders| {
                b.iter(|| {
                    let mut engine = SymbolEngine::new(symbol());
                    let owner = OwnerId::new();
                    for i in 0..num_orders {
                        let order = if i % 2 == 0 {
                            limit(owner, Side::BUY, 10000 - i, 100, BASE_TS + i as i64)
                        } else {
                            limit(owner, Side::SELL, 10100 + i, 100, BASE_TS + i as i64)
                        };
                        black_box(engine.submit(order).unwrap());
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_order_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_matching");

    for &depth in [10u64, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("crossing_sweep", depth),
            &depth,
            |b, &depth| {
                b.iter_batched(
                    || {
                        let mut engine = SymbolEngine::new(symbol());
                        let maker = OwnerId::new();
                        for i in 0..depth {
                            engine
                                .submit(limit(
                                    maker,
                                    Side::SELL,
                                    10000 + i,
                                    100,
                                    BASE_TS + i as i64,
                                ))
                                .unwrap();
                            engine
                                .submit(limit(
                                    maker,
                                    Side::BUY,
                                    9999 - i,
                                    100,
                                    BASE_TS + i as i64,
                                ))
                                .unwrap();
                        }
                        engine
                    },
                    |mut engine| {
                        // One taker sweeps half the ask side.
                        let crossing = limit(
                            OwnerId::new(),
                            Side::BUY,
                            10000 + depth,
                            depth * 50,
                            BASE_TS + depth as i64,
                        );
                        black_box(engine.submit(crossing).unwrap())
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_market_data_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("market_data");

    let mut engine = SymbolEngine::new(symbol());
    let maker = OwnerId::new();
    for i in 0..1000u64 {
        engine
            .submit(limit(maker, Side::SELL, 10000 + i, 100, BASE_TS + i as i64))
            .unwrap();
        engine
            .submit(limit(maker, Side::BUY, 9999 - i, 100, BASE_TS + i as i64))
            .unwrap();
    }

    group.bench_function("top_of_book", |b| b.iter(|| black_box(engine.top_of_book())));

    group.bench_function("depth_10", |b| b.iter(|| black_box(engine.depth(10))));

    group.finish();
}

fn bench_order_cancellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancellation");

    for &num_orders in [100u64, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("cancel_resting", num_orders),
            &num_orders,
            |b, &num_orders| {
                b.iter_batched(
                    || {
                        let mut engine = SymbolEngine::new(symbol());
                        let owner = OwnerId::new();
                        let mut ids = Vec::with_capacity(num_orders as usize);
                        for i in 0..num_orders {
                            let report = engine
                                .submit(limit(
                                    owner,
                                    Side::BUY,
                                    10000 - (i % 50),
                                    100,
                                    BASE_TS + i as i64,
                                ))
                                .unwrap();
                            ids.push(report.order_id);
                        }
                        (engine, ids)
                    },
                    |(mut engine, ids)| {
                        for (i, order_id) in ids.iter().enumerate() {
                            if i % 2 == 0 {
                                black_box(engine.cancel(order_id, BASE_TS + i as i64).unwrap());
                            }
                        }
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_order_submission,
    bench_order_matching,
    bench_market_data_access,
    bench_order_cancellation
);

criterion_main!(benches);
