use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use storeledger_core::TenantId;
use storeledger_events::InMemoryEventBus;
use storeledger_infra::ShopServices;
use storeledger_infra::event_store::InMemoryEventStore;
use storeledger_infra::workflows::{CheckoutItem, CheckoutRequest, NewProduct};
use storeledger_products::{Pricing, ProductCategory, ProductId};

fn offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600).unwrap()
}

fn opening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 4, 0, 0).unwrap()
}

fn stocked_shop(services: &ShopServices, products: usize, quantity: u64) -> (TenantId, Vec<ProductId>) {
    let tenant_id = TenantId::new();
    let ids = (0..products)
        .map(|n| {
            let product_id = services
                .create_product(
                    tenant_id,
                    NewProduct {
                        sku: format!("SKU-{n}"),
                        barcode: None,
                        name: format!("Product {n}"),
                        category: ProductCategory::Other,
                        unit: "pcs".to_string(),
                        pricing: Pricing {
                            sale_price: 1_000 + n as u64,
                            cost_price: 600,
                        },
                    },
                    opening(),
                )
                .unwrap()
                .product_id;
            services
                .receive_stock(tenant_id, product_id, quantity, None, None, opening())
                .unwrap();
            product_id
        })
        .collect();
    (tenant_id, ids)
}

fn walk_in_sale(products: &[ProductId]) -> CheckoutRequest {
    CheckoutRequest {
        customer_id: None,
        items: products
            .iter()
            .map(|product_id| CheckoutItem {
                product_id: *product_id,
                quantity: 1,
                discount: 0,
            })
            .collect(),
        invoice_discount: 0,
        tendered: 10_000 * products.len() as u64,
        note: None,
    }
}

fn bench_checkout_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout_latency");

    for lines in [1usize, 5, 20] {
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            let services = ShopServices::in_memory(offset());
            let (tenant_id, products) = stocked_shop(&services, lines, 10_000_000);
            let request = walk_in_sale(&products);
            b.iter(|| {
                let receipt = services
                    .checkout(tenant_id, None, request.clone(), opening() + Duration::hours(2))
                    .unwrap();
                black_box(receipt);
            });
        });
    }
    group.finish();
}

fn bench_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_model_rebuild");
    group.sample_size(20);

    for sales in [10usize, 100, 1_000] {
        let store = Arc::new(InMemoryEventStore::new());
        let services = ShopServices::new(store.clone(), Arc::new(InMemoryEventBus::new()), offset());
        let (tenant_id, products) = stocked_shop(&services, 10, sales as u64 * 3);
        for n in 0..sales {
            let picked = &products[n % products.len()..=n % products.len()];
            services
                .checkout(tenant_id, None, walk_in_sale(picked), opening() + Duration::hours(1))
                .unwrap();
        }

        let replica = ShopServices::new(store, Arc::new(InMemoryEventBus::new()), offset());
        group.bench_with_input(BenchmarkId::from_parameter(sales), &sales, |b, _| {
            b.iter(|| black_box(replica.rebuild().unwrap()));
        });
    }
    group.finish();
}

fn bench_day_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("day_preview");
    group.sample_size(50);

    for sales in [100usize, 1_000] {
        let services = ShopServices::in_memory(offset());
        let (tenant_id, products) = stocked_shop(&services, 20, sales as u64);
        for n in 0..sales {
            services
                .checkout(
                    tenant_id,
                    None,
                    walk_in_sale(&products[..1 + n % 3]),
                    opening() + Duration::minutes(n as i64 % 600),
                )
                .unwrap();
        }

        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let now = opening() + Duration::hours(14);
        group.bench_with_input(BenchmarkId::from_parameter(sales), &sales, |b, _| {
            b.iter(|| black_box(services.preview_day(tenant_id, date, now).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_checkout_latency,
    bench_rebuild_speed,
    bench_day_preview
);
criterion_main!(benches);
