use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use portal_authz::{AccessResolver, RoleRestrictions};

fn restrictions(roles: usize) -> RoleRestrictions {
    (0..roles)
        .map(|i| {
            (
                format!("role{}", i),
                format!("GET/area{}/*, POST/area{}/items, */shared/{}*", i, i, i),
            )
        })
        .collect()
}

fn bench_can_access_cached(c: &mut Criterion) {
    let resolver = AccessResolver::new(restrictions(20));

    // Warm up cache
    resolver.can_access("role3", "/area3/items", Some("POST"));

    c.bench_function("can_access_cached", |b| {
        b.iter(|| {
            resolver.can_access(
                black_box("role3"),
                black_box("/area3/items"),
                black_box(Some("POST")),
            )
        });
    });
}

fn bench_resolve_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_uncached");

    for roles in [5, 20, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, &roles| {
            b.iter_batched(
                || AccessResolver::new(restrictions(roles)),
                |resolver| resolver.required_roles(black_box("/shared/42/doc"), None),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_unrestricted(c: &mut Criterion) {
    let resolver = AccessResolver::unrestricted();

    c.bench_function("can_access_unrestricted", |b| {
        b.iter(|| resolver.can_access(black_box("guest"), black_box("/anything"), None));
    });
}

criterion_group!(
    benches,
    bench_can_access_cached,
    bench_resolve_uncached,
    bench_unrestricted
);
criterion_main!(benches);
