use bulletin_core::{format_selection, select, Item, Scope};
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use time::macros::datetime;

const CLIENTS: [&str; 4] = ["web", "android", "ios", "desktop"];

fn mk_item(index: usize) -> Item {
    let valid_until =
        if index % 5 == 0 { "2020-12-31T00:00:00Z" } else { "2099-01-01T00:00:00Z" };
    let mut value = json!({
        "id": format!("notice-{index}"),
        "title": "Scheduled maintenance",
        "description": "Services may be briefly unavailable.",
        "link": "https://status.example.com/maintenance",
        "validSince": format!("2020-{:02}-01T00:00:00Z", index % 12 + 1),
        "validUntil": valid_until,
    });
    if index % 3 != 0 {
        value["limitedTo"] = json!([CLIENTS[index % CLIENTS.len()]]);
    }

    match Item::from_value("bench", &value) {
        Ok(item) => item,
        Err(err) => panic!("benchmark fixture failed to parse: {err}"),
    }
}

fn bench_select_and_format(c: &mut Criterion) {
    let items = (0..5_000).map(mk_item).collect::<Vec<_>>();
    let clients = CLIENTS
        .iter()
        .map(|client| match Scope::parse(client) {
            Ok(scope) => scope,
            Err(err) => panic!("benchmark client failed to parse: {err}"),
        })
        .collect::<Vec<_>>();
    let now = datetime!(2021-06-01 00:00 UTC);

    c.bench_function("select_and_format_5000_items", |b| {
        b.iter(|| {
            let selection = select(&items, &clients, now);
            if let Err(err) = format_selection(&selection) {
                panic!("benchmark formatting failed: {err}");
            }
        });
    });
}

criterion_group!(selection_benches, bench_select_and_format);
criterion_main!(selection_benches);
