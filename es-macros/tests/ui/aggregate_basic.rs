use es_domain::aggregate::EventSourced;
use es_domain::entity::Entity;
use es_macros::{aggregate, event};

#[event]
enum CounterEvent {
    Added { amount: i64 },
}

#[aggregate(event = CounterEvent)]
struct Counter {
    value: i64,
}

fn main() {
    let c = Counter::new("c-1".to_string(), "t-1".to_string());
    assert_eq!(c.id(), "c-1");
    assert_eq!(c.tenant_id(), "t-1");
    assert_eq!(c.version(), 0);
    assert_eq!(c.value, 0);
    assert!(c.changes().is_empty());
}
