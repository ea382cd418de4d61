use es_domain::domain_event::DomainEvent;
use es_macros::event;
use serde::{Deserialize, Serialize};

#[event]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum NoteEvent {
    Written { body: String },
}

fn main() {
    let e = NoteEvent::Written { body: "hi".into() };
    assert_eq!(e.event_type(), "NoteEvent.Written");
    assert_eq!(e.clone(), e);
}
