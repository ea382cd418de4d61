use es_domain::domain_event::DomainEvent;
use es_macros::event;

#[event]
enum BankEvent {
    #[event(event_type = "BANK_OPENED_V1")]
    Opened { name: String },
    #[event(event_type = "BANK_RENAMED_V1")]
    Renamed { to: String },
}

fn main() {
    let e = BankEvent::Renamed { to: "x".into() };
    assert_eq!(e.event_type(), "BANK_RENAMED_V1");
    assert_eq!(BankEvent::EVENT_TYPES, &["BANK_OPENED_V1", "BANK_RENAMED_V1"]);
    assert_eq!(BankEvent::variant_of("BANK_OPENED_V1"), Some("Opened"));
    assert_eq!(BankEvent::variant_of("BANK_CLOSED_V1"), None);
}
