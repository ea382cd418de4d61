use es_macros::event;

#[event]
enum BankEvent {
    #[event(event_type = "BANK_OPENED_V1")]
    Opened { name: String },
    #[event(event_type = "BANK_OPENED_V1")]
    Reopened { name: String },
}

fn main() {}
