use es_macros::event;

#[event]
enum BankEvent {
    Opened(String),
}

fn main() {}
