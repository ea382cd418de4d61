use es_macros::aggregate;

#[aggregate(evt = String)]
struct Account {
    balance: i64,
}

fn main() {}
