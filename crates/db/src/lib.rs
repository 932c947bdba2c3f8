pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, DbPool};
pub use fixtures::{SeedCheck, SeedDataset, SeedOrderInfo, SeedSummary, SeedVerification};
pub use stores::{SqlOrderStore, SqlPaymentStore, SqlTicketStore};
