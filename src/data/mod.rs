pub mod loader;
pub mod types;

pub use loader::{DataLoader, RELATION_COLUMNS, TRANSACTION_COLUMNS};
pub use types::{CategoricalEncoder, ClientRelationship, JoinedEvent, TransactionEvent};
