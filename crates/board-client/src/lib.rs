//! Remote data gateway — the sole API boundary between the board and its
//! backend. The cache and views depend on [`BoardGateway`], never on a
//! concrete [`TableStore`].
//!
//! ```text
//! BoardGateway ──► CredentialProvider   (bearer credential, sign-out)
//!      │
//!      └────────► TableStore            (select / insert / update / delete)
//!                   ├── HttpTableStore   (REST table API)
//!                   └── MemoryTableStore (in-process)
//! ```

pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod session;
pub mod store;

pub use error::{RemoteError, StoreError};
pub use gateway::{BoardGateway, GatewayResult};
pub use http::{HttpStoreConfig, HttpTableStore};
pub use memory::{MemoryTableStore, StoreOp};
pub use session::{CredentialProvider, StaticCredentials};
pub use store::{Condition, Filter, Row, TableStore};
