pub mod cleanup;
pub mod clock;
pub mod store;
pub mod types;

pub use cleanup::{Cleanup, SweepResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{SessionSettings, SessionStore, StoreError};
pub use types::{Role, Session, Turn};
