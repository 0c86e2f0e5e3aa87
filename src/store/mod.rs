pub mod memory;
pub mod session;
pub mod supabase;
pub mod traits;
pub mod types;

pub use memory::{MemoryStore, StoreCall};
pub use session::{SessionHub, SessionListener, Subscription};
pub use supabase::SupabaseStore;
pub use traits::ListingStore;
pub use types::{Session, SessionEvent, SessionUser, StoreError};
