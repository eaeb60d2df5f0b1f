pub mod error;
pub mod events;
pub mod id;
pub mod method;
pub mod params;

pub use error::{ErrorKind, Result, ServiceError};
pub use events::{EventBroadcaster, ServiceEvent};
pub use id::{Id, generate_id};
pub use method::{ParseMethodError, ServiceMethod};
pub use params::{Paginate, Paginated, Params};
