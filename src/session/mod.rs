//! Real-time session management
//!
//! [`SessionManager`] owns every live connection, its journey buffer and the
//! subscription registry. [`SessionDispatcher`] drives it from a single task;
//! transport code talks to it through [`SessionHandle`].

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod manager;
pub mod state;

pub use config::SessionConfig;
pub use connection::{ConnectionHandle, ConnectionId, Delivery};
pub use dispatcher::{SessionDispatcher, SessionEvent, SessionHandle};
pub use manager::{DisconnectOutcome, SessionManager};
pub use state::ConnectionState;
