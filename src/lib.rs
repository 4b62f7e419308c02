//! Project Lookup Library
//!
//! Core components of the employee project lookup client:
//!
//! - `lookup` - transport session, framing strategies, codec and client
//! - `models` - identifier and assignment records
//! - `config` - client configuration from defaults, environment and flags
//! - `prompt` - the interactive operator loop
//!
//! ```ignore
//! use project_lookup::{ClientConfig, Identifier, LookupClient};
//!
//! let client = LookupClient::new(ClientConfig::default());
//! match client.lookup(Identifier::new(7)).await {
//!     Ok(projects) if projects.is_empty() => println!("none"),
//!     Ok(projects) => println!("{} projects", projects.len()),
//!     Err(e) => eprintln!("{} ({})", e, e.kind()),
//! }
//! ```

pub mod config;
pub mod lookup;
pub mod models;
pub mod prompt;

pub use config::{ClientConfig, ServerAddr, StartupOptions};
pub use lookup::{LookupClient, LookupError};
pub use models::{AssociationRecord, Identifier, LookupResult};
