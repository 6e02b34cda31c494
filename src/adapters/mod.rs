//! Remote API adapters
//!
//! `Transport` is the raw JSON-over-HTTP capability, `ForgePort` the
//! repository API built on it. `MockForge` stands in for a forge in tests.

pub mod forge_port;
pub mod github;
pub mod mock_forge;
pub mod transport;

pub use forge_port::{ForgeError, ForgePort, ForgeResult};
pub use github::GitHubAdapter;
pub use mock_forge::{MockCall, MockCallKind, MockForge};
pub use transport::{Credentials, HttpMethod, HttpTransport, Transport, TransportConfig};
