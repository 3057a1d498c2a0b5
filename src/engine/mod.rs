pub mod pending;
pub mod ping;
pub mod traceroute;

pub use pending::*;
pub use ping::*;
pub use traceroute::*;
