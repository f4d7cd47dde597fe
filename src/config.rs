//! Server configuration: listen address, with an optional `clap` derive for
//! binaries built with the `cli` feature. Parsing argv is explicitly outside
//! the core library's scope; this struct is what a driver binary fills in
//! and hands to [`crate::server::run`].

use std::net::SocketAddr;

/// Listen address/port. Default `0.0.0.0:2000`, matching the reference
/// server's default.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "cli", derive(clap::Parser))]
pub struct Config {
    #[cfg_attr(
        feature = "cli",
        arg(long, default_value = "0.0.0.0:2000")
    )]
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 2000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_addr_is_2000() {
        assert_eq!(Config::default().bind_addr.port(), 2000);
    }
}
