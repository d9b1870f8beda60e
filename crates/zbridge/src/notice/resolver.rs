//! Reverse lookup of notice origins.

use std::ffi::CStr;
use std::net::{IpAddr, SocketAddr};

use socket2::SockAddr;
use tracing::debug;

use super::NOTICE_TARGET;

const HOST_BUFFER_LEN: usize = 1025;

/// Maps an origin address to a host name.
pub trait HostResolver {
    /// Returns the host name for `address`, or `None` when it has none.
    fn lookup(&self, address: IpAddr) -> Option<String>;
}

/// Resolves `address`, falling back to its numeric form.
#[must_use]
pub fn resolve_host(resolver: &dyn HostResolver, address: IpAddr) -> String {
    resolver
        .lookup(address)
        .unwrap_or_else(|| address.to_string())
}

/// Resolver backed by the system's `getnameinfo(3)`.
///
/// Lookups block until the name service answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn lookup(&self, address: IpAddr) -> Option<String> {
        let socket = SockAddr::from(SocketAddr::new(address, 0));
        let mut host = [0 as libc::c_char; HOST_BUFFER_LEN];
        let host_len = libc::socklen_t::try_from(host.len()).ok()?;

        // SAFETY: `socket` holds a valid address of `socket.len()` bytes and
        // `host` is writable for `host_len` bytes. No service name is asked for.
        let status = unsafe {
            libc::getnameinfo(
                socket.as_ptr(),
                socket.len(),
                host.as_mut_ptr(),
                host_len,
                std::ptr::null_mut(),
                0,
                libc::NI_NAMEREQD,
            )
        };
        if status != 0 {
            debug!(target: NOTICE_TARGET, %address, status, "reverse lookup failed");
            return None;
        }

        // SAFETY: on success `getnameinfo` NUL-terminates `host`.
        let name = unsafe { CStr::from_ptr(host.as_ptr()) };
        Some(name.to_string_lossy().into_owned())
    }
}

/// Resolver that never looks names up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericResolver;

impl HostResolver for NumericResolver {
    fn lookup(&self, _address: IpAddr) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use mockall::mock;
    use rstest::rstest;

    use super::*;

    mock! {
        Resolver {}
        impl HostResolver for Resolver {
            fn lookup(&self, address: IpAddr) -> Option<String>;
        }
    }

    #[test]
    fn uses_resolved_name() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_lookup()
            .once()
            .return_const(Some(String::from("mail.example.org")));

        assert_eq!(
            resolve_host(&resolver, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            "mail.example.org"
        );
    }

    #[rstest]
    #[case(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), "192.0.2.1")]
    #[case(IpAddr::V6(Ipv6Addr::LOCALHOST), "::1")]
    fn falls_back_to_numeric_address(#[case] address: IpAddr, #[case] expected: &str) {
        let mut resolver = MockResolver::new();
        resolver.expect_lookup().once().return_const(None::<String>);

        assert_eq!(resolve_host(&resolver, address), expected);
    }

    #[test]
    fn numeric_resolver_never_resolves() {
        assert_eq!(
            resolve_host(&NumericResolver, IpAddr::V4(Ipv4Addr::LOCALHOST)),
            "127.0.0.1"
        );
    }
}
