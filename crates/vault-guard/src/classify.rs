use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Why an address was rejected, before we know whether a `privateEndpoints`
/// allowlist can override it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpClass {
    Ok,
    NonOverridable,
    Private,
}

/// Folds an IPv4-mapped IPv6 address down to its IPv4 form so range checks
/// see the real address instead of its `::ffff:a.b.c.d` wrapper.
pub fn canonicalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

pub fn classify_ip(ip: IpAddr) -> IpClass {
    let ip = canonicalize(ip);
    if is_non_overridable(ip) {
        return IpClass::NonOverridable;
    }
    if is_private(ip) {
        return IpClass::Private;
    }
    IpClass::Ok
}

/// Addresses that are never reachable, even via a `privateEndpoints`
/// allowlist: link-local/cloud-metadata ranges.
fn is_non_overridable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local() || v4 == Ipv4Addr::new(100, 100, 100, 200),
        IpAddr::V6(v6) => is_ipv6_link_local(v6),
    }
}

/// Addresses blocked by default but overridable by an explicit
/// `privateEndpoints` allowlist entry matching host and port.
fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_broadcast() || is_ipv4_carrier_grade_nat(v4)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unique_local(),
    }
}

fn is_ipv4_carrier_grade_nat(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

fn is_ipv6_link_local(ip: Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

pub fn is_metadata_hostname(host: &str) -> bool {
    matches!(
        host,
        "metadata"
            | "metadata.google.internal"
            | "instance-data"
            | "instance-data.ec2.internal"
            | "metadata.azure.internal"
    )
}

pub fn is_localhost_hostname(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_local_v4_is_non_overridable() {
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))),
            IpClass::NonOverridable
        );
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))),
            IpClass::NonOverridable
        );
    }

    #[test]
    fn alibaba_metadata_ip_is_non_overridable() {
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(100, 100, 100, 200))),
            IpClass::NonOverridable
        );
    }

    #[test]
    fn ipv6_link_local_is_non_overridable() {
        let ip: Ipv6Addr = "fe80::1".parse().unwrap();
        assert_eq!(classify_ip(IpAddr::V6(ip)), IpClass::NonOverridable);
    }

    #[test]
    fn private_v4_ranges_are_overridable_private() {
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            IpClass::Private
        );
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1))),
            IpClass::Private
        );
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))),
            IpClass::Private
        );
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            IpClass::Private
        );
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(100, 64, 0, 1))),
            IpClass::Private
        );
    }

    #[test]
    fn ipv6_loopback_and_unique_local_are_private() {
        assert_eq!(
            classify_ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            IpClass::Private
        );
        let ula: Ipv6Addr = "fc00::1".parse().unwrap();
        assert_eq!(classify_ip(IpAddr::V6(ula)), IpClass::Private);
    }

    #[test]
    fn public_address_is_ok() {
        assert_eq!(
            classify_ip(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))),
            IpClass::Ok
        );
    }

    #[test]
    fn ipv4_mapped_ipv6_is_canonicalized_before_classification() {
        let mapped: Ipv6Addr = "::ffff:169.254.169.254".parse().unwrap();
        assert_eq!(classify_ip(IpAddr::V6(mapped)), IpClass::NonOverridable);
    }

    #[test]
    fn metadata_and_localhost_hostnames_are_recognized() {
        assert!(is_metadata_hostname("metadata.google.internal"));
        assert!(!is_metadata_hostname("example.com"));
        assert!(is_localhost_hostname("localhost"));
        assert!(is_localhost_hostname("foo.localhost"));
        assert!(!is_localhost_hostname("localhost.example.com"));
    }
}
