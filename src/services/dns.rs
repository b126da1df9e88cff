//! DNS resolution, exposed under both `dns.lookup` and its `dnsLookup`
//! alias (spec §4.1).

use std::net::IpAddr;
use tokio::net::lookup_host;

use crate::error::RouteError;

#[derive(Default)]
pub struct DnsService;

impl DnsService {
    pub fn new() -> Self {
        Self
    }

    pub async fn lookup(&self, hostname: &str) -> Result<Vec<IpAddr>, RouteError> {
        let target = format!("{hostname}:0");
        let addrs = lookup_host(target)
            .await
            .map_err(RouteError::from)?
            .map(|addr| addr.ip())
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(RouteError::not_found(format!("could not resolve {hostname}")));
        }
        Ok(addrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_localhost() {
        let svc = DnsService::new();
        let addrs = svc.lookup("localhost").await.unwrap();
        assert!(!addrs.is_empty());
    }
}
