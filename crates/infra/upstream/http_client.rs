use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    pin::Pin,
    time::Duration,
};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::{header::CONTENT_TYPE, redirect};
use tracing::{error, warn};
use url::{Host, Url};

const MAX_REDIRECTS: usize = 10;

pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Body of an upstream response, forwarded chunk by chunk.
pub struct UpstreamBody {
    pub content_type: Option<String>,
    pub stream: ByteStream,
}

/// Loopback, private, link-local and unspecified addresses, plus `localhost`.
pub fn is_internal_host(host: Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Host::Ipv4(ip) => is_internal_ip(IpAddr::V4(ip)),
        Host::Ipv6(ip) => is_internal_ip(IpAddr::V6(ip)),
    }
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_internal_v4(mapped);
    }

    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local, fe80::/10 link-local
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => is_internal_v4(ip),
        IpAddr::V6(ip) => is_internal_v6(ip),
    }
}

/// Plain HTTP fetcher for playlists, stream manifests and channel logos.
pub struct UpstreamHttpClient {
    http: reqwest::Client,
}

impl UpstreamHttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .redirect(redirect::Policy::custom(|attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if attempt.url().host().is_some_and(is_internal_host) {
                    attempt.error("redirect to an internal host")
                } else {
                    attempt.follow()
                }
            }))
            .build()
            .context("failed to build upstream http client")?;

        Ok(Self { http })
    }

    /// Only absolute http(s) URLs may be proxied.
    pub fn parse_target(raw: &str) -> Result<Url> {
        let url = Url::parse(raw.trim()).context("upstream url is not a valid url")?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("unsupported upstream scheme: {other}"),
        }
    }

    /// [`Self::parse_target`] restricted to public hosts, for anything a
    /// client can point the proxy at.
    pub fn parse_public_target(raw: &str) -> Result<Url> {
        let url = Self::parse_target(raw)?;
        match url.host() {
            Some(host) if !is_internal_host(host.clone()) => Ok(url),
            Some(host) => bail!("upstream host is not public: {host}"),
            None => bail!("upstream url has no host"),
        }
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let url = Self::parse_target(url)?;
        let resp = self.http.get(url.clone()).send().await?;

        if !resp.status().is_success() {
            error!(
                status = %resp.status(),
                upstream = %url,
                "upstream: playlist request failed"
            );
            bail!("upstream returned status {}", resp.status());
        }

        Ok(resp.text().await?)
    }

    pub async fn open_stream(&self, url: &str) -> Result<UpstreamBody> {
        let url = Self::parse_public_target(url)?;
        let resp = self.http.get(url.clone()).send().await?;

        if !resp.status().is_success() {
            warn!(
                status = %resp.status(),
                upstream = %url,
                "upstream: proxied request failed"
            );
            bail!("upstream returned status {}", resp.status());
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let stream = resp.bytes_stream().map_err(std::io::Error::other);

        Ok(UpstreamBody {
            content_type,
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_targets() {
        assert!(UpstreamHttpClient::parse_target("http://cdn.example/live.m3u8").is_ok());
        assert!(UpstreamHttpClient::parse_target(" https://cdn.example/logo.png ").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(UpstreamHttpClient::parse_target("file:///etc/passwd").is_err());
        assert!(UpstreamHttpClient::parse_target("ftp://cdn.example/x").is_err());
        assert!(UpstreamHttpClient::parse_target("not a url").is_err());
    }

    #[test]
    fn proxy_targets_must_be_public_hosts() {
        for internal in [
            "http://localhost:5432/",
            "http://api.localhost/",
            "http://127.0.0.1/admin",
            "http://2130706433/",
            "http://10.0.0.5/live.m3u8",
            "http://172.16.3.4/",
            "http://192.168.1.1/logo.png",
            "http://169.254.169.254/latest/meta-data/",
            "http://0.0.0.0:8080/",
            "http://[::1]/",
            "http://[::ffff:127.0.0.1]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
        ] {
            assert!(
                UpstreamHttpClient::parse_public_target(internal).is_err(),
                "{internal} should be refused"
            );
        }

        assert!(UpstreamHttpClient::parse_public_target("http://cdn.example/live.m3u8").is_ok());
        assert!(UpstreamHttpClient::parse_public_target("https://93.184.216.34/logo.png").is_ok());
        assert!(UpstreamHttpClient::parse_public_target("http://[2606:4700::1111]/").is_ok());
    }

    #[test]
    fn playlist_source_may_live_on_an_internal_host() {
        assert!(UpstreamHttpClient::parse_target("http://127.0.0.1:8000/list.m3u").is_ok());
    }

    #[test]
    fn ip_classification_covers_both_families() {
        assert!(is_internal_ip("192.168.0.10".parse().unwrap()));
        assert!(is_internal_ip("::1".parse().unwrap()));
        assert!(!is_internal_ip("8.8.8.8".parse().unwrap()));
        assert!(!is_internal_ip("2001:4860:4860::8888".parse().unwrap()));
    }
}
