use crate::error::{Error, Result};
use url::Url;

/// The scheme of a parsed server address.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A parsed `scheme://host:port[/path]` server address. The port is part of
/// the grammar, a URI without one fails to parse. `path` stays `None` when
/// the URI carries none (a bare `/` counts as none), callers substitute the
/// well-known `/socket.io/` base path in that case.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Address {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: Option<String>,
}

impl Address {
    /// Parses a `http(s)://host:port[/path]` string.
    pub fn parse(uri: &str) -> Result<Address> {
        let url = Url::parse(uri).map_err(|_| Error::MalformedUri(uri.to_owned()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(Error::MalformedUri(uri.to_owned())),
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::MalformedUri(uri.to_owned()))?
            .to_owned();
        // the port is mandatory; the url crate suppresses an explicit port
        // that equals the scheme default, so the raw authority decides
        // whether one was written
        let port = match url.port() {
            Some(port) => port,
            None if has_explicit_port(uri) => url
                .port_or_known_default()
                .ok_or_else(|| Error::MalformedUri(uri.to_owned()))?,
            None => return Err(Error::MalformedUri(uri.to_owned())),
        };
        let path = match url.path() {
            "" | "/" => None,
            path => Some(path.to_owned()),
        };

        Ok(Address {
            scheme,
            host,
            port,
            path,
        })
    }

    /// The http(s) base URL for this address, with the well-known
    /// `/socket.io/` path substituted when the URI carried none.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}://{}:{}/",
            self.scheme.as_str(),
            self.host,
            self.port
        ))?;
        url.set_path(self.path.as_deref().unwrap_or("/socket.io/"));
        Ok(url)
    }
}

/// Whether the raw URI text spells out a `:<digits>` port in its authority.
fn has_explicit_port(uri: &str) -> bool {
    let Some((_, rest)) = uri.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    match authority.rsplit_once(':') {
        Some((_, digits)) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() -> Result<()> {
        let address = Address::parse("http://example.org:8080/custom/path")?;
        assert_eq!(
            address,
            Address {
                scheme: Scheme::Http,
                host: "example.org".to_owned(),
                port: 8080,
                path: Some("/custom/path".to_owned()),
            }
        );

        let address = Address::parse("https://10.0.0.2:4202")?;
        assert_eq!(address.scheme, Scheme::Https);
        assert_eq!(address.host, "10.0.0.2");
        assert_eq!(address.port, 4202);
        assert_eq!(address.path, None);
        Ok(())
    }

    #[test]
    fn test_bare_slash_counts_as_no_path() -> Result<()> {
        let address = Address::parse("http://localhost:4201/")?;
        assert_eq!(address.path, None);
        assert_eq!(
            address.base_url()?.as_str(),
            "http://localhost:4201/socket.io/"
        );
        Ok(())
    }

    #[test]
    fn test_explicit_default_port_is_accepted() -> Result<()> {
        let address = Address::parse("http://example.org:80/app")?;
        assert_eq!(address.port, 80);
        assert_eq!(address.path, Some("/app".to_owned()));

        let address = Address::parse("https://example.org:443")?;
        assert_eq!(address.port, 443);
        Ok(())
    }

    #[test]
    fn test_missing_port_fails() {
        assert!(matches!(
            Address::parse("http://localhost"),
            Err(Error::MalformedUri(_))
        ));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(matches!(
            Address::parse("ftp://localhost:21"),
            Err(Error::MalformedUri(_))
        ));
        assert!(matches!(
            Address::parse("not a uri"),
            Err(Error::MalformedUri(_))
        ));
    }

    #[test]
    fn test_base_url_keeps_custom_path() -> Result<()> {
        let address = Address::parse("http://localhost:4201/custom/")?;
        assert_eq!(
            address.base_url()?.as_str(),
            "http://localhost:4201/custom/"
        );
        Ok(())
    }
}
