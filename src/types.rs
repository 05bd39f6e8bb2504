//! Data structures used throughout the daemon.
//!
//! A [`ContainerSnapshot`] is read fresh from Docker on every
//! reconciliation pass and thrown away afterwards. Nothing here is
//! persisted or diffed against a previous snapshot.

use std::net::Ipv4Addr;

/// Environment variable carrying a container's virtual host name.
pub const VIRTUAL_HOST_VAR: &str = "VIRTUAL_HOST=";

/// What the daemon knows about one running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerView {
    pub id: String,
    /// First IPv4 address found on the container's networks.
    pub address: Option<Ipv4Addr>,
    /// Value of the `VIRTUAL_HOST` environment entry.
    pub virtual_host: Option<String>,
}

impl ContainerView {
    /// The `(host, address)` pair when both are known.
    pub fn entry(&self) -> Option<(&str, Ipv4Addr)> {
        match (&self.virtual_host, self.address) {
            (Some(host), Some(ip)) if !host.is_empty() => Some((host.as_str(), ip)),
            _ => None,
        }
    }
}

/// Running containers in Docker's listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSnapshot {
    views: Vec<ContainerView>,
}

impl ContainerSnapshot {
    pub fn new(views: Vec<ContainerView>) -> Self {
        Self { views }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerView> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }
}

impl FromIterator<ContainerView> for ContainerSnapshot {
    fn from_iter<I: IntoIterator<Item = ContainerView>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Finds the virtual host in a container's environment list.
///
/// Matches `VIRTUAL_HOST=<value>` anywhere in an entry, where the value is
/// the run of non-whitespace characters that follows. An occurrence with an
/// empty value is skipped and the search continues; the first non-empty
/// match wins.
pub fn virtual_host<S: AsRef<str>>(env: &[S]) -> Option<String> {
    env.iter().find_map(|entry| {
        let mut rest = entry.as_ref();
        while let Some(pos) = rest.find(VIRTUAL_HOST_VAR) {
            rest = &rest[pos + VIRTUAL_HOST_VAR.len()..];
            let value: &str = rest.split(char::is_whitespace).next().unwrap_or_default();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_host_found() {
        let env = ["PATH=/usr/bin", "VIRTUAL_HOST=app.local"];
        assert_eq!(virtual_host(&env), Some("app.local".to_string()));
    }

    #[test]
    fn test_virtual_host_missing() {
        let env = ["PATH=/usr/bin", "HOME=/root"];
        assert_eq!(virtual_host(&env), None);
        assert_eq!(virtual_host::<&str>(&[]), None);
    }

    #[test]
    fn test_virtual_host_first_match_wins() {
        let env = ["VIRTUAL_HOST=one.local", "VIRTUAL_HOST=two.local"];
        assert_eq!(virtual_host(&env), Some("one.local".to_string()));
    }

    #[test]
    fn test_virtual_host_stops_at_whitespace() {
        let env = ["VIRTUAL_HOST=a.local b.local"];
        assert_eq!(virtual_host(&env), Some("a.local".to_string()));
    }

    #[test]
    fn test_virtual_host_skips_empty_value() {
        let env = ["VIRTUAL_HOST=", "VIRTUAL_HOST=late.local"];
        assert_eq!(virtual_host(&env), Some("late.local".to_string()));
    }

    #[test]
    fn test_entry_requires_both_fields() {
        let mut view = ContainerView {
            id: "abc".into(),
            address: Some(Ipv4Addr::new(10, 0, 0, 5)),
            virtual_host: None,
        };
        assert_eq!(view.entry(), None);

        view.virtual_host = Some("app.local".into());
        assert_eq!(view.entry(), Some(("app.local", Ipv4Addr::new(10, 0, 0, 5))));

        view.address = None;
        assert_eq!(view.entry(), None);
    }
}
