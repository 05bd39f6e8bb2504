//! Renders a container snapshot into dnsmasq configuration.
//!
//! Each eligible container becomes one `address=/<host>/<ip>` line, which
//! makes dnsmasq answer queries for `<host>` (and its subdomains) with the
//! container's address. Containers without both a virtual host and an
//! address are skipped.

use std::fmt;

use crate::types::ContainerSnapshot;

/// The rendered contents of the dnsmasq config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    text: String,
    entries: usize,
}

impl ConfigDocument {
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Number of `address=` lines.
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn render(snapshot: &ContainerSnapshot) -> ConfigDocument {
    let mut doc = ConfigDocument::default();
    for (host, ip) in snapshot.iter().filter_map(|view| view.entry()) {
        doc.text.push_str(&format!("address=/{host}/{ip}\n"));
        doc.entries += 1;
    }
    doc
}
