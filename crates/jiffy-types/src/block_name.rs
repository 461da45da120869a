//! Block naming (spec.md §6 "Block naming").
//!
//! `host:service_port:mgmt_port:notif_port:chain_port:slot_index`, or the
//! sentinel `"nil"` meaning "no next link" (tail).

use std::fmt::{self, Display};

/// A parsed block name. Grounded on `block_name_parser` as referenced from
/// `original_source/.../chain_module.h`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BlockName {
    pub host: String,
    pub service_port: u16,
    pub mgmt_port: u16,
    pub notif_port: u16,
    pub chain_port: u16,
    pub slot_index: u32,
}

impl BlockName {
    pub fn new(
        host: impl Into<String>,
        service_port: u16,
        mgmt_port: u16,
        notif_port: u16,
        chain_port: u16,
        slot_index: u32,
    ) -> Self {
        Self {
            host: host.into(),
            service_port,
            mgmt_port,
            notif_port,
            chain_port,
            slot_index,
        }
    }

    /// Parses a block name, or `None` for the `"nil"` sentinel.
    pub fn parse(s: &str) -> Result<Option<Self>, BlockNameError> {
        if s == "nil" {
            return Ok(None);
        }
        let parts: Vec<&str> = s.split(':').collect();
        let [host, service_port, mgmt_port, notif_port, chain_port, slot_index] = parts
            .as_slice()
        else {
            return Err(BlockNameError::Malformed(s.to_string()));
        };
        let parse_port = |p: &str| {
            p.parse::<u16>()
                .map_err(|_| BlockNameError::Malformed(s.to_string()))
        };
        Ok(Some(Self {
            host: (*host).to_string(),
            service_port: parse_port(service_port)?,
            mgmt_port: parse_port(mgmt_port)?,
            notif_port: parse_port(notif_port)?,
            chain_port: parse_port(chain_port)?,
            slot_index: slot_index
                .parse()
                .map_err(|_| BlockNameError::Malformed(s.to_string()))?,
        }))
    }

    /// Renders `None` as the `"nil"` sentinel, `Some(name)` as its wire form.
    pub fn render(name: Option<&BlockName>) -> String {
        match name {
            Some(n) => n.to_string(),
            None => "nil".to_string(),
        }
    }
}

impl Display for BlockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            self.host, self.service_port, self.mgmt_port, self.notif_port, self.chain_port,
            self.slot_index
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockNameError {
    #[error("malformed block name: {0:?}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_parses_to_none() {
        assert_eq!(BlockName::parse("nil").unwrap(), None);
    }

    #[test]
    fn round_trips_through_display() {
        let name = BlockName::new("10.0.0.1", 9090, 9091, 9092, 9093, 4);
        let parsed = BlockName::parse(&name.to_string()).unwrap().unwrap();
        assert_eq!(name, parsed);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(BlockName::parse("host:1:2:3").is_err());
    }

    #[test]
    fn render_none_is_nil() {
        assert_eq!(BlockName::render(None), "nil");
    }
}
