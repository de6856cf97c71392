//! Placeholder names for unresolved addresses
//!
//! These names are cosmetic: they only tell the reader which memory region an
//! address falls into.

use super::parse_address;
use crate::config::{AddressBucket, FallbackConfig};

/// Synthesizes names from address ranges
#[derive(Debug, Clone, Default)]
pub struct FallbackNamer {
    config: FallbackConfig,
}

impl FallbackNamer {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Name for a code address whose symbol lookup failed
    pub fn function_name(&self, address: &str) -> String {
        Self::bucket_name(
            address,
            &self.config.function_buckets,
            &self.config.unknown_function_prefix,
        )
    }

    /// Name for a data address whose symbol lookup failed
    pub fn variable_name(&self, address: &str) -> String {
        Self::bucket_name(
            address,
            &self.config.variable_buckets,
            &self.config.unknown_variable_prefix,
        )
    }

    /// Name used when no map file is loaded at all
    pub fn unmapped_function_name(address: &str) -> String {
        format!("func_at_{}", address)
    }

    /// Name used when no map file is loaded at all
    pub fn unmapped_variable_name(address: &str) -> String {
        format!("param_at_{}", address)
    }

    fn bucket_name(address: &str, buckets: &[AddressBucket], unknown_prefix: &str) -> String {
        let Some(value) = parse_address(address) else {
            return format!("invalid_addr_{}", address);
        };

        let prefix = buckets
            .iter()
            .find(|bucket| bucket.contains(value))
            .map(|bucket| bucket.prefix.as_str())
            .unwrap_or(unknown_prefix);
        format!("{}{}", prefix, address)
    }
}
