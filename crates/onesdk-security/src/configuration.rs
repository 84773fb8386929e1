// SPDX-License-Identifier: MIT OR Apache-2.0

//! Combines a declared scheme with resolved values into something a
//! [`crate::SecurityHandler`] can act on, and implements the overlay rule
//! (caller values override super-configuration values of the same id).

use std::collections::BTreeMap;

use onesdk_error::BindError;

use crate::scheme::SecurityScheme;
use crate::values::SecurityValues;

#[derive(Debug, Clone)]
pub struct SecurityConfiguration {
    pub scheme: SecurityScheme,
    pub values: SecurityValues,
}

/// Overlay `overrides` onto `base`, keyed by security configuration id;
/// entries in `overrides` win outright over same-id entries in `base`.
pub fn overlay_values(
    base: Vec<SecurityValues>,
    overrides: Vec<SecurityValues>,
) -> Vec<SecurityValues> {
    let mut by_id: BTreeMap<String, SecurityValues> = base
        .into_iter()
        .map(|v| (v.id().to_string(), v))
        .collect();
    for value in overrides {
        by_id.insert(value.id().to_string(), value);
    }
    by_id.into_values().collect()
}

/// Match resolved values against declared schemes, producing the set of
/// usable [`SecurityConfiguration`]s. Every value must reference a known
/// scheme and satisfy that scheme's required keys.
pub fn resolve(
    schemes: &[SecurityScheme],
    values: Vec<SecurityValues>,
) -> Result<Vec<SecurityConfiguration>, BindError> {
    let mut resolved = Vec::with_capacity(values.len());
    for value in values {
        let scheme = schemes
            .iter()
            .find(|s| s.id() == value.id())
            .ok_or_else(|| BindError::SecurityNotFound {
                id: value.id().to_string(),
            })?;
        if !value.is_structurally_valid() {
            return Err(BindError::InvalidSecurityValues {
                reason: format!("security values for '{}' are missing required fields", value.id()),
            });
        }
        resolved.push(SecurityConfiguration {
            scheme: scheme.clone(),
            values: value,
        });
    }
    Ok(resolved)
}
