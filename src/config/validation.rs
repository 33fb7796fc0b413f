//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (tiers > 0, addresses parse)
//! - Catch placeholders left in security-sensitive fields
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a valid socket address")]
    InvalidBindAddress(String),
    #[error("observability.metrics_address {0:?} is not a valid socket address")]
    InvalidMetricsAddress(String),
    #[error("rate_limit tier {0} must be greater than zero")]
    ZeroRateTier(&'static str),
    #[error("rate_limit.idle_cutoff_secs must be greater than zero")]
    ZeroIdleCutoff,
    #[error("signing is enabled but signing.secret is empty")]
    EmptySigningSecret,
    #[error("ip_whitelist is enabled but ip_whitelist.ips is empty")]
    EmptyWhitelist,
    #[error("admin is enabled but admin.api_key is missing or a placeholder")]
    PlaceholderAdminKey,
    #[error("auth token for user {0} is empty")]
    EmptyAuthToken(i64),
}

/// Check everything serde cannot. Collects every problem instead of stopping
/// at the first.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let tiers = &config.rate_limit.tiers;
    for (name, value) in [
        ("anonymous", tiers.anonymous),
        ("user", tiers.user),
        ("shop_admin", tiers.shop_admin),
        ("admin", tiers.admin),
        ("uploads", tiers.uploads),
        ("auth", tiers.auth),
        ("messaging", tiers.messaging),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroRateTier(name));
        }
    }
    if config.rate_limit.idle_cutoff_secs == 0 {
        errors.push(ValidationError::ZeroIdleCutoff);
    }

    if config.signing.enabled && config.signing.secret.is_empty() {
        errors.push(ValidationError::EmptySigningSecret);
    }

    if config.ip_whitelist.enabled && config.ip_whitelist.ips.is_empty() {
        errors.push(ValidationError::EmptyWhitelist);
    }

    if config.admin.enabled
        && (config.admin.api_key.is_empty() || config.admin.api_key == "CHANGE_ME_IN_PRODUCTION")
    {
        errors.push(ValidationError::PlaceholderAdminKey);
    }

    for entry in &config.auth.tokens {
        if entry.token.is_empty() {
            errors.push(ValidationError::EmptyAuthToken(entry.user_id));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.signing.enabled = true; // secret left empty
        config.rate_limit.tiers.user = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidBindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::EmptySigningSecret));
        assert!(errors.contains(&ValidationError::ZeroRateTier("user")));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_admin_placeholder_key_rejected() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PlaceholderAdminKey]);

        config.admin.api_key = "real-key".into();
        assert!(validate_config(&config).is_ok());
    }
}
