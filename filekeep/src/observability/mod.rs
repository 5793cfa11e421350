//! Structured logging
//!
//! `RUST_LOG` overrides the default filter. Debug builds log in a pretty
//! human-readable format, release builds log JSON lines.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
#[must_use]
pub const fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "debug,filekeep=trace,tower_http=debug,hyper=info,reqwest=info"
    } else {
        "info,tower_http=info"
    }
}

/// Initialize logging
///
/// # Errors
///
/// Returns error if a global subscriber is already installed
///
/// # Example
///
/// ```rust,no_run
/// use filekeep::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives()));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?;
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        assert!(EnvFilter::try_new(default_directives()).is_ok());
    }
}
