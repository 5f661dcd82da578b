//! Subscriber setup.

use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingConfig};

use super::ObservabilityError;

/// Dependencies that are chatty at `info` and below.
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest", "sqlx"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

pub(super) fn init_subscriber(config: &LoggingConfig) -> Result<(), ObservabilityError> {
    tracing_subscriber::registry()
        .with(output_layer(config.log_format))
        .with(filter(&config.log_level))
        .try_init()?;

    Ok(())
}

fn output_layer(format: LogFormat) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_target(true);

    match format {
        LogFormat::Compact => layer
            .compact()
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
    }
}

/// `RUST_LOG` wins when it parses; otherwise the configured level with dependencies held at warn.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_unset| EnvFilter::new(directives(level)))
}

fn directives(level: &str) -> String {
    QUIET_TARGETS
        .iter()
        .fold(level.to_string(), |acc, target| format!("{acc},{target}=warn"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_held_at_warn() {
        let rendered = directives("debug");

        assert!(rendered.starts_with("debug,"), "level leads: {rendered}");

        for target in QUIET_TARGETS {
            assert!(
                rendered.contains(&format!("{target}=warn")),
                "{target} missing from {rendered}"
            );
        }
    }
}
