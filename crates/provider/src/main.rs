//! Bulk Submit Provider
//!
//! Serves the provider API that drives Bulk Data Submit exchanges with a
//! destination FHIR server.

use clap::Parser;
use helios_submit::{NewManifest, NewSubmission, Submission};
use helios_submit_rest::{AppState, ServerConfig, create_app_with_state, init_logging};
use tracing::info;

/// Id of the submission created by `--seed-example`.
const EXAMPLE_SUBMISSION_ID: &str = "example-submission";

/// Registers an example submission with three manifests hosted by this server.
fn seed_example(state: &AppState) -> anyhow::Result<()> {
    let config = state.config();
    let base_url = config.base_url.trim_end_matches('/');

    let submission = Submission::with_id(
        EXAMPLE_SUBMISSION_ID,
        NewSubmission::new(config.example_destination.clone())
            .with_name("Example Bulk Submission"),
    );
    for n in 1..=3 {
        submission.add_manifest(NewManifest::new(
            format!("{base_url}/api/manifests/{n}"),
            base_url,
        ))?;
    }
    state.store().save(submission);

    info!(
        submission_id = EXAMPLE_SUBMISSION_ID,
        destination = %config.example_destination,
        "Seeded example submission"
    );
    Ok(())
}

/// Starts the Axum HTTP server.
async fn serve(app: axum::Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr = config.socket_addr();
    info!(address = %addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        port = config.port,
        host = %config.host,
        base_url = %config.base_url,
        "Starting Bulk Submit provider"
    );

    let state = AppState::from_config(config.clone())?;
    if config.seed_example {
        seed_example(&state)?;
    }

    let app = create_app_with_state(state);
    serve(app, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_example() {
        let config = ServerConfig {
            base_url: "http://localhost:4000/".to_string(),
            seed_example: true,
            ..ServerConfig::for_testing()
        };
        let state = AppState::from_config(config).unwrap();

        seed_example(&state).unwrap();

        let submission = state.submission(EXAMPLE_SUBMISSION_ID).unwrap();
        assert_eq!(submission.name(), "Example Bulk Submission");
        assert_eq!(submission.destination_base_url(), "http://localhost:3333");
        let manifests = submission.manifests();
        assert_eq!(manifests.len(), 3);
        assert_eq!(
            manifests[2].manifest_url,
            "http://localhost:4000/api/manifests/3"
        );
        assert_eq!(manifests[0].fhir_base_url, "http://localhost:4000");
    }
}
