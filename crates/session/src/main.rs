//! Command-line sign-in.
//!
//! Resumes the stored session if it is still accepted, otherwise signs in
//! with `SHOPFRONT_EMAIL` / `SHOPFRONT_PASSWORD` and asks for the second
//! factor on stdin when the account needs one.

use std::io::{self, BufRead, Write};

use anyhow::{Context, bail};

use shopfront_session::{AppState, ClientConfig, LoginOutcome, SessionError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shopfront_observability::init();

    let config = ClientConfig::from_env();
    let state = AppState::new(config)
        .await
        .context("failed to initialize session")?;

    match state.machine.validate_session().await {
        Ok(Some(identity)) => {
            println!("Signed in as {} ({})", identity.display_name(), identity.role);
            return Ok(());
        }
        Ok(None) => tracing::info!("no stored session"),
        Err(SessionError::SessionExpired(reason)) => {
            tracing::info!("stored session expired: {reason}");
        }
        Err(err) => return Err(err).context("failed to validate stored session"),
    }

    let email = std::env::var("SHOPFRONT_EMAIL").context("SHOPFRONT_EMAIL is not set")?;
    let password = std::env::var("SHOPFRONT_PASSWORD").context("SHOPFRONT_PASSWORD is not set")?;

    let mut outcome = state.machine.login(&email, &password).await?;
    while outcome == LoginOutcome::MfaRequired {
        let code = prompt("Authentication code: ")?;
        match state.machine.submit_mfa_code(&code).await {
            Ok(next) => outcome = next,
            Err(err @ (SessionError::InvalidMfaCode { .. } | SessionError::Validation(_))) => {
                eprintln!("{err}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let LoginOutcome::Authenticated { redirect_to } = outcome else {
        bail!("sign-in ended without a session");
    };

    match state.store.identity().await {
        Some(identity) => println!("Signed in as {} ({})", identity.display_name(), identity.role),
        None => println!("Signed in"),
    }
    println!("Continue at {redirect_to}");
    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stdout = io::stdout();
    stdout.write_all(label.as_bytes())?;
    stdout.flush()?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        bail!("stdin closed before a code was entered");
    }
    Ok(line.trim().to_string())
}
