//! `rediacc login`: exchange email and password for a session credential.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use zeroize::Zeroizing;

use crate::app::AppContext;
use crate::application::services::auth;
use crate::output::progress;

/// Arguments for the login command.
#[derive(Args)]
pub struct LoginArgs {
    /// Account email (prompted when omitted)
    #[arg(long, short)]
    pub email: Option<String>,

    /// Account password (prompted when omitted)
    #[arg(long, env = "REDIACC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Run the login command.
///
/// # Errors
///
/// Prompt failures and authentication errors.
pub async fn run(app: &AppContext, args: LoginArgs) -> Result<ExitCode> {
    let email = match args.email {
        Some(email) => email,
        None => dialoguer::Input::<String>::new()
            .with_prompt("Email")
            .interact_text()
            .context("reading email")?,
    };
    let password = Zeroizing::new(match args.password {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()
            .context("reading password")?,
    });

    let pb = progress::spinner_if(app.show_progress(), "Authenticating...");
    let gateway = app.gateway();
    match auth::login(&gateway, email.trim(), &password).await {
        Ok(identity) => {
            pb.finish_and_clear();
            app.renderer().render_login(&identity)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            progress::finish_error(&pb);
            Err(e.into())
        }
    }
}
