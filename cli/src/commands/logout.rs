//! `rediacc logout`: end the server session and forget local credentials.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::auth;

/// Run the logout command.
///
/// # Errors
///
/// Returns an error only if local credentials cannot be removed.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let outcome = auth::logout(&app.gateway()).await?;
    app.renderer().render_logout(&outcome)?;
    Ok(ExitCode::SUCCESS)
}
