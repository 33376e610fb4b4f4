//! `rediacc status`: show the local session without calling the server.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::auth;

/// Run the status command. Exits 1 when not authenticated.
///
/// # Errors
///
/// JSON serialization failures.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let status = auth::status(&app.credentials, None);
    app.renderer().render_status(&status)?;
    Ok(if status.authenticated {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
