//! Clear command

use anyhow::Result;
use tracing::info;

use super::Session;
use crate::stages::lock;

/// Handle the clear command
pub fn handle_clear_command(session: Session) -> Result<()> {
    let removed = std::mem::take(&mut lock(&session.registry).jobs).len();
    info!("Clearing {} jobs", removed);
    session.save()
}
