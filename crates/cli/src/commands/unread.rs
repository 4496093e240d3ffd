//! `support-chat unread`: refresh the unread summary.

use support_chat_client::{ChatBackend, ClientConfig, ClientError, HttpBackend};

use crate::render;

/// Fetch the backend's unread summary, store it locally and print it.
///
/// Counters for admins that are no longer listed are dropped.
pub async fn refresh(config: &ClientConfig) -> Result<(), ClientError> {
    let backend = HttpBackend::new(config)?;
    let (admins, mut summary) = tokio::try_join!(backend.list_admins(), backend.unread_summary())?;
    summary.retain_known(&admins);

    let mut ledger = super::open_ledger(config);
    ledger.replace(summary)?;
    tracing::info!(
        admins = ledger.counts().len(),
        total = ledger.counts().total(),
        "Unread summary stored"
    );

    #[allow(clippy::print_stdout)]
    {
        print!("{}", render::unread_summary(&admins, ledger.counts()));
    }
    Ok(())
}
