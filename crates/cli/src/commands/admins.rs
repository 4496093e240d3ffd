//! `support-chat admins`: list admins with unread badges.

use support_chat_client::{ChatBackend, ClientConfig, ClientError, HttpBackend};
use support_chat_core::filter_admins;

use crate::render;

/// Fetch and print the admin list, filtered by `search` when given.
pub async fn list(config: &ClientConfig, search: Option<&str>) -> Result<(), ClientError> {
    let backend = HttpBackend::new(config)?;
    let admins = backend.list_admins().await?;
    let term = search.unwrap_or_default();
    let filtered = filter_admins(&admins, term);
    tracing::debug!(total = admins.len(), shown = filtered.len(), "Admins fetched");

    let ledger = super::open_ledger(config);
    #[allow(clippy::print_stdout)]
    {
        print!("{}", render::admin_list(&filtered, ledger.counts(), term));
    }
    Ok(())
}
