//! Sharing resolution: who should see each album.
//!
//! The effective source for a rule, first match wins:
//!
//! 1. the rule's own `share_with` (an empty list is meaningful: it pins
//!    the album private no matter what the globals say);
//! 2. the deployment's explicit share email list;
//! 3. the deployment's share-with-all flag;
//! 4. nothing — album sharing is never touched.
//!
//! The user directory is fetched once per cycle. When that fetch fails,
//! sharing degrades for the whole cycle with a warning instead of failing
//! any rule.

use std::collections::BTreeSet;

use tracing::warn;

use album_catalog::{Catalog, UserInfo};
use album_config::ShareWith;

/// Deployment-wide sharing defaults, from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSharing {
    /// Share every album with every other user.
    pub share_all: bool,
    /// Share every album with these users (emails). Takes precedence over
    /// `share_all` when non-empty.
    pub share_users: Vec<String>,
}

/// Per-cycle sharing resolver: the user directory plus the owner identity,
/// resolved once and consulted per rule.
pub struct ShareResolver {
    global: GlobalSharing,
    /// `None` when the directory could not be fetched this cycle.
    directory: Option<Directory>,
}

struct Directory {
    users: Vec<UserInfo>,
    owner_id: String,
}

impl ShareResolver {
    /// Fetch the user directory and owner identity. Failures degrade to a
    /// resolver that never shares, with one warning.
    pub fn build(catalog: &dyn Catalog, global: GlobalSharing) -> Self {
        let directory = match (catalog.list_users(), catalog.current_user()) {
            (Ok(users), Ok(owner)) => Some(Directory {
                users,
                owner_id: owner.id,
            }),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "user directory unavailable; album sharing disabled this cycle");
                None
            }
        };
        Self { global, directory }
    }

    /// Resolve one rule's effective viewer set.
    ///
    /// `None` means "leave the album's sharing alone"; `Some(empty)` means
    /// "actively unshare". `album_owner` is excluded from every result,
    /// falling back to the API key's user when the catalog did not report
    /// an owner.
    pub fn resolve(
        &self,
        rule_share: Option<&ShareWith>,
        album_owner: Option<&str>,
    ) -> Option<BTreeSet<String>> {
        let effective = match rule_share {
            Some(share) => share.clone(),
            None if !self.global.share_users.is_empty() => {
                ShareWith::Users(self.global.share_users.clone())
            }
            None if self.global.share_all => ShareWith::All,
            None => return None,
        };

        let Some(directory) = &self.directory else {
            // Sharing is configured but we have nobody to resolve against.
            return None;
        };
        let owner = album_owner.unwrap_or(&directory.owner_id);

        let resolved = match effective {
            ShareWith::All => directory
                .users
                .iter()
                .filter(|user| user.id != owner)
                .map(|user| user.id.clone())
                .collect(),
            ShareWith::Users(emails) => {
                let mut ids = BTreeSet::new();
                for email in &emails {
                    match directory
                        .users
                        .iter()
                        .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
                    {
                        Some(user) if user.id == owner => {}
                        Some(user) => {
                            ids.insert(user.id.clone());
                        }
                        None => {
                            warn!(email = %email, "share target not found in user directory; skipping");
                        }
                    }
                }
                ids
            }
        };
        Some(resolved)
    }
}
