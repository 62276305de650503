//! Section identifiers and their static properties.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Twice `timeout`, saturating at [`Duration::MAX`].
pub(crate) const fn doubled(timeout: Duration) -> Duration {
    timeout.saturating_mul(2)
}

/// A named slice of remote character data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Assets in all locations.
    Assets,
    /// Character attributes.
    Attributes,
    /// Contracts.
    Contracts,
    /// Active implants.
    Implants,
    /// Industry jobs.
    IndustryJobs,
    /// Jump clones.
    JumpClones,
    /// Current location.
    Location,
    /// Mail labels.
    MailLabels,
    /// Mailing lists.
    MailLists,
    /// Mail headers.
    Mails,
    /// Notifications.
    Notifications,
    /// Online status.
    Online,
    /// Planetary colonies.
    Planets,
    /// Corporation roles.
    Roles,
    /// Current ship.
    Ship,
    /// Skill queue.
    Skillqueue,
    /// Trained skills.
    Skills,
    /// Wallet balance.
    WalletBalance,
    /// Wallet journal.
    WalletJournal,
    /// Wallet transactions.
    WalletTransactions,
}

impl Section {
    /// All sections, in identifier order.
    pub const ALL: [Self; 20] = [
        Self::Assets,
        Self::Attributes,
        Self::Contracts,
        Self::Implants,
        Self::IndustryJobs,
        Self::JumpClones,
        Self::Location,
        Self::MailLabels,
        Self::MailLists,
        Self::Mails,
        Self::Notifications,
        Self::Online,
        Self::Planets,
        Self::Roles,
        Self::Ship,
        Self::Skillqueue,
        Self::Skills,
        Self::WalletBalance,
        Self::WalletJournal,
        Self::WalletTransactions,
    ];

    /// Stable identifier used in storage and dedup keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Attributes => "attributes",
            Self::Contracts => "contracts",
            Self::Implants => "implants",
            Self::IndustryJobs => "industry_jobs",
            Self::JumpClones => "jump_clones",
            Self::Location => "location",
            Self::MailLabels => "mail_labels",
            Self::MailLists => "mail_lists",
            Self::Mails => "mails",
            Self::Notifications => "notifications",
            Self::Online => "online",
            Self::Planets => "planets",
            Self::Roles => "roles",
            Self::Ship => "ship",
            Self::Skillqueue => "skillqueue",
            Self::Skills => "skills",
            Self::WalletBalance => "wallet_balance",
            Self::WalletJournal => "wallet_journal",
            Self::WalletTransactions => "wallet_transactions",
        }
    }

    /// Human readable name, e.g. "Wallet Journal".
    #[must_use]
    pub fn display_name(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Time after which the data of this section becomes stale.
    #[must_use]
    pub const fn timeout(self) -> Duration {
        Duration::from_secs(self.timeout_secs() as u64)
    }

    /// [`Section::timeout`] as a calendar duration.
    #[must_use]
    pub fn timeout_delta(self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.timeout_secs()))
    }

    const fn timeout_secs(self) -> u32 {
        match self {
            Self::MailLabels | Self::Mails => 60,
            Self::Attributes
            | Self::Implants
            | Self::JumpClones
            | Self::MailLists
            | Self::Skillqueue
            | Self::Skills
            | Self::WalletBalance => 120,
            Self::Contracts
            | Self::IndustryJobs
            | Self::Location
            | Self::Online
            | Self::Ship => 300,
            Self::Notifications | Self::Planets => 600,
            Self::Assets | Self::Roles | Self::WalletJournal | Self::WalletTransactions => 3600,
        }
    }

    /// Twice the timeout. Data older than this is critically outdated.
    #[must_use]
    pub const fn doubled_timeout(self) -> Duration {
        doubled(self.timeout())
    }

    /// SSO scopes a token needs to fetch this section.
    #[must_use]
    pub const fn scopes(self) -> &'static [&'static str] {
        match self {
            Self::Assets => &["esi-assets.read_assets.v1", "esi-universe.read_structures.v1"],
            Self::Attributes | Self::Skills => &["esi-skills.read_skills.v1"],
            Self::Contracts => &[
                "esi-contracts.read_character_contracts.v1",
                "esi-universe.read_structures.v1",
            ],
            Self::Implants => &["esi-clones.read_implants.v1"],
            Self::IndustryJobs => &[
                "esi-industry.read_character_jobs.v1",
                "esi-universe.read_structures.v1",
            ],
            Self::JumpClones => &["esi-clones.read_clones.v1", "esi-universe.read_structures.v1"],
            Self::Location => &[
                "esi-location.read_location.v1",
                "esi-universe.read_structures.v1",
            ],
            Self::MailLabels | Self::MailLists => &["esi-mail.read_mail.v1"],
            Self::Mails => &["esi-mail.organize_mail.v1", "esi-mail.read_mail.v1"],
            Self::Notifications => &[
                "esi-characters.read_notifications.v1",
                "esi-universe.read_structures.v1",
            ],
            Self::Online => &["esi-location.read_online.v1"],
            Self::Planets => &["esi-planets.manage_planets.v1"],
            Self::Roles => &["esi-characters.read_corporation_roles.v1"],
            Self::Ship => &["esi-location.read_ship_type.v1"],
            Self::Skillqueue => &["esi-skills.read_skillqueue.v1"],
            Self::WalletBalance | Self::WalletJournal => &["esi-wallet.read_character_wallet.v1"],
            Self::WalletTransactions => &[
                "esi-wallet.read_character_wallet.v1",
                "esi-universe.read_structures.v1",
            ],
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| Error::UnknownSection(s.to_string()))
    }
}
