use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Local, Utc};
use nanoid::nanoid;
use serde::{Deserialize, Serialize};

use crate::model::{User, WalletState};

pub const NANO_ALPHABET: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
const PRICE_GROWTH: f64 = 1.15;
const REFERRAL_BODY_LEN: usize = 6;

/// Counters that outlive a session, stored next to the wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Progress {
    pub claims: u32,
    pub upgrades: BTreeMap<String, u32>,
    pub referral_visited: bool,
    pub collected: BTreeSet<String>,
}

impl Progress {
    pub fn owned(&self, tier: &UpgradeTier) -> u32 {
        self.upgrades.get(tier.name).copied().unwrap_or(0)
    }

    pub fn total_upgrades(&self) -> u32 {
        self.upgrades.values().sum()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UpgradeTier {
    pub name: &'static str,
    pub base_cost: f64,
    pub hashrate_bonus: f64,
}

impl UpgradeTier {
    pub fn cost_for_next(&self, owned: u32) -> f64 {
        self.base_cost * PRICE_GROWTH.powi(owned as i32)
    }
}

pub const UPGRADE_TIERS: &[UpgradeTier] = &[
    UpgradeTier {
        name: "Overclock Kit",
        base_cost: 0.5,
        hashrate_bonus: 0.25,
    },
    UpgradeTier {
        name: "GPU Rig",
        base_cost: 2.0,
        hashrate_bonus: 1.0,
    },
    UpgradeTier {
        name: "ASIC Miner",
        base_cost: 9.0,
        hashrate_bonus: 5.0,
    },
    UpgradeTier {
        name: "Mining Farm",
        base_cost: 40.0,
        hashrate_bonus: 25.0,
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissionGoal {
    Claims(u32),
    Upgrades(u32),
    Hashrate(f64),
    Balance(f64),
    VisitReferral,
}

#[derive(Debug, Clone, Copy)]
pub struct Mission {
    pub id: &'static str,
    pub title: &'static str,
    pub reward: f64,
    pub goal: MissionGoal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    InProgress,
    Ready,
    Collected,
}

pub const MISSIONS: &[Mission] = &[
    Mission {
        id: "first_claim",
        title: "Claim your first mined IDR",
        reward: 0.05,
        goal: MissionGoal::Claims(1),
    },
    Mission {
        id: "steady_hands",
        title: "Claim five times",
        reward: 0.2,
        goal: MissionGoal::Claims(5),
    },
    Mission {
        id: "first_upgrade",
        title: "Buy any hardware upgrade",
        reward: 0.1,
        goal: MissionGoal::Upgrades(1),
    },
    Mission {
        id: "double_rate",
        title: "Reach a hashrate of 2.0",
        reward: 0.3,
        goal: MissionGoal::Hashrate(2.0),
    },
    Mission {
        id: "saver",
        title: "Hold a balance of 5 IDR",
        reward: 0.5,
        goal: MissionGoal::Balance(5.0),
    },
    Mission {
        id: "share_code",
        title: "Open the referral page",
        reward: 0.02,
        goal: MissionGoal::VisitReferral,
    },
];

impl Mission {
    pub fn goal_met(&self, wallet: &WalletState, progress: &Progress) -> bool {
        match self.goal {
            MissionGoal::Claims(n) => progress.claims >= n,
            MissionGoal::Upgrades(n) => progress.total_upgrades() >= n,
            MissionGoal::Hashrate(h) => wallet.hashrate + 1e-9 >= h,
            MissionGoal::Balance(b) => wallet.balance + 1e-9 >= b,
            MissionGoal::VisitReferral => progress.referral_visited,
        }
    }

    pub fn status(&self, wallet: &WalletState, progress: &Progress) -> MissionStatus {
        if progress.collected.contains(self.id) {
            MissionStatus::Collected
        } else if self.goal_met(wallet, progress) {
            MissionStatus::Ready
        } else {
            MissionStatus::InProgress
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerKind {
    Claim,
    Purchase,
    MissionReward,
    AdminGrant,
}

impl LedgerKind {
    pub fn label(self) -> &'static str {
        match self {
            LedgerKind::Claim => "claim",
            LedgerKind::Purchase => "purchase",
            LedgerKind::MissionReward => "mission",
            LedgerKind::AdminGrant => "grant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub id: String,
    pub kind: LedgerKind,
    pub note: String,
    /// Signed change to the settled balance.
    pub amount: f64,
    pub at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(kind: LedgerKind, note: impl Into<String>, amount: f64, at: DateTime<Utc>) -> Self {
        Self {
            id: nanoid!(8, NANO_ALPHABET),
            kind,
            note: note.into(),
            amount,
            at,
        }
    }

    pub fn at_local(&self) -> DateTime<Local> {
        self.at.with_timezone(&Local)
    }
}

/// Session-only activity log, newest first.
#[derive(Debug, Default)]
pub struct Ledger {
    pub entries: Vec<LedgerEntry>,
    pub scroll: usize,
}

impl Ledger {
    pub fn add_entry(&mut self, entry: LedgerEntry) {
        self.entries.insert(0, entry);
    }

    pub fn scroll_up(&mut self) {
        if self.scroll > 0 {
            self.scroll -= 1;
        }
    }

    pub fn scroll_down(&mut self) {
        if self.scroll + 1 < self.entries.len() {
            self.scroll += 1;
        }
    }
}

/// Stable referral code for a user: `IDR-XXXXXX-C`, where the body comes from
/// a digest of the user id and `C` is a checksum nibble over the rest.
pub fn referral_code(user: &User) -> String {
    let digest = blake3::hash(user.id.as_bytes());
    let body: String = digest.as_bytes()[..REFERRAL_BODY_LEN]
        .iter()
        .map(|byte| NANO_ALPHABET[*byte as usize % NANO_ALPHABET.len()])
        .collect();
    let code_core = format!("IDR-{body}");
    let hash = blake3::hash(code_core.as_bytes());
    let nibble = (hash.as_bytes()[0] >> 4) as u32;
    let checksum = std::char::from_digit(nibble, 16)
        .unwrap_or('0')
        .to_ascii_uppercase();
    format!("{}-{}", code_core, checksum)
}

pub fn format_idr(amount: f64) -> String {
    format!("{:.4} IDR", amount)
}

pub fn format_signed_idr(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+{:.4}", amount)
    } else {
        format!("{:.4}", amount)
    }
}

pub fn format_hashrate(hashrate: f64) -> String {
    const UNITS: [&str; 4] = ["H/s", "kH/s", "MH/s", "GH/s"];
    let mut value = hashrate;
    let mut idx = 0usize;
    while value >= 1000.0 && idx + 1 < UNITS.len() {
        value /= 1000.0;
        idx += 1;
    }
    format!("{:.2} {}", value, UNITS[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    #[test]
    fn upgrade_prices_grow_geometrically() {
        let tier = UPGRADE_TIERS[1];
        assert_eq!(tier.cost_for_next(0), 2.0);
        assert!((tier.cost_for_next(2) - 2.0 * 1.15 * 1.15).abs() < 1e-12);
    }

    #[test]
    fn mission_status_tracks_goal_and_collection() {
        let wallet = WalletState::new(1.0, 1.0, 0);
        let mut progress = Progress::default();
        let first_claim = MISSIONS[0];

        assert_eq!(
            first_claim.status(&wallet, &progress),
            MissionStatus::InProgress
        );
        progress.claims = 1;
        assert_eq!(first_claim.status(&wallet, &progress), MissionStatus::Ready);
        progress.collected.insert(first_claim.id.to_string());
        assert_eq!(
            first_claim.status(&wallet, &progress),
            MissionStatus::Collected
        );
    }

    #[test]
    fn wallet_goals_read_current_wallet() {
        let progress = Progress::default();
        let saver = MISSIONS.iter().find(|m| m.id == "saver").unwrap();
        let double = MISSIONS.iter().find(|m| m.id == "double_rate").unwrap();

        assert!(!saver.goal_met(&WalletState::new(4.9, 1.0, 0), &progress));
        assert!(saver.goal_met(&WalletState::new(5.0, 1.0, 0), &progress));
        assert!(double.goal_met(&WalletState::new(0.0, 2.0, 0), &progress));
    }

    #[test]
    fn referral_code_is_stable_and_checksummed() {
        let user = User::new("V1StGXR8_Z5jdHi6B-myT", "dewi", Role::User);
        let code = referral_code(&user);
        assert_eq!(code, referral_code(&user));
        assert!(code.starts_with("IDR-"));
        assert_eq!(code.len(), "IDR-".len() + REFERRAL_BODY_LEN + 2);
        let (core, checksum) = code.rsplit_once('-').unwrap();
        let nibble = blake3::hash(core.as_bytes()).as_bytes()[0] >> 4;
        assert_eq!(checksum, format!("{:X}", nibble));

        let other = User::new("another-id", "dewi", Role::User);
        assert_ne!(referral_code(&other), code);
    }

    #[test]
    fn progress_tolerates_missing_fields() {
        let progress: Progress = serde_json::from_str(r#"{"claims":3}"#).unwrap();
        assert_eq!(progress.claims, 3);
        assert!(progress.collected.is_empty());
    }

    #[test]
    fn ledger_scroll_is_bounded() {
        let mut ledger = Ledger::default();
        ledger.scroll_down();
        assert_eq!(ledger.scroll, 0);
        for _ in 0..3 {
            ledger.add_entry(LedgerEntry::new(LedgerKind::Claim, "claim", 0.1, Utc::now()));
        }
        for _ in 0..5 {
            ledger.scroll_down();
        }
        assert_eq!(ledger.scroll, 2);
        ledger.scroll_up();
        assert_eq!(ledger.scroll, 1);
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_idr(1.0), "1.0000 IDR");
        assert_eq!(format_signed_idr(0.5), "+0.5000");
        assert_eq!(format_signed_idr(-0.5), "-0.5000");
        assert_eq!(format_hashrate(1500.0), "1.50 kH/s");
    }
}
