use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use nanoid::nanoid;

use crate::config::Config;
use crate::economy::{
    Ledger, LedgerEntry, LedgerKind, MISSIONS, MissionStatus, Progress, UPGRADE_TIERS, UpgradeTier,
    format_idr, format_signed_idr,
};
use crate::model::{Role, User, WalletError, WalletState};
use crate::scheduler::{Scheduler, Task, TaskHandle};
use crate::storage::{KeyValueStore, Persistence};

pub const ACCRUAL_PERIOD: Duration = Duration::from_secs(1);
pub const READY_DELAY: Duration = Duration::from_millis(500);
pub const ADMIN_GRANT: f64 = 1.0;
const MAX_MESSAGES: usize = 5;
const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Dashboard,
    Mining,
    Shop,
    Wallet,
    Missions,
    Referral,
    Support,
    Admin,
}

const USER_TABS: &[Tab] = &[
    Tab::Dashboard,
    Tab::Mining,
    Tab::Shop,
    Tab::Wallet,
    Tab::Missions,
    Tab::Referral,
    Tab::Support,
];

const ADMIN_TABS: &[Tab] = &[
    Tab::Dashboard,
    Tab::Mining,
    Tab::Shop,
    Tab::Wallet,
    Tab::Missions,
    Tab::Referral,
    Tab::Support,
    Tab::Admin,
];

impl Tab {
    pub fn title(self) -> &'static str {
        match self {
            Tab::Dashboard => "Home",
            Tab::Mining => "Mine",
            Tab::Shop => "Shop",
            Tab::Wallet => "Wallet",
            Tab::Missions => "Missions",
            Tab::Referral => "Referral",
            Tab::Support => "Support",
            Tab::Admin => "Admin",
        }
    }

    pub fn available(role: Role) -> &'static [Tab] {
        match role {
            Role::Admin => ADMIN_TABS,
            Role::User => USER_TABS,
        }
    }

    fn from_digit(c: char) -> Option<Self> {
        let idx = c.to_digit(10)?.checked_sub(1)? as usize;
        ADMIN_TABS.get(idx).copied()
    }

    fn step(self, role: Role, forward: bool) -> Self {
        let tabs = Self::available(role);
        let idx = tabs.iter().position(|t| *t == self).unwrap_or(0);
        let next = if forward {
            (idx + 1) % tabs.len()
        } else {
            (idx + tabs.len() - 1) % tabs.len()
        };
        tabs[next]
    }
}

// Non-admins asking for the admin panel land on the dashboard.
pub fn route(tab: Tab, role: Role) -> Tab {
    match (tab, role) {
        (Tab::Admin, Role::Admin) => Tab::Admin,
        (Tab::Admin, _) => Tab::Dashboard,
        (tab, _) => tab,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Panel(Tab),
}

pub trait ReadyHook {
    fn mark_ready(&mut self);
}

pub struct HostReadyHook {
    ready_file: Option<PathBuf>,
}

impl HostReadyHook {
    pub fn new(ready_file: Option<PathBuf>) -> Self {
        Self { ready_file }
    }
}

impl ReadyHook for HostReadyHook {
    fn mark_ready(&mut self) {
        tracing::info!("IDR Minier: system mounted successfully");
        if let Some(path) = &self.ready_file {
            if let Err(err) = fs::write(path, Utc::now().to_rfc3339()) {
                tracing::error!(path = %path.display(), error = %err, "failed to write ready file");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    AwaitingFirstFrame,
    Scheduled(TaskHandle),
    Signalled,
}

#[derive(Debug, Default)]
pub struct LoginForm {
    pub name: String,
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub ticks: u64,
    pub claims: u32,
    pub logins: u32,
}

pub struct App {
    pub should_quit: bool,
    pub user: Option<User>,
    pub wallet: WalletState,
    pub progress: Progress,
    pub tab: Tab,
    pub login: LoginForm,
    pub shop_selected: usize,
    pub mission_selected: usize,
    pub ledger: Ledger,
    pub messages: VecDeque<String>,
    pub stats: SessionStats,
    pub storage_label: String,
    admin_name: String,
    persistence: Persistence,
    scheduler: Scheduler,
    accrual: Option<TaskHandle>,
    readiness: Readiness,
    ready_hook: Box<dyn ReadyHook>,
}

impl App {
    pub fn new(
        config: &Config,
        store: impl KeyValueStore + 'static,
        ready_hook: impl ReadyHook + 'static,
        now: Instant,
    ) -> Self {
        let persistence = Persistence::new(store);
        let user = persistence.load_user();
        let wallet = persistence.load_wallet(Utc::now().timestamp_millis());
        let progress = persistence.load_progress();

        let mut app = Self {
            should_quit: false,
            user: None,
            wallet,
            progress,
            tab: Tab::Dashboard,
            login: LoginForm::default(),
            shop_selected: 0,
            mission_selected: 0,
            ledger: Ledger::default(),
            messages: VecDeque::new(),
            stats: SessionStats::default(),
            storage_label: config.data_dir.display().to_string(),
            admin_name: config.admin_name.clone(),
            persistence,
            scheduler: Scheduler::new(),
            accrual: None,
            readiness: Readiness::AwaitingFirstFrame,
            ready_hook: Box::new(ready_hook),
        };
        if let Some(user) = user {
            tracing::info!(user_id = %user.id, "resuming saved session");
            app.login(user, now);
        }
        app
    }

    pub fn screen(&self) -> Screen {
        match &self.user {
            Some(user) => Screen::Panel(route(self.tab, user.role)),
            None => Screen::Login,
        }
    }

    pub fn accrual_active(&self) -> bool {
        self.accrual
            .is_some_and(|handle| self.scheduler.is_scheduled(handle))
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn login(&mut self, user: User, now: Instant) {
        tracing::info!(user_id = %user.id, role = ?user.role, "logged in");
        self.user = Some(user);
        if let Err(err) = self.persistence.save_user(self.user.as_ref()) {
            tracing::error!(error = %err, "failed to save user");
        }
        self.stats.logins += 1;
        self.start_accrual(now);
    }

    pub fn logout(&mut self) {
        self.stop_accrual();
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "logged out");
        }
        if let Err(err) = self.persistence.clear_user() {
            tracing::error!(error = %err, "failed to clear saved user");
        }
        self.tab = Tab::Dashboard;
        self.login = LoginForm::default();
    }

    fn start_accrual(&mut self, now: Instant) {
        self.stop_accrual();
        self.accrual = Some(
            self.scheduler
                .every(now, ACCRUAL_PERIOD, Task::AccrualTick),
        );
    }

    fn stop_accrual(&mut self) {
        if let Some(handle) = self.accrual.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn tick(&mut self) {
        if self.user.is_none() {
            return;
        }
        self.wallet.accrue();
        self.stats.ticks += 1;
        self.persist_wallet();
    }

    pub fn claim(&mut self, at: DateTime<Utc>) -> f64 {
        let amount = self.wallet.claim(at.timestamp_millis());
        self.persist_wallet();
        if amount > 0.0 {
            self.progress.claims += 1;
            self.stats.claims += 1;
            self.persist_progress();
            self.ledger
                .add_entry(LedgerEntry::new(LedgerKind::Claim, "mining claim", amount, at));
            tracing::info!(amount, balance = self.wallet.balance, "claimed");
            self.push_message(format!("Claimed {}", format_idr(amount)));
        } else {
            self.push_message("Nothing to claim yet");
        }
        amount
    }

    pub fn spend(&mut self, amount: f64) -> Result<(), WalletError> {
        self.wallet.spend(amount)?;
        self.persist_wallet();
        Ok(())
    }

    pub fn purchase(&mut self, tier: &UpgradeTier, at: DateTime<Utc>) -> Result<f64, WalletError> {
        let cost = tier.cost_for_next(self.progress.owned(tier));
        self.spend(cost)?;
        self.wallet.hashrate += tier.hashrate_bonus;
        self.persist_wallet();
        *self
            .progress
            .upgrades
            .entry(tier.name.to_string())
            .or_insert(0) += 1;
        self.persist_progress();
        self.ledger
            .add_entry(LedgerEntry::new(LedgerKind::Purchase, tier.name, -cost, at));
        tracing::info!(tier = tier.name, cost, hashrate = self.wallet.hashrate, "upgrade purchased");
        Ok(cost)
    }

    pub fn collect_mission(&mut self, idx: usize, at: DateTime<Utc>) -> Option<f64> {
        let mission = MISSIONS.get(idx)?;
        if mission.status(&self.wallet, &self.progress) != MissionStatus::Ready {
            return None;
        }
        self.wallet.credit(mission.reward).ok()?;
        self.persist_wallet();
        self.progress.collected.insert(mission.id.to_string());
        self.persist_progress();
        self.ledger.add_entry(LedgerEntry::new(
            LedgerKind::MissionReward,
            mission.title,
            mission.reward,
            at,
        ));
        tracing::info!(mission = mission.id, reward = mission.reward, "mission collected");
        Some(mission.reward)
    }

    pub fn grant(&mut self, amount: f64, at: DateTime<Utc>) -> bool {
        if !self.user.as_ref().is_some_and(User::is_admin) {
            return false;
        }
        if self.wallet.credit(amount).is_err() {
            return false;
        }
        self.persist_wallet();
        self.ledger
            .add_entry(LedgerEntry::new(LedgerKind::AdminGrant, "test credit", amount, at));
        tracing::info!(amount, "admin grant");
        true
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
        if self.screen() == Screen::Panel(Tab::Referral) && !self.progress.referral_visited {
            self.progress.referral_visited = true;
            self.persist_progress();
        }
    }

    pub fn on_frame_rendered(&mut self, now: Instant) {
        if self.readiness == Readiness::AwaitingFirstFrame {
            let handle = self.scheduler.once(now, READY_DELAY, Task::ReadySignal);
            self.readiness = Readiness::Scheduled(handle);
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        for (handle, task) in self.scheduler.due(now) {
            match task {
                Task::AccrualTick => {
                    if self.accrual == Some(handle) {
                        self.tick();
                    }
                }
                Task::ReadySignal => {
                    if self.readiness == Readiness::Scheduled(handle) {
                        self.readiness = Readiness::Signalled;
                        self.ready_hook.mark_ready();
                    }
                }
            }
        }
    }

    fn persist_wallet(&mut self) {
        if let Err(err) = self.persistence.save_wallet(&self.wallet) {
            tracing::error!(error = %err, "failed to save wallet");
        }
    }

    fn persist_progress(&mut self) {
        if let Err(err) = self.persistence.save_progress(&self.progress) {
            tracing::error!(error = %err, "failed to save progress");
        }
    }

    fn push_message(&mut self, msg: impl Into<String>) {
        self.messages.push_front(msg.into());
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_back();
        }
    }

    pub fn submit_login(&mut self, now: Instant) -> bool {
        let name = self.login.name.trim().to_string();
        if name.is_empty() {
            self.login.error = Some("Enter a miner name to continue".to_string());
            return false;
        }
        let role = if name.eq_ignore_ascii_case(&self.admin_name) {
            Role::Admin
        } else {
            Role::User
        };
        let user = User::new(nanoid!(), name, role);
        self.login = LoginForm::default();
        self.tab = Tab::Dashboard;
        self.login(user, now);
        self.push_message("Welcome back, miner");
        true
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        let Some(role) = self.user.as_ref().map(|u| u.role) else {
            self.handle_login_input(key, now);
            return;
        };

        match key.code {
            KeyCode::Char('q' | 'Q') => self.should_quit = true,
            KeyCode::Char('x' | 'X') => {
                self.logout();
                self.push_message("Logged out");
            }
            KeyCode::Tab => self.select_tab(self.tab.step(role, true)),
            KeyCode::BackTab => self.select_tab(self.tab.step(role, false)),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if let Some(tab) = Tab::from_digit(c) {
                    self.select_tab(tab);
                }
            }
            _ => match route(self.tab, role) {
                Tab::Dashboard => self.handle_dashboard_input(key),
                Tab::Mining => self.handle_mining_input(key),
                Tab::Shop => self.handle_shop_input(key),
                Tab::Wallet => self.handle_wallet_input(key),
                Tab::Missions => self.handle_missions_input(key),
                Tab::Admin => self.handle_admin_input(key),
                Tab::Referral | Tab::Support => {}
            },
        }
    }

    fn handle_login_input(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                self.submit_login(now);
            }
            KeyCode::Backspace => {
                self.login.name.pop();
            }
            KeyCode::Char(c) if !c.is_control() => {
                if self.login.name.chars().count() < MAX_NAME_LEN {
                    self.login.name.push(c);
                    self.login.error = None;
                }
            }
            _ => {}
        }
    }

    fn handle_dashboard_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter | KeyCode::Char('m') => self.select_tab(Tab::Mining),
            KeyCode::Char('s') => self.select_tab(Tab::Shop),
            KeyCode::Char('c') => {
                self.claim(Utc::now());
            }
            _ => {}
        }
    }

    fn handle_mining_input(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Enter | KeyCode::Char('c')) {
            self.claim(Utc::now());
        }
    }

    fn handle_shop_input(&mut self, key: KeyEvent) {
        let len = UPGRADE_TIERS.len();
        match key.code {
            KeyCode::Up => self.shop_selected = (self.shop_selected + len - 1) % len,
            KeyCode::Down => self.shop_selected = (self.shop_selected + 1) % len,
            KeyCode::Enter => {
                let tier = &UPGRADE_TIERS[self.shop_selected];
                match self.purchase(tier, Utc::now()) {
                    Ok(cost) => {
                        self.push_message(format!("Purchased {} for {}", tier.name, format_idr(cost)))
                    }
                    Err(err) => self.push_message(format!("Cannot buy {}: {}", tier.name, err)),
                }
            }
            _ => {}
        }
    }

    fn handle_wallet_input(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.ledger.scroll_up(),
            KeyCode::Down => self.ledger.scroll_down(),
            _ => {}
        }
    }

    fn handle_missions_input(&mut self, key: KeyEvent) {
        let len = MISSIONS.len();
        match key.code {
            KeyCode::Up => self.mission_selected = (self.mission_selected + len - 1) % len,
            KeyCode::Down => self.mission_selected = (self.mission_selected + 1) % len,
            KeyCode::Enter => match self.collect_mission(self.mission_selected, Utc::now()) {
                Some(reward) => self.push_message(format!(
                    "Mission complete: {} IDR",
                    format_signed_idr(reward)
                )),
                None => self.push_message("Mission not ready"),
            },
            _ => {}
        }
    }

    fn handle_admin_input(&mut self, key: KeyEvent) {
        if matches!(key.code, KeyCode::Char('g' | 'G')) && self.grant(ADMIN_GRANT, Utc::now()) {
            self.push_message(format!("Granted {}", format_idr(ADMIN_GRANT)));
        }
    }
}
