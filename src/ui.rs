use chrono::{Local, TimeZone};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::{App, Readiness, Screen, Tab};
use crate::economy::{
    LedgerEntry, MISSIONS, MissionStatus, UPGRADE_TIERS, format_hashrate, format_idr,
    format_signed_idr, referral_code,
};
use crate::model::{BASE_MINING_RATE, Role};

const GOLD: Color = Color::Yellow;

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let area = f.size();
    match app.screen() {
        Screen::Login => draw_login(f, area, app),
        Screen::Panel(panel) => draw_session(f, area, app, panel),
    }
}

fn draw_session(f: &mut Frame<'_>, area: Rect, app: &App, panel: Tab) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(area);

    draw_header(f, chunks[0], app);
    let body = chunks[1];
    match panel {
        Tab::Dashboard => draw_dashboard(f, body, app),
        Tab::Mining => draw_mining(f, body, app),
        Tab::Shop => draw_shop(f, body, app),
        Tab::Wallet => draw_wallet(f, body, app),
        Tab::Missions => draw_missions(f, body, app),
        Tab::Referral => draw_referral(f, body, app),
        Tab::Support => draw_support(f, body),
        Tab::Admin => draw_admin(f, body, app),
    }
    draw_nav(f, chunks[2], app, panel);
    draw_feed(f, chunks[3], app);
}

fn draw_login(f: &mut Frame<'_>, area: Rect, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(9),
            Constraint::Min(0),
        ])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(50),
            Constraint::Percentage(25),
        ])
        .split(rows[1]);

    let block = pane_block("IDR MINIER");
    f.render_widget(block.clone(), cols[1]);
    let inner = block.inner(cols[1]);

    let mut lines = vec![
        Line::from(Span::styled(
            "Sign in to start mining",
            Style::default().fg(Color::Gray),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Miner name ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}_", app.login.name),
                Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
    ];
    match &app.login.error {
        Some(err) => lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        ))),
        None => lines.push(Line::from(Span::styled(
            format!("Wallet on this device: {}", format_idr(app.wallet.balance)),
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::from("Enter sign in | Esc quit"));

    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(paragraph, inner);
}

fn draw_header(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    let (name, role) = app
        .user
        .as_ref()
        .map(|u| (u.name.as_str(), u.role))
        .unwrap_or(("", Role::User));
    let mut title = vec![
        Span::styled(
            "⛏ IDR MINIER",
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(name.to_string(), Style::default().fg(Color::Gray)),
    ];
    if role == Role::Admin {
        title.push(Span::styled(" [admin]", Style::default().fg(Color::Red)));
    }
    f.render_widget(Paragraph::new(Line::from(title)), columns[0]);

    let balance = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{:.4}", app.wallet.balance),
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" IDR  "),
        Span::styled("[X] logout", Style::default().fg(Color::Red)),
    ]))
    .alignment(Alignment::Right);
    f.render_widget(balance, columns[1]);
}

fn draw_dashboard(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Dashboard");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let wallet = &app.wallet;
    let lines = vec![
        stat_line("Balance ", format_idr(wallet.balance), GOLD),
        stat_line(
            "Pending ",
            format_idr(wallet.accumulated_mined()),
            Color::LightGreen,
        ),
        stat_line("Hashrate ", format_hashrate(wallet.hashrate), Color::LightCyan),
        stat_line(
            "Daily yield ",
            format!("{}/day", format_idr(wallet.daily_yield())),
            Color::White,
        ),
        stat_line(
            "Last claim ",
            format_epoch_ms(wallet.last_claim_time()),
            Color::Gray,
        ),
        Line::from(""),
        Line::from("Enter/M open miner  |  C claim  |  S shop"),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_mining(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Mining");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    let segments = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let wallet = &app.wallet;
    let daily = wallet.daily_yield();
    let ratio = if daily > 0.0 {
        (wallet.accumulated_mined() / daily).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let status = if app.accrual_active() { "Mining" } else { "Idle" };
    let gauge = Gauge::default()
        .block(Block::default().title(format!("{status} toward one day of yield")))
        .ratio(ratio)
        .gauge_style(
            Style::default()
                .fg(Color::Green)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(format!("{:.8} IDR", wallet.accumulated_mined()));
    f.render_widget(gauge, segments[0]);

    let lines = vec![
        stat_line(
            "Rate ",
            format!("{:.8} IDR/s", wallet.rate_per_tick()),
            Color::LightGreen,
        ),
        stat_line("Hashrate ", format_hashrate(wallet.hashrate), Color::LightCyan),
        stat_line("Balance ", format_idr(wallet.balance), GOLD),
        Line::from(""),
        Line::from("Enter/C claim pending IDR into your balance"),
    ];
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }),
        segments[1],
    );
}

fn draw_shop(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Hardware Shop");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    let segments = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(0)])
        .split(inner);

    let header = Paragraph::new(Line::from(vec![
        Span::styled("Hashrate ", Style::default().fg(Color::Gray)),
        Span::styled(
            format_hashrate(app.wallet.hashrate),
            Style::default().fg(Color::LightGreen),
        ),
        Span::raw("  |  Balance "),
        Span::styled(format_idr(app.wallet.balance), Style::default().fg(GOLD)),
    ]));
    f.render_widget(header, segments[0]);

    let items: Vec<ListItem> = UPGRADE_TIERS
        .iter()
        .map(|tier| {
            let owned = app.progress.owned(tier);
            let cost = tier.cost_for_next(owned);
            let affordable = app.wallet.balance + 1e-9 >= cost;
            let content = Line::from(vec![
                Span::styled(
                    format!("{:>2}×", owned),
                    Style::default().fg(if owned > 0 {
                        Color::LightGreen
                    } else {
                        Color::DarkGray
                    }),
                ),
                Span::raw(" "),
                Span::styled(
                    format!("{:<14}", tier.name),
                    Style::default().fg(Color::White),
                ),
                Span::raw(format!(" +{:.2} H/s", tier.hashrate_bonus)),
                Span::raw("  price:"),
                Span::styled(
                    format!(" {:.4}", cost),
                    Style::default().fg(if affordable { GOLD } else { Color::Red }),
                ),
            ]);
            ListItem::new(vec![content])
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::NONE))
        .highlight_style(Style::default().fg(GOLD).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(app.shop_selected));
    f.render_stateful_widget(list, segments[1], &mut state);
}

fn draw_wallet(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Wallet");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    let segments = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(inner);

    let wallet = &app.wallet;
    let summary = vec![
        stat_line("Settled ", format_idr(wallet.balance), GOLD),
        stat_line(
            "Unclaimed ",
            format_idr(wallet.accumulated_mined()),
            Color::LightGreen,
        ),
        stat_line(
            "Last claim ",
            format_epoch_ms(wallet.last_claim_time()),
            Color::Gray,
        ),
    ];
    f.render_widget(Paragraph::new(summary), segments[0]);

    let ledger_block = Block::default()
        .title("Session ledger")
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(ledger_block.clone(), segments[1]);
    let ledger_area = ledger_block.inner(segments[1]);

    if app.ledger.entries.is_empty() {
        let paragraph = Paragraph::new("No activity yet. Claims and purchases show up here.")
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, ledger_area);
        return;
    }

    let visible_height = ledger_area.height as usize;
    let start = app.ledger.scroll.min(app.ledger.entries.len());
    let end = (start + visible_height).min(app.ledger.entries.len());
    let items: Vec<ListItem> = app.ledger.entries[start..end]
        .iter()
        .map(build_ledger_item)
        .collect();
    f.render_widget(List::new(items), ledger_area);
}

fn build_ledger_item(entry: &LedgerEntry) -> ListItem<'static> {
    let timestamp = entry.at_local().format("%H:%M:%S");
    let amount_color = if entry.amount >= 0.0 {
        Color::LightGreen
    } else {
        Color::Red
    };
    let line = Line::from(vec![
        Span::styled(timestamp.to_string(), Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(entry.id.clone(), Style::default().fg(Color::LightCyan)),
        Span::raw("  "),
        Span::styled(
            format!("{:<8}", entry.kind.label()),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format_signed_idr(entry.amount),
            Style::default().fg(amount_color),
        ),
        Span::raw("  "),
        Span::styled(entry.note.clone(), Style::default().fg(Color::DarkGray)),
    ]);
    ListItem::new(vec![line])
}

fn draw_missions(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Missions");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let items: Vec<ListItem> = MISSIONS
        .iter()
        .map(|mission| {
            let (mark, color) = match mission.status(&app.wallet, &app.progress) {
                MissionStatus::InProgress => ("·", Color::DarkGray),
                MissionStatus::Ready => ("!", GOLD),
                MissionStatus::Collected => ("✓", Color::LightGreen),
            };
            let content = Line::from(vec![
                Span::styled(format!("{mark} "), Style::default().fg(color)),
                Span::styled(
                    format!("{:<30}", mission.title),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{} IDR", format_signed_idr(mission.reward)),
                    Style::default().fg(Color::LightCyan),
                ),
            ]);
            ListItem::new(vec![content])
        })
        .collect();

    let list = List::new(items)
        .highlight_style(Style::default().fg(GOLD).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default();
    state.select(Some(app.mission_selected));
    f.render_stateful_widget(list, inner, &mut state);
}

fn draw_referral(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Referral");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let code = app
        .user
        .as_ref()
        .map(referral_code)
        .unwrap_or_default();
    let lines = vec![
        Line::from(Span::styled(
            "Your invite code",
            Style::default().fg(Color::Gray),
        )),
        Line::from(Span::styled(
            code,
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Share it with friends. Codes carry a checksum so typos are caught."),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_support(f: &mut Frame<'_>, area: Rect) {
    let block = pane_block("Support");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let lines = vec![
        Line::from(Span::styled("How mining works", Style::default().fg(GOLD))),
        Line::from(format!(
            "Every second you are signed in, hashrate × {BASE_MINING_RATE} / 86400 IDR is added to your pending amount."
        )),
        Line::from("Claim on the Mine tab to move pending IDR into your balance."),
        Line::from("Mining only advances while this app is running; paused or suspended time is not counted."),
        Line::from(""),
        Line::from(Span::styled("Upgrades", Style::default().fg(GOLD))),
        Line::from("Each purchase raises your hashrate. Prices rise 15% per unit owned."),
        Line::from(""),
        Line::from(Span::styled("Signing out", Style::default().fg(GOLD))),
        Line::from("Your wallet stays on this device and resumes at next sign in."),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_admin(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Admin");
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let ready = match app.readiness() {
        Readiness::AwaitingFirstFrame => "waiting for first frame",
        Readiness::Scheduled(_) => "scheduled",
        Readiness::Signalled => "signalled",
    };
    let user_id = app.user.as_ref().map(|u| u.id.clone()).unwrap_or_default();
    let lines = vec![
        stat_line("User id ", user_id, Color::LightCyan),
        stat_line("Data dir ", app.storage_label.clone(), Color::White),
        stat_line(
            "Accrual ",
            (if app.accrual_active() { "running" } else { "stopped" }).to_string(),
            Color::LightGreen,
        ),
        stat_line("Ticks ", app.stats.ticks.to_string(), Color::White),
        stat_line("Claims ", app.stats.claims.to_string(), Color::White),
        stat_line("Logins ", app.stats.logins.to_string(), Color::White),
        stat_line("Ready ", ready.to_string(), Color::White),
        Line::from(""),
        Line::from("G grant 1.0000 IDR test credit"),
    ];
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner);
}

fn draw_nav(f: &mut Frame<'_>, area: Rect, app: &App, panel: Tab) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let role = app.user.as_ref().map(|u| u.role).unwrap_or(Role::User);

    let mut spans = Vec::new();
    for (idx, tab) in Tab::available(role).iter().enumerate() {
        let style = if *tab == panel {
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("{} {}", idx + 1, tab.title()), style));
        spans.push(Span::raw("   "));
    }
    let paragraph = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    f.render_widget(block.clone(), area);
    f.render_widget(paragraph, block.inner(area));
}

fn draw_feed(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Feed")
        .border_style(Style::default().fg(Color::Gray));
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(inner);

    let instruction_lines = vec![
        Line::from("Tab/1-8 switch panel | Q quit"),
        Line::from("↑↓ select  Enter confirm"),
    ];
    f.render_widget(
        Paragraph::new(instruction_lines).wrap(Wrap { trim: true }),
        columns[0],
    );

    let mut message_lines: Vec<Line> = app
        .messages
        .iter()
        .take(inner.height as usize)
        .map(|msg| Line::from(Span::raw(msg.clone())))
        .collect();
    if message_lines.is_empty() {
        message_lines.push(Line::from(Span::styled(
            "Rigs humming...",
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(
        Paragraph::new(message_lines).wrap(Wrap { trim: true }),
        columns[1],
    );
}

fn stat_line(label: &'static str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn format_epoch_ms(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "unknown".to_string(),
    }
}

fn pane_block(title: &str) -> Block<'_> {
    Block::default()
        .title(Span::styled(title, Style::default().fg(Color::White)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(GOLD).add_modifier(Modifier::BOLD))
}
