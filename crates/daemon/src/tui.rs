use std::collections::VecDeque;

use oscvars::{BoundState, Mode};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::monitor::{GroupInfo, MonitorStats};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn color(self) -> Color {
        match self {
            LogLevel::Info => Color::White,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

pub struct TuiState {
    selected: usize,
    log: VecDeque<(LogLevel, String)>,
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            selected: 0,
            log: VecDeque::new(),
        }
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        if self.log.len() >= MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, message));
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push_log(LogLevel::Error, message.into());
    }

    pub fn select_prev(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.selected = self.selected.min(count - 1).saturating_sub(1);
    }

    pub fn select_next(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.selected = (self.selected + 1).min(count - 1);
    }

    pub fn selected<'a>(&self, groups: &'a [GroupInfo]) -> Option<&'a GroupInfo> {
        groups.get(self.selected.min(groups.len().saturating_sub(1)))
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &MonitorStats, groups: &[GroupInfo]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(groups.len().clamp(1, 10) as u16 + 3),
            Constraint::Min(6),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_groups(frame, chunks[1], state, groups);
    render_variables(frame, chunks[2], state.selected(groups));
    render_log(frame, chunks[3], state);
    render_help(frame, chunks[4]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &MonitorStats) {
    let title = format!(" OSC Variables - Uptime: {} ", format_duration(stats.uptime_secs));

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let net = &stats.network;
    let text = format!(
        "Tick: {}  |  Groups: {} ({} bound)  |  Kinds: {}  |  Applied: {}  |  {} sent / {} recv",
        stats.tick,
        stats.group_count,
        stats.bound_count,
        stats.schema_kinds,
        stats.applied_total,
        format_bytes(net.bytes_sent),
        format_bytes(net.bytes_received)
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_groups(frame: &mut Frame, area: Rect, state: &TuiState, groups: &[GroupInfo]) {
    let block = Block::default()
        .title(" Groups ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let header = Row::new(["Name", "Mode", "Endpoint", "State", "Vars", "Packets", "Errors"])
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));

    let rows = groups.iter().map(|g| {
        let state_color = match g.state {
            BoundState::Bound => Color::Green,
            BoundState::BindFailed => Color::Red,
            BoundState::Unbound => Color::DarkGray,
        };
        let packets = match g.mode {
            Mode::Sender => format!("{} sent", g.stats.packets_sent),
            Mode::Receiver => format!("{} recv", g.stats.packets_received),
        };
        Row::new([
            Cell::from(g.name.clone()),
            Cell::from(g.mode.label()),
            Cell::from(g.endpoint.clone()),
            Cell::from(g.state.as_str()).style(Style::default().fg(state_color)),
            Cell::from(g.variables.len().to_string()),
            Cell::from(packets),
            Cell::from((g.stats.decode_errors + g.stats.send_errors).to_string()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(20),
            Constraint::Length(9),
            Constraint::Percentage(25),
            Constraint::Length(11),
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("> ");

    let mut table_state = TableState::default();
    if !groups.is_empty() {
        table_state.select(Some(state.selected.min(groups.len() - 1)));
    }
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn render_variables(frame: &mut Frame, area: Rect, group: Option<&GroupInfo>) {
    let title = match group {
        Some(g) => format!(" Variables: {} ", g.name),
        None => String::from(" Variables "),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let Some(group) = group else {
        let text = Paragraph::new("No groups loaded")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(text, area);
        return;
    };

    let lines: Vec<Line> = group
        .variables
        .iter()
        .map(|v| {
            Line::from(vec![
                Span::styled(format!("{:<20}", v.name), Style::default().fg(Color::White)),
                Span::styled(format!("{:<11}", v.kind), Style::default().fg(Color::Gray)),
                Span::styled(format!("{:<30}", v.value), Style::default().fg(Color::Cyan)),
                Span::styled(v.bounds.clone(), Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|(level, message)| {
            Line::from(Span::styled(message.clone(), Style::default().fg(level.color())))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new(
        "q/ESC quit  |  Up/Down select  |  s save  |  l reload  |  r reset connection  |  e resend",
    )
    .block(block)
    .style(
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_stays_in_range() {
        let mut state = TuiState::new();
        state.select_next(2);
        state.select_next(2);
        assert_eq!(state.selected, 1);
        state.select_prev(2);
        state.select_prev(2);
        assert_eq!(state.selected, 0);
        state.select_next(0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn log_is_bounded() {
        let mut state = TuiState::new();
        for i in 0..MAX_LOG_LINES + 5 {
            state.log_info(format!("line {}", i));
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().map(|(_, m)| m.as_str()), Some("line 5"));
    }

    #[test]
    fn formatting() {
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
    }
}
