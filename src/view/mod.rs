//! View module - the now-playing screen
//!
//! One full-screen layout: track metadata in the middle, progress bar and
//! control hints at the bottom, transient notices overlaid at the very
//! bottom edge. Full-screen status messages replace all of it.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use crate::model::{format_time, PlayerScreenState};
use crate::settings::AppSettings;

pub struct PlayerView;

impl PlayerView {
    pub fn render(frame: &mut Frame, state: &PlayerScreenState, settings: &AppSettings) {
        if let Some(message) = state.message {
            render_status_message(frame, message.text());
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Device line
                Constraint::Min(0),    // Track metadata
                Constraint::Length(3), // Progress bar
                Constraint::Length(1), // Controls / notice line
            ])
            .split(frame.area());

        render_device_line(frame, chunks[0], state);
        render_track_info(frame, chunks[1], state, settings);
        render_progress_bar(frame, chunks[2], state);

        if let Some((notice, _)) = &state.notice {
            let line = Paragraph::new(notice.as_str())
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center);
            frame.render_widget(line, chunks[3]);
        } else if state.controls_visible {
            render_control_hints(frame, chunks[3], state);
        }

        if state.volume_visible {
            render_volume_bar(frame, state);
        }
    }
}

fn render_status_message(frame: &mut Frame, text: &str) {
    let area = frame.area();
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(1),
            Constraint::Percentage(45),
        ])
        .split(area);
    let message = Paragraph::new(text)
        .style(Style::default().add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    frame.render_widget(message, vertical[1]);
}

fn render_device_line(frame: &mut Frame, area: Rect, state: &PlayerScreenState) {
    if state.device_name.is_empty() {
        return;
    }
    let device = Paragraph::new(format!("♪ {}", state.device_name))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Right);
    frame.render_widget(device, area);
}

fn render_track_info(
    frame: &mut Frame,
    area: Rect,
    state: &PlayerScreenState,
    settings: &AppSettings,
) {
    // Darken setting dims the secondary lines, matching how the touch UI
    // darkens the backdrop behind the text
    let secondary = if settings.darken_value >= 50 {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Gray)
    };

    let mut lines = vec![
        Line::from(Span::styled(
            state.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(state.artist_line.clone(), secondary)),
    ];
    if let Some(url) = &state.image_url {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("cover: {url}"), secondary)));
    }
    if let Some(url) = &state.artist_image_url {
        lines.push(Line::from(Span::styled(format!("artist: {url}"), secondary)));
    }

    let vertical_pad = area.height.saturating_sub(lines.len() as u16) / 2;
    let padded = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(vertical_pad), Constraint::Min(0)])
        .split(area);

    let info = Paragraph::new(lines).alignment(Alignment::Center);
    frame.render_widget(info, padded[1]);
}

fn render_progress_bar(frame: &mut Frame, area: Rect, state: &PlayerScreenState) {
    let shown_progress = state.display_progress_ms();
    let time_str = format!(
        "{} / {}",
        format_time(shown_progress),
        format_time(state.duration_ms)
    );

    let title = if state.seek_hold {
        " seeking ".to_string()
    } else if state.is_playing {
        " ▶ ".to_string()
    } else {
        " ⏸ ".to_string()
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(f64::from(state.progress_permille()) / 1000.0)
        .label(time_str);
    frame.render_widget(gauge, area);
}

fn render_control_hints(frame: &mut Frame, area: Rect, state: &PlayerScreenState) {
    let play = if state.is_playing { "pause" } else { "play" };
    let shuffle = if state.is_shuffle || state.is_smart_shuffle {
        "shuffle on"
    } else {
        "shuffle off"
    };
    let like = if state.is_liked { "♥" } else { "♡" };
    let hints = format!(
        " space: {play} | ←/→: track | ↑/↓: volume | s: {shuffle} | l: {like} | ,/.: seek | q: quit "
    );
    let line = Paragraph::new(hints)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(line, area);
}

fn render_volume_bar(frame: &mut Frame, state: &PlayerScreenState) {
    let area = frame.area();
    if area.height < 4 || area.width < 24 {
        return;
    }
    let bar_area = Rect {
        x: area.width / 4,
        y: 1,
        width: area.width / 2,
        height: 3,
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" volume "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::from(state.volume_percent))
        .label(format!("{}%", state.volume_percent));
    frame.render_widget(gauge, bar_area);
}
