use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use renda::{
    record::Record, tap_rate::MAX_EFFECT_LEVEL, FingerMode, ModeKind, Phase, SessionSnapshot, Side,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

fn mode_label(mode_kind: ModeKind) -> &'static str {
    match mode_kind {
        ModeKind::TimeAttack => "Time Attack",
        ModeKind::TapChallenge => "Tap Challenge",
    }
}

fn finger_label(finger_mode: FingerMode) -> &'static str {
    match finger_mode {
        FingerMode::One => "one finger",
        FingerMode::Two => "two fingers",
    }
}

fn effect_color(level: u8) -> Color {
    match level {
        5 => Color::Magenta,
        4 => Color::Red,
        3 => Color::Yellow,
        2 => Color::Green,
        _ => Color::DarkGray,
    }
}

fn banner(snap: &SessionSnapshot) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    match snap.phase {
        Phase::Ready => Line::from(vec![
            Span::styled("READY", bold),
            Span::styled("  press space to start", Style::default().add_modifier(Modifier::DIM)),
        ]),
        Phase::OnYourMark => Line::from(Span::styled("ON YOUR MARK", bold.fg(Color::Cyan))),
        Phase::Set => Line::from(Span::styled("SET", bold.fg(Color::Yellow))),
        Phase::Playing if snap.is_in_penalty => Line::from(Span::styled(
            format!("FALSE START  wait {:.1}s", snap.penalty_remaining.as_secs_f64()),
            bold.fg(Color::Red),
        )),
        Phase::Playing => Line::from(Span::styled("GO!", bold.fg(Color::Green))),
        Phase::Finished => Line::from(Span::styled("FINISHED", bold.fg(Color::Cyan))),
    }
}

fn progress(snap: &SessionSnapshot, target: i32) -> Line<'static> {
    let text = match snap.mode_kind {
        ModeKind::TimeAttack => format!(
            "Taps {} / {}   Time {:.2}s",
            snap.tap_count,
            target,
            snap.elapsed.as_secs_f64()
        ),
        ModeKind::TapChallenge => format!(
            "Taps {}   Left {:.1}s",
            snap.tap_count,
            snap.time_remaining.unwrap_or_default().as_secs_f64()
        ),
    };
    let mut spans = vec![Span::raw(text)];
    if snap.had_false_start {
        spans.push(Span::styled("  FALSE START", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

fn effect_meter(snap: &SessionSnapshot) -> Line<'static> {
    let filled = "▮".repeat(snap.effect_level as usize);
    let empty = "▯".repeat(MAX_EFFECT_LEVEL.saturating_sub(snap.effect_level) as usize);
    Line::from(vec![
        Span::raw("Power "),
        Span::styled(filled, Style::default().fg(effect_color(snap.effect_level))),
        Span::styled(empty, Style::default().fg(Color::DarkGray)),
        Span::raw(format!("  {:.1} taps/s", snap.tap_rate)),
    ])
}

fn side_buttons(snap: &SessionSnapshot) -> Line<'static> {
    let next = snap.last_tap_side.map(Side::opposite);
    let style_for = |side: Side| {
        if snap.invalid_tap_side == Some(side) {
            Style::default().fg(Color::White).bg(Color::Red)
        } else if snap.phase == Phase::Playing && next == Some(side) {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    Line::from(vec![
        Span::styled("[ F ]", style_for(Side::Left)),
        Span::raw("     "),
        Span::styled("[ J ]", style_for(Side::Right)),
    ])
}

fn history_line(record: &Record, mode_kind: ModeKind) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            record.date.format("%Y-%m-%d %H:%M").to_string(),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::raw("  "),
        Span::raw(record.display_value(mode_kind)),
    ];
    if record.had_false_start {
        spans.push(Span::styled(" (false start)", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snap = self.session.snapshot();
        let mode_kind = snap.mode_kind;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // title
                Constraint::Length(1),
                Constraint::Length(1), // banner
                Constraint::Length(1),
                Constraint::Length(1), // progress
                Constraint::Length(1), // effect
                Constraint::Length(1), // side buttons
                Constraint::Length(1),
                Constraint::Min(3),    // results / board
                Constraint::Length(1), // help
            ])
            .split(area);

        let best = self
            .best
            .as_ref()
            .map_or_else(|| "-".to_string(), |r| r.display_value(mode_kind));
        Paragraph::new(Line::from(vec![
            Span::styled(
                mode_label(mode_kind),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" · {}   best {}", finger_label(snap.finger_mode), best)),
        ]))
        .render(chunks[0], buf);

        Paragraph::new(banner(&snap))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        if matches!(snap.phase, Phase::Playing | Phase::Finished) {
            Paragraph::new(progress(&snap, self.session.config().time_attack_target))
                .alignment(Alignment::Center)
                .render(chunks[4], buf);
            Paragraph::new(effect_meter(&snap))
                .alignment(Alignment::Center)
                .render(chunks[5], buf);
        }

        if snap.finger_mode == FingerMode::Two {
            Paragraph::new(side_buttons(&snap))
                .alignment(Alignment::Center)
                .render(chunks[6], buf);
        }

        let mut board: Vec<Line> = Vec::new();
        if let (Phase::Finished, Some(record)) = (snap.phase, self.last_record.as_ref()) {
            let mut score = vec![Span::styled(
                format!("Score {}", record.display_value(mode_kind)),
                Style::default().add_modifier(Modifier::BOLD),
            )];
            if self.new_best {
                score.push(Span::styled(
                    "  NEW BEST",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ));
            }
            if snap.invalid_tap_count > 0 {
                score.push(Span::raw(format!("  ({} wrong-side taps)", snap.invalid_tap_count)));
            }
            board.push(Line::from(score));
            board.push(Line::default());
        }
        board.extend(self.history.iter().map(|r| history_line(r, mode_kind)));

        Paragraph::new(board)
            .block(Block::default().borders(Borders::TOP).title("Recent"))
            .render(chunks[8], buf);

        let help = match (snap.phase, snap.finger_mode) {
            (Phase::Ready, _) => "space start · esc quit",
            (Phase::Finished, _) => "r again · esc quit",
            (_, FingerMode::One) => "space tap · r restart · esc quit",
            (_, FingerMode::Two) => "f / j alternate · r restart · esc quit",
        };
        Paragraph::new(Span::styled(
            help,
            Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[9], buf);
    }
}
