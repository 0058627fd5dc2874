use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::{
        canvas::{
            Canvas,
            Context,
            Line as CanvasLine,
            Points,
        },
        *,
    },
};
use roulette::{
    Country,
    CountryId,
};
use std::{
    collections::HashSet,
    io::stdout,
};
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

pub const DEFAULT_FILL: Color = Color::Rgb(0xE5, 0xE7, 0xEB);
pub const USED_FILL: Color = Color::Rgb(0xD4, 0xB4, 0x83);
pub const HIGHLIGHT_FILL: Color = Color::Rgb(0xFB, 0xBF, 0x24);
pub const SELECTED_FILL: Color = Color::Rgb(0x10, 0xB9, 0x81);

const SIDEBAR_WIDTH: u16 = 38;
const ACCENT: Color = Color::Rgb(0xFA, 0xCC, 0x15);
const MUTED: Color = Color::Rgb(0x9C, 0xA3, 0xAF);

pub type InputEventReceiver = EventStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Spin,
    Undo,
    ConfirmReset,
    Remove(CountryId),
    SetPredetermined(Option<CountryId>),
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    // newest first, as listed in the sidebar
    used: Vec<CountryId>,
    used_cursor: usize,
    eligible: Vec<(CountryId, String)>,
    spinning: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    ResetModal,
    PickerModal(PickerState),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct PickerState {
    filter: String,
    idx: usize,
}

/// Paint order of a country; later variants are drawn over earlier ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fill {
    Default,
    Used,
    Highlighted,
    Selected,
}

impl Fill {
    pub fn color(self) -> Color {
        match self {
            Fill::Default => DEFAULT_FILL,
            Fill::Used => USED_FILL,
            Fill::Highlighted => HIGHLIGHT_FILL,
            Fill::Selected => SELECTED_FILL,
        }
    }
}

pub fn fill_for(
    id: &CountryId,
    used: &HashSet<&CountryId>,
    highlight: &[CountryId],
    selection: Option<&CountryId>,
) -> Fill {
    if selection == Some(id) {
        Fill::Selected
    } else if highlight.contains(id) {
        Fill::Highlighted
    } else if used.contains(id) {
        Fill::Used
    } else {
        Fill::Default
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    // one persistent Terminal keeps the diffing buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    // keep what key handling needs between frames
    state.used = snap
        .catalog
        .resolve(snap.used)
        .into_iter()
        .rev()
        .map(|country| country.id.clone())
        .collect();
    state.used_cursor = state.used_cursor.min(state.used.len().saturating_sub(1));
    state.eligible = snap
        .catalog
        .eligible_countries(snap.used)
        .into_iter()
        .map(|country| (country.id, country.name))
        .collect();
    state.spinning = snap.is_spinning;
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => interpret_key(state, key),
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::ResetModal => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                state.mode = Mode::Normal;
                Some(UserEvent::ConfirmReset)
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::PickerModal(picker) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let chosen = picker_entries(&state.eligible, &picker.filter)
                    .get(picker.idx)
                    .copied()?;
                let id = chosen.map(|(id, _)| id.clone());
                state.mode = Mode::Normal;
                Some(UserEvent::SetPredetermined(id))
            }
            KeyCode::Up => {
                picker.idx = picker.idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down => {
                let len = picker_entries(&state.eligible, &picker.filter).len();
                if picker.idx + 1 < len {
                    picker.idx += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                picker.filter.pop();
                picker.idx = 0;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                picker.filter.push(c);
                picker.idx = 0;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match key.code {
            KeyCode::Char('q') => Some(UserEvent::Quit),
            KeyCode::Char(' ') => Some(UserEvent::Spin),
            KeyCode::Char('u') => Some(UserEvent::Undo),
            KeyCode::Char('r') => {
                if state.spinning || state.used.is_empty() {
                    return None;
                }
                state.mode = Mode::ResetModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('p') => {
                if state.spinning {
                    return None;
                }
                state.mode = Mode::PickerModal(PickerState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                state.used_cursor = state.used_cursor.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if state.used_cursor + 1 < state.used.len() {
                    state.used_cursor += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if state.spinning {
                    return None;
                }
                state.used.get(state.used_cursor).cloned().map(UserEvent::Remove)
            }
            _ => None,
        },
    }
}

/// Picker rows: a leading `None` for "random", then the eligible countries whose
/// name or id contains `filter`, ignoring case.
fn picker_entries<'a>(
    eligible: &'a [(CountryId, String)],
    filter: &str,
) -> Vec<Option<&'a (CountryId, String)>> {
    let needle = filter.to_lowercase();
    std::iter::once(None)
        .chain(
            eligible
                .iter()
                .filter(|(id, name)| {
                    needle.is_empty()
                        || name.to_lowercase().contains(&needle)
                        || id.as_str().to_lowercase().contains(&needle)
                })
                .map(Some),
        )
        .collect()
}

/// Cuts `text` to at most `width` terminal columns, marking the cut with an ellipsis.
pub fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn country_label(country: &Country) -> String {
    match country.flag() {
        Some(flag) => format!("{flag} {}", country.name),
        None => country.name.clone(),
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
        .split(f.area());

    draw_sidebar(f, state, chunks[0], snap);
    draw_map(f, chunks[1], snap);
    draw_modals(f, state, snap);
}

fn draw_sidebar(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let banner = if snap.all_used { 3 } else { 0 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),      // title
            Constraint::Length(6),      // current selection
            Constraint::Length(5),      // actions
            Constraint::Min(3),         // used list
            Constraint::Length(banner), // completion banner
            Constraint::Length(3),      // status
        ])
        .split(area);

    draw_title(f, rows[0]);
    draw_selection(f, rows[1], snap);
    draw_actions(f, rows[2], snap);
    draw_used_list(f, state, rows[3], snap);
    if snap.all_used {
        let p = Paragraph::new("🎊 You've visited all countries! 🎊")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::White).bg(SELECTED_FILL).bold())
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(p, rows[4]);
    }
    let status = Paragraph::new(snap.status)
        .style(Style::default().fg(MUTED))
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, rows[5]);
}

fn draw_title(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            "🌍 Country Roulette",
            Style::default().fg(ACCENT).bold(),
        )),
        Line::from(Span::styled(
            "Spin to explore the world, one country at a time!",
            Style::default().fg(MUTED),
        )),
    ];
    let p = Paragraph::new(lines).wrap(Wrap { trim: true });
    f.render_widget(p, area.inner(Margin::new(1, 0)));
}

fn draw_selection(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .title("CURRENT SELECTION");
    let inner_width = area.width.saturating_sub(2) as usize;
    let mut lines = Vec::new();
    match snap.selection {
        Some(country) => {
            lines.push(Line::from(Span::styled(
                fit_width(&country_label(country), inner_width),
                Style::default().fg(SELECTED_FILL).bold(),
            )));
            lines.push(Line::from(Span::styled(
                country.id.to_string(),
                Style::default().fg(MUTED),
            )));
        }
        None => {
            let prompt = if snap.is_spinning {
                "Spinning..."
            } else {
                "Press SPIN to start!"
            };
            lines.push(Line::from(Span::styled(
                prompt,
                Style::default().fg(MUTED).italic(),
            )));
        }
    }
    if let Some(next) = snap.predetermined {
        lines.push(Line::from(Span::styled(
            fit_width(&format!("next: {}", next.name), inner_width),
            Style::default().fg(Color::DarkGray),
        )));
    }
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(p, area);
}

fn draw_actions(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let (spin_label, spin_style) = if snap.all_used {
        ("🎉 ALL COMPLETE!", Style::default().fg(Color::DarkGray))
    } else if snap.is_spinning {
        ("🎰 SPINNING...", Style::default().fg(Color::DarkGray))
    } else {
        (
            "🎲 SPIN [space]",
            Style::default().fg(Color::Black).bg(ACCENT).bold(),
        )
    };
    let history_enabled = !snap.used.is_empty() && !snap.is_spinning;
    let history_style = if history_enabled {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let lines = vec![
        Line::from(Span::styled(spin_label, spin_style)),
        Line::from(vec![
            Span::styled("↶ UNDO LAST [u]", history_style),
            Span::raw("  "),
            Span::styled("🔄 RESET ALL [r]", history_style),
        ]),
        Line::from(Span::styled(
            "[p] pick next  [d] remove  [q] quit",
            Style::default().fg(MUTED),
        )),
    ];
    let p = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_used_list(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("USED COUNTRIES ({})", snap.used.len()));
    if state.used.is_empty() {
        let p = Paragraph::new(Span::styled(
            "No countries used yet",
            Style::default().fg(Color::DarkGray).italic(),
        ))
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(p, area);
        return;
    }
    let inner_width = area.width.saturating_sub(4) as usize;
    let items: Vec<ListItem> = state
        .used
        .iter()
        .filter_map(|id| snap.catalog.get(id))
        .map(|country| {
            let id_width = country.id.as_str().width() + 1;
            let label = fit_width(
                &country_label(country),
                inner_width.saturating_sub(id_width),
            );
            ListItem::new(Line::from(vec![
                Span::raw(label),
                Span::raw(" "),
                Span::styled(country.id.to_string(), Style::default().fg(MUTED)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_symbol("> ")
        .highlight_style(Style::default().fg(USED_FILL).bold());
    let mut list_state = ListState::default().with_selected(Some(state.used_cursor));
    f.render_stateful_widget(list, area, &mut list_state);
}

fn draw_map(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let used: HashSet<&CountryId> = snap.used.iter().collect();
    let selection = snap.selection.map(|country| &country.id);
    let mut outlines: Vec<_> = snap
        .catalog
        .outlines()
        .map(|(country, coordinates)| {
            let fill = fill_for(&country.id, &used, snap.highlight, selection);
            (fill, coordinates)
        })
        .collect();
    outlines.sort_by_key(|(fill, _)| *fill);
    let label = snap.selection.and_then(|country| {
        let centroid = snap.catalog.coordinates(&country.id)?.centroid()?;
        Some((centroid, country.name.clone()))
    });

    let (x_bounds, y_bounds) = snap.view.bounds();
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title("World"))
        .marker(symbols::Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(move |ctx| {
            for (fill, coordinates) in &outlines {
                for ring in coordinates.rings() {
                    draw_ring(ctx, &ring, fill.color());
                }
            }
            if let Some((centroid, name)) = &label {
                ctx.print(
                    centroid.lng,
                    centroid.lat,
                    Span::styled(name.clone(), Style::default().fg(SELECTED_FILL).bold()),
                );
            }
        });
    f.render_widget(canvas, area);
}

fn draw_ring(ctx: &mut Context, ring: &[roulette::Position], color: Color) {
    if let [point] = ring {
        ctx.draw(&Points {
            coords: &[(point.lng, point.lat)],
            color,
        });
        return;
    }
    for pair in ring.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        // segments that wrap around the antimeridian would streak across the map
        if (a.lng - b.lng).abs() > 180.0 {
            continue;
        }
        ctx.draw(&CanvasLine {
            x1: a.lng,
            y1: a.lat,
            x2: b.lng,
            y2: b.lat,
            color,
        });
    }
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::Normal => {}
        Mode::ResetModal => {
            let area = centered_rect(40, 25, f.area());
            let block = Block::default().borders(Borders::ALL).title("Reset all?");
            let p = Paragraph::new(format!(
                "This forgets all {} visited countries.\n\n[y] reset  [n] cancel",
                snap.used.len()
            ))
            .wrap(Wrap { trim: true });
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::PickerModal(picker) => {
            let area = centered_rect(50, 60, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Pick the next country");
            let inner = block.inner(area);
            f.render_widget(Clear, area);
            f.render_widget(block, area);

            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1),
                    Constraint::Min(1),
                    Constraint::Length(1),
                ])
                .split(inner);
            f.render_widget(
                Paragraph::new(format!("Filter: {}_", picker.filter)),
                rows[0],
            );
            let items: Vec<ListItem> = picker_entries(&state.eligible, &picker.filter)
                .into_iter()
                .map(|entry| match entry {
                    None => ListItem::new(Span::styled(
                        "(random)",
                        Style::default().fg(MUTED).italic(),
                    )),
                    Some((id, name)) => ListItem::new(format!("{name} ({id})")),
                })
                .collect();
            let list = List::new(items)
                .highlight_symbol("> ")
                .highlight_style(Style::default().fg(HIGHLIGHT_FILL).bold());
            let mut list_state = ListState::default().with_selected(Some(picker.idx));
            f.render_stateful_widget(list, rows[1], &mut list_state);
            f.render_widget(
                Paragraph::new("Enter=choose Esc=cancel type to filter")
                    .style(Style::default().fg(MUTED)),
                rows[2],
            );
        }
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
