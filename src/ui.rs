use crate::cli::Session;
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use deadfire_order::{
    load_order::DisplayItem,
    reorder::{Container, HoverPoint},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Padding, Paragraph},
};
use std::{
    io,
    time::{Duration, Instant},
};
use tracing::info;

const COLUMNS: [Container; 2] = [Container::Enabled, Container::Disabled];

#[derive(Clone)]
struct Theme {
    accent: Color,
    accent_soft: Color,
    border: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    header_bg: Color,
}

impl Theme {
    fn new() -> Self {
        Self {
            accent: Color::Rgb(120, 190, 255),
            accent_soft: Color::Rgb(70, 110, 160),
            border: Color::Rgb(65, 75, 90),
            text: Color::Rgb(220, 230, 240),
            muted: Color::Rgb(135, 145, 155),
            success: Color::Rgb(120, 220, 140),
            warning: Color::Rgb(230, 200, 120),
            error: Color::Rgb(235, 100, 95),
            header_bg: Color::Rgb(22, 28, 36),
        }
    }

    fn panel(&self, title: String, focused: bool) -> Block<'static> {
        let border = if focused { self.accent_soft } else { self.border };
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border))
            .title(Span::styled(
                title,
                Style::default()
                    .fg(self.accent)
                    .add_modifier(Modifier::BOLD),
            ))
            .padding(Padding {
                left: 1,
                right: 1,
                top: 0,
                bottom: 0,
            })
    }
}

/// Screen-side state; the lists themselves live in the editor.
struct View {
    focus: Container,
    selected: [usize; 2],
    /// Inner list areas and scroll offsets from the last frame, for hit tests.
    areas: [Rect; 2],
    offsets: [usize; 2],
    status: String,
    status_is_error: bool,
    should_quit: bool,
}

impl View {
    fn new() -> Self {
        Self {
            focus: Container::Enabled,
            selected: [0, 0],
            areas: [Rect::default(); 2],
            offsets: [0, 0],
            status: "Ready".to_string(),
            status_is_error: false,
            should_quit: false,
        }
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.status_is_error = false;
    }

    fn set_error(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.status_is_error = true;
    }

    fn selected(&self, container: Container) -> usize {
        self.selected[slot(container)]
    }

    fn select(&mut self, container: Container, index: usize) {
        self.focus = container;
        self.selected[slot(container)] = index;
    }

    fn clamp_selection(&mut self, session: &Session) {
        let lists = session.extension.editor().lists();
        for container in COLUMNS {
            let len = lists.get(container).len();
            let selected = &mut self.selected[slot(container)];
            *selected = (*selected).min(len.saturating_sub(1));
        }
    }

    /// Column and row under the pointer, if it is inside a list.
    fn hit(&self, column: u16, row: u16) -> Option<(Container, usize, Rect)> {
        COLUMNS.into_iter().find_map(|container| {
            let area = self.areas[slot(container)];
            let inside = column >= area.x
                && column < area.x + area.width
                && row >= area.y
                && row < area.y + area.height;
            inside.then(|| {
                let index = self.offsets[slot(container)] + usize::from(row - area.y);
                (container, index, area)
            })
        })
    }
}

fn slot(container: Container) -> usize {
    match container {
        Container::Enabled => 0,
        Container::Disabled => 1,
    }
}

pub fn run(mut session: Session) -> Result<()> {
    if session.config.watch_enabled {
        let game_id = session.config.active_game.as_str();
        session.extension.on_game_activated(game_id);
    } else {
        session.extension.reload();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut session);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableMouseCapture, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("editor closed");
    session.extension.shutdown();
    result
}

fn run_loop(terminal: &mut Terminal<impl Backend>, session: &mut Session) -> Result<()> {
    let mut view = View::new();
    if let Some(error) = &session.path_error {
        view.set_error(format!("Game not found: {error}"));
    }

    loop {
        session.extension.tick(Instant::now());
        if let Some(notice) = session.drain_notices().pop() {
            view.set_error(notice);
        }
        view.clamp_selection(session);
        terminal.draw(|frame| draw(frame, session, &mut view))?;

        if view.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    handle_key(session, &mut view, key)
                }
                Event::Mouse(mouse) => handle_mouse(session, &mut view, mouse),
                _ => {}
            }
        }
    }

    Ok(())
}

fn handle_key(session: &mut Session, view: &mut View, key: KeyEvent) {
    let now = Instant::now();
    let focus = view.focus;
    let selected = view.selected(focus);
    let extension = &mut session.extension;

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('Q'), _) => {
            extension.flush_now();
            view.should_quit = true;
        }
        (KeyCode::Char('c'), mods) if mods.contains(KeyModifiers::CONTROL) => {
            extension.flush_now();
            view.should_quit = true;
        }
        (KeyCode::Esc, _) => {
            if extension.editor().drag_state().is_dragging() {
                extension.editor_mut().cancel_drag();
                view.set_status("Drag cancelled");
            }
        }
        (KeyCode::Tab, _)
        | (KeyCode::BackTab, _)
        | (KeyCode::Left, _)
        | (KeyCode::Right, _)
        | (KeyCode::Char('h'), _)
        | (KeyCode::Char('l'), _) => view.focus = focus.other(),
        (KeyCode::Char('K'), _) => {
            if selected > 0
                && extension
                    .editor_mut()
                    .move_within(focus, selected, selected - 1, now)
            {
                view.select(focus, selected - 1);
                view.set_status("Moved up");
            }
        }
        (KeyCode::Char('J'), _) => {
            let len = extension.editor().lists().get(focus).len();
            if selected + 1 < len
                && extension
                    .editor_mut()
                    .move_within(focus, selected, selected + 1, now)
            {
                view.select(focus, selected + 1);
                view.set_status("Moved down");
            }
        }
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => {
            view.select(focus, selected.saturating_sub(1));
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => {
            view.select(focus, selected + 1);
        }
        (KeyCode::Home, _) | (KeyCode::Char('g'), _) => view.select(focus, 0),
        (KeyCode::End, _) | (KeyCode::Char('G'), _) => {
            let len = extension.editor().lists().get(focus).len();
            view.select(focus, len.saturating_sub(1));
        }
        (KeyCode::Char(' '), _) | (KeyCode::Enter, _) => {
            let Some(item) = extension.editor().lists().get(focus).get(selected).cloned() else {
                return;
            };
            if extension.editor_mut().toggle(&item.id, now) {
                let verb = match focus {
                    Container::Enabled => "Disabled",
                    Container::Disabled => "Enabled",
                };
                view.set_status(format!("{verb} {}", item.name));
            }
        }
        (KeyCode::Char('r'), _) | (KeyCode::Char('R'), _) => {
            if extension.editor().has_pending_flush() {
                view.set_status("Unsaved changes pending; reload skipped");
            } else {
                session.host.rescan();
                extension.reload();
                view.set_status("Reloaded modconfig.json");
            }
        }
        (KeyCode::Char('s'), _) | (KeyCode::Char('S'), _) => {
            if extension.flush_now() {
                view.set_status("Saved");
            }
        }
        _ => {}
    }
}

fn handle_mouse(session: &mut Session, view: &mut View, mouse: MouseEvent) {
    let editor = session.extension.editor_mut();
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let Some((container, index, _)) = view.hit(mouse.column, mouse.row) else {
                return;
            };
            view.focus = container;
            if editor.begin_drag(container, index) {
                view.select(container, index);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if !editor.drag_state().is_dragging() {
                return;
            }
            let Some((container, index, area)) = view.hit(mouse.column, mouse.row) else {
                return;
            };
            let moved = if index < editor.lists().get(container).len() {
                let top = f32::from(mouse.row);
                let point = HoverPoint {
                    pointer_y: top + 0.5,
                    top,
                    bottom: top + 1.0,
                };
                editor.hover_item(container, index, point)
            } else if area.height > 0 {
                editor.hover_container(container)
            } else {
                false
            };
            if moved {
                if let Some(drag) = editor.drag_state().drag() {
                    view.select(drag.container, drag.index);
                }
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if editor.drop(Instant::now()).is_some() {
                view.set_status("Load order changed");
            }
        }
        MouseEventKind::ScrollUp => {
            if let Some((container, _, _)) = view.hit(mouse.column, mouse.row) {
                let selected = view.selected(container);
                view.select(container, selected.saturating_sub(1));
            }
        }
        MouseEventKind::ScrollDown => {
            if let Some((container, _, _)) = view.hit(mouse.column, mouse.row) {
                let selected = view.selected(container);
                view.select(container, selected + 1);
            }
        }
        _ => {}
    }
}

fn draw(frame: &mut Frame<'_>, session: &Session, view: &mut View) {
    let area = frame.size();
    let theme = Theme::new();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    frame.render_widget(header(session, &theme), chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);
    for (container, column) in COLUMNS.into_iter().zip(columns.iter()) {
        draw_column(frame, session, view, &theme, container, *column);
    }

    let status_style = if view.status_is_error {
        Style::default().fg(theme.error)
    } else {
        Style::default().fg(theme.text)
    };
    let status = Paragraph::new(status_line(session, view, chunks[2].width)).style(status_style);
    frame.render_widget(status, chunks[2]);
}

fn header(session: &Session, theme: &Theme) -> Paragraph<'static> {
    let extension = &session.extension;
    let lists = extension.editor().lists();
    let watch = if extension.store().is_watching() {
        Span::styled("watching", Style::default().fg(theme.success))
    } else {
        Span::styled("not watching", Style::default().fg(theme.muted))
    };
    let config_path = extension
        .store()
        .modconfig_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "modconfig.json not located".to_string());

    Paragraph::new(vec![
        Line::from(vec![
            Span::styled(
                "deadfire-order",
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                session.config.active_game.display_name(),
                Style::default().fg(theme.text),
            ),
            Span::raw("  "),
            watch,
        ]),
        Line::from(vec![
            Span::styled("Mods: ", Style::default().fg(theme.muted)),
            Span::styled(lists.len().to_string(), Style::default().fg(theme.text)),
            Span::raw("   "),
            Span::styled("Enabled: ", Style::default().fg(theme.muted)),
            Span::styled(
                lists.enabled.len().to_string(),
                Style::default()
                    .fg(theme.success)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(Span::styled(config_path, Style::default().fg(theme.muted))),
    ])
    .style(Style::default().bg(theme.header_bg))
    .alignment(Alignment::Center)
}

fn draw_column(
    frame: &mut Frame<'_>,
    session: &Session,
    view: &mut View,
    theme: &Theme,
    container: Container,
    area: Rect,
) {
    let editor = session.extension.editor();
    let items = editor.lists().get(container);
    let focused = view.focus == container;
    let block = theme.panel(
        format!(" {} ({}) ", container.label(), items.len()),
        focused,
    );
    let inner = block.inner(area);
    view.areas[slot(container)] = inner;

    if items.is_empty() {
        let empty = Paragraph::new("Drop mods here")
            .style(Style::default().fg(theme.muted))
            .block(block)
            .alignment(Alignment::Center);
        frame.render_widget(empty, area);
        view.offsets[slot(container)] = 0;
        return;
    }

    let dragged = editor
        .drag_state()
        .drag()
        .filter(|drag| drag.container == container)
        .map(|drag| drag.id.as_str());
    let rows: Vec<ListItem> = items
        .iter()
        .enumerate()
        .map(|(index, item)| row_for_item(index, item, dragged == Some(item.id.as_str()), theme))
        .collect();

    let highlight = if focused {
        Style::default()
            .bg(theme.accent_soft)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
    };
    let list = List::new(rows).block(block).highlight_style(highlight);
    let mut state = ListState::default()
        .with_selected(Some(view.selected(container)))
        .with_offset(view.offsets[slot(container)]);
    frame.render_stateful_widget(list, area, &mut state);
    view.offsets[slot(container)] = state.offset();
}

fn row_for_item(index: usize, item: &DisplayItem, dragged: bool, theme: &Theme) -> ListItem<'static> {
    let name_style = if dragged {
        Style::default()
            .fg(theme.warning)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    let mut spans = vec![
        Span::styled(format!("{:>3} ", index + 1), Style::default().fg(theme.muted)),
        Span::styled(item.name.clone(), name_style),
    ];
    if item.name != item.id {
        spans.push(Span::styled(
            format!("  {}", item.id),
            Style::default().fg(theme.muted),
        ));
    }
    ListItem::new(Line::from(spans))
}

fn status_line(session: &Session, view: &View, width: u16) -> String {
    let width = usize::from(width);
    let editor = session.extension.editor();
    let left = if editor.has_pending_flush() {
        format!("Status: {} (saving...)", view.status)
    } else {
        format!("Status: {}", view.status)
    };
    let right = if editor.drag_state().is_dragging() {
        "release to drop | Esc cancel"
    } else {
        "Tab column | Space toggle | J/K move | s save | r reload | q quit"
    };
    fit_status(&left, right, width)
}

fn fit_status(left: &str, right: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    if left_len + right_len + 1 > width {
        let available = width.saturating_sub(left_len + 1);
        let trimmed: String = right.chars().take(available).collect();
        return format!("{left} {trimmed}");
    }
    let spaces = width - left_len - right_len;
    format!("{left}{}{right}", " ".repeat(spaces))
}
