use std::io::stdout;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};

use runpad_engine::dispatch::Dispatcher;
use runpad_engine::panel::{RunOutput, INPUT_TIP, SOURCE_SUMMARY};

use crate::util;

/// Lines moved by PgUp/PgDn in the panel.
const SCROLL_JUMP: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    List,
    /// Editing the input at this index
    Input(usize),
}

struct TuiApp {
    runner: Dispatcher,
    /// Function names in list order
    names: Vec<String>,
    cursor: usize,
    focus: Focus,
    /// Open new panels with the source expanded
    show_source: bool,
    scroll: u16,
    should_quit: bool,
    show_help: bool,
}

impl TuiApp {
    fn new(runner: Dispatcher, show_source: bool) -> Self {
        let names: Vec<String> = runner.registry().names().map(str::to_string).collect();
        let mut app = Self {
            runner,
            names,
            cursor: 0,
            focus: Focus::List,
            show_source,
            scroll: 0,
            should_quit: false,
            show_help: false,
        };
        app.mount();
        app
    }

    /// Mount the panel for the function under the cursor.
    fn mount(&mut self) {
        let name = self.names.get(self.cursor).cloned().unwrap_or_default();
        self.runner.select(&name);
        if self.show_source {
            if let Some(panel) = self.runner.panel_mut() {
                panel.toggle_source();
            }
        }
        self.focus = Focus::List;
        self.scroll = 0;
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.names.is_empty() {
            return;
        }
        let last = self.names.len() as isize - 1;
        let next = (self.cursor as isize + delta).clamp(0, last) as usize;
        if next != self.cursor {
            self.cursor = next;
            self.mount();
        }
    }

    fn field_count(&self) -> usize {
        self.runner.panel().map_or(0, |p| p.fields.len())
    }

    fn toggle_source(&mut self) {
        if let Some(panel) = self.runner.panel_mut() {
            panel.toggle_source();
        }
    }

    fn run(&mut self) {
        self.runner.run();
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if self.show_help {
            // Any key dismisses help
            self.show_help = false;
            return;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match (key.code, self.focus) {
            (KeyCode::Char('s'), _) if ctrl => self.toggle_source(),
            (KeyCode::Char('c'), _) if ctrl => self.should_quit = true,
            (KeyCode::PageUp, _) => self.scroll = self.scroll.saturating_sub(SCROLL_JUMP),
            (KeyCode::PageDown, _) => self.scroll = self.scroll.saturating_add(SCROLL_JUMP),
            (_, Focus::List) => self.handle_list_key(key),
            (_, Focus::Input(index)) => self.handle_input_key(key, index),
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Home | KeyCode::Char('g') => self.move_cursor(-(self.names.len() as isize)),
            KeyCode::End | KeyCode::Char('G') => self.move_cursor(self.names.len() as isize),
            KeyCode::Char('s') => self.toggle_source(),
            KeyCode::Char('r') => self.run(),
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') if self.field_count() > 0 => {
                self.focus = Focus::Input(0);
            }
            KeyCode::Enter => {
                if self.field_count() > 0 {
                    self.focus = Focus::Input(0);
                } else {
                    self.run();
                }
            }
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent, index: usize) {
        let count = self.field_count();
        if count == 0 {
            self.focus = Focus::List;
            return;
        }

        match key.code {
            KeyCode::Esc => self.focus = Focus::List,
            KeyCode::Enter => self.run(),
            KeyCode::Tab | KeyCode::Down => self.focus = Focus::Input((index + 1) % count),
            KeyCode::BackTab | KeyCode::Up => self.focus = Focus::Input((index + count - 1) % count),
            KeyCode::Backspace => {
                if let Some(field) = self.runner.panel_mut().and_then(|p| p.fields.get_mut(index)) {
                    field.value.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.runner.panel_mut().and_then(|p| p.fields.get_mut(index)) {
                    field.value.push(c);
                }
            }
            _ => {}
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

        self.draw_title(frame, chunks[0]);

        let list_width = self
            .names
            .iter()
            .map(|n| util::display_width(n))
            .max()
            .unwrap_or(0)
            .clamp(12, 28) as u16
            + 4;
        let body = Layout::horizontal([Constraint::Length(list_width), Constraint::Min(20)])
            .split(chunks[1]);
        self.draw_list(frame, body[0]);
        self.draw_panel(frame, body[1]);

        self.draw_status(frame, chunks[2]);

        if self.show_help {
            self.draw_help(frame, area);
        }
    }

    fn draw_title(&self, frame: &mut Frame, area: Rect) {
        let title = format!(
            " runpad | {} functions | {} fixtures ",
            self.names.len(),
            self.runner.fixtures().len()
        );
        let para = Paragraph::new(Line::from(vec![Span::styled(
            title,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]))
        .style(Style::default().bg(Color::Cyan));
        frame.render_widget(para, area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let visible = area.height.saturating_sub(2) as usize;
        let first = if visible > 0 && self.cursor >= visible {
            self.cursor + 1 - visible
        } else {
            0
        };

        let fixtures = self.runner.fixtures();
        let lines: Vec<Line> = self
            .names
            .iter()
            .enumerate()
            .skip(first)
            .take(visible)
            .map(|(i, name)| {
                let marker = if fixtures.get(name).is_some() { "*" } else { " " };
                let text = util::pad_right(
                    &format!("{}{}", marker, name),
                    inner_width,
                );
                let style = if i == self.cursor {
                    let bg = if self.focus == Focus::List { Color::White } else { Color::Gray };
                    Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Line::from(Span::styled(text, style))
            })
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Functions ");
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_panel(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));

        let Some(panel) = self.runner.panel() else {
            let msg = Paragraph::new("(no functions registered)")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(msg, area);
            return;
        };

        let dim = Style::default().fg(Color::DarkGray);
        let mut lines: Vec<Line> = Vec::new();

        lines.push(Line::from(Span::styled(
            panel.title.clone(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(panel.entry().info.signature()));
        lines.push(Line::from(""));
        for doc in panel.documentation.lines() {
            lines.push(Line::from(doc.to_string()));
        }
        lines.push(Line::from(""));

        let marker = if panel.source_expanded { "[-]" } else { "[+]" };
        lines.push(Line::from(Span::styled(
            format!("{} {}", marker, SOURCE_SUMMARY),
            Style::default().fg(Color::Yellow),
        )));
        if panel.source_expanded {
            for src in panel.source.lines() {
                lines.push(Line::from(Span::styled(format!("  {}", src), dim)));
            }
        }
        lines.push(Line::from(""));

        let label_width = panel
            .fields
            .iter()
            .map(|f| util::display_width(&f.label))
            .max()
            .unwrap_or(0);
        for (i, field) in panel.fields.iter().enumerate() {
            let focused = self.focus == Focus::Input(i);
            let label = Span::styled(
                format!("{} ", util::pad_right(&field.label, label_width)),
                Style::default().add_modifier(Modifier::BOLD),
            );
            let value = if focused {
                Span::styled(
                    format!("{}_", field.value),
                    Style::default().fg(Color::Black).bg(Color::White),
                )
            } else if field.value.is_empty() {
                Span::styled(field.placeholder.clone(), dim)
            } else {
                Span::raw(field.value.clone())
            };
            lines.push(Line::from(vec![label, value]));
        }
        lines.push(Line::from(Span::styled(
            "[ Run ]",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(INPUT_TIP, dim)));

        if let Some(output) = &panel.output {
            lines.push(Line::from(""));
            let style = match output {
                RunOutput::Value(_) => Style::default().fg(Color::Green),
                RunOutput::Error(_) => Style::default().fg(Color::Red),
            };
            for text in output.text().lines() {
                lines.push(Line::from(Span::styled(text.to_string(), style)));
            }
        }

        if let Some(test) = &panel.test {
            lines.push(Line::from(""));
            let color = if test.passed { Color::Green } else { Color::Red };
            lines.push(Line::from(Span::styled(
                test.badge(),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            for detail in test.detail().lines() {
                lines.push(Line::from(detail.to_string()));
            }
        }

        let para = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0));
        frame.render_widget(para, area);
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect) {
        let left = match self.focus {
            Focus::List => " up/down: select  enter: inputs  r: run  s: source".to_string(),
            Focus::Input(i) => format!(
                " editing {}  tab: next  enter: run  esc: back",
                self.runner
                    .panel()
                    .and_then(|p| p.fields.get(i))
                    .map(|f| f.param.as_str())
                    .unwrap_or("")
            ),
        };
        let right = "?: help ";

        let padding = (area.width as usize)
            .saturating_sub(util::display_width(&left) + util::display_width(right));
        let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

        let para = Paragraph::new(Line::from(vec![Span::styled(
            status,
            Style::default().fg(Color::Black).bg(Color::DarkGray),
        )]))
        .style(Style::default().bg(Color::DarkGray));
        frame.render_widget(para, area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let help_lines = [
            "",
            "  Function list",
            "  -------------",
            "  up/down / jk      Select function",
            "  Home / End        First / last",
            "  Enter / Tab       Edit inputs",
            "  r                 Run",
            "  s                 Toggle source",
            "",
            "  Inputs",
            "  ------",
            "  Tab / Shift+Tab   Next/prev input",
            "  Enter             Run",
            "  Esc               Back to list",
            "",
            "  General",
            "  -------",
            "  Ctrl+S            Toggle source",
            "  PgUp / PgDn       Scroll panel",
            "  q / Esc           Quit",
            "  ?                 Toggle this help",
            "",
        ];
        let help_width: u16 = 44;
        let help_height: u16 = help_lines.len() as u16 + 2;

        let x = area.width.saturating_sub(help_width) / 2;
        let y = area.height.saturating_sub(help_height) / 2;
        let popup = Rect::new(
            area.x + x,
            area.y + y,
            help_width.min(area.width),
            help_height.min(area.height),
        );

        let lines: Vec<Line> = help_lines
            .iter()
            .map(|s| Line::from(Span::styled(*s, Style::default().fg(Color::White))))
            .collect();

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Keybindings ")
            .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .style(Style::default().bg(Color::Black));

        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// Run the interactive function runner.
pub fn run(runner: Dispatcher, show_source: bool) -> Result<(), String> {
    run_app(TuiApp::new(runner, show_source))
}

fn run_app(mut app: TuiApp) -> Result<(), String> {
    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;

    struct Cleanup;
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = stdout().execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
    let _cleanup = Cleanup;

    let backend = CrosstermBackend::new(stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| format!("failed to create terminal: {}", e))?;

    loop {
        terminal
            .draw(|frame| app.draw(frame))
            .map_err(|e| format!("draw error: {}", e))?;

        if event::poll(Duration::from_millis(100)).map_err(|e| format!("event poll error: {}", e))? {
            if let Event::Key(key) = event::read().map_err(|e| format!("event read error: {}", e))? {
                // Windows reports releases too
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use runpad_engine::builtins;
    use runpad_engine::dispatch::PageIds;
    use runpad_engine::page::{Element, Page};
    use ratatui::backend::TestBackend;

    fn app() -> TuiApp {
        let page = Page::new()
            .with_element(Element::new("select").with_id("functionSelect"))
            .with_element(Element::new("div").with_id("functionContainer"));
        let runner = Dispatcher::initialize(
            page,
            PageIds::default(),
            Some(builtins::builtin_source()),
            None,
            builtins::fixtures(),
        )
        .unwrap();
        TuiApp::new(runner, false)
    }

    fn press(app: &mut TuiApp, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn first_function_is_mounted() {
        let app = app();
        assert_eq!(app.runner.selected(), "add");
        assert!(app.runner.panel().is_some());
    }

    #[test]
    fn arrows_switch_panels() {
        let mut app = app();
        press(&mut app, KeyCode::Down);
        assert_eq!(app.runner.selected(), app.names[1]);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.runner.selected(), "add");
        press(&mut app, KeyCode::End);
        assert_eq!(app.cursor, app.names.len() - 1);
    }

    #[test]
    fn edit_inputs_and_run() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.focus, Focus::Input(0));
        type_text(&mut app, "22");
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.focus, Focus::Input(1));
        type_text(&mut app, "3");
        press(&mut app, KeyCode::Enter);

        let panel = app.runner.panel().unwrap();
        assert_eq!(panel.output.as_ref().unwrap().text(), "Output: 5");
    }

    #[test]
    fn typing_q_in_an_input_does_not_quit() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "q");
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.focus, Focus::List);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_s_toggles_source() {
        let mut app = app();
        assert!(!app.runner.panel().unwrap().source_expanded);
        app.handle_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert!(app.runner.panel().unwrap().source_expanded);
    }

    #[test]
    fn switching_function_resets_inputs() {
        let mut app = app();
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "7");
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.runner.panel().unwrap().fields[0].value, "");
    }

    #[test]
    fn help_is_dismissed_by_any_key() {
        let mut app = app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_help);
        assert!(!app.should_quit);
    }

    #[test]
    fn draws_panel_and_fixture_badge() {
        let app = app();
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content.iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("runpad"));
        assert!(screen.contains(SOURCE_SUMMARY));
        assert!(screen.contains("Test Passed"));
    }
}
