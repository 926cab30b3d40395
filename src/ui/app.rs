use anyhow::{Context, Result};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use interface::Command;
use register_view::{
    register::{COUNTERS, WATCHPOINTS},
    CounterPanel, DebugTarget, Input, Panel, RegisterManager, StatusPanel, SyncError,
    WatchpointPanel,
};
use std::{
    cell::RefCell,
    io::Write,
    rc::Rc,
    time::{Duration, Instant},
};
use tui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, Paragraph, Tabs, Text},
    Terminal,
};

use super::event::{Event, Events};
use crate::viewer::{from_registers, Viewer};

const HELP: &str = "<-/-> tab  up/down field  space toggle  r read  w write  q quit";

type SharedPanel = Rc<RefCell<dyn Panel>>;

/// Everything the UI shows and edits, apart from the terminal itself.
pub struct State<T: DebugTarget> {
    manager: RegisterManager<T>,
    panels: Vec<SharedPanel>,
    current_tab: usize,
    selected: usize,
    status: String,
    viewer: Option<Viewer>,
    poll_interval: Option<Duration>,
    last_poll: Instant,
}

impl<T: DebugTarget> State<T> {
    pub fn new(manager: RegisterManager<T>) -> Self {
        let mut state = Self {
            manager,
            panels: Vec::new(),
            current_tab: 0,
            selected: 0,
            status: String::new(),
            viewer: None,
            poll_interval: None,
            last_poll: Instant::now(),
        };
        for index in 0..WATCHPOINTS {
            state.add_panel(WatchpointPanel::new(index));
        }
        for index in 0..COUNTERS {
            state.add_panel(CounterPanel::new(index));
        }
        state.add_panel(StatusPanel::new());
        state
    }

    fn add_panel<P: Panel + 'static>(&mut self, panel: P) {
        let panel = Rc::new(RefCell::new(panel));
        self.manager.subscribe(panel.clone());
        self.panels.push(panel);
    }

    pub fn with_viewer(mut self, viewer: Viewer) -> Self {
        self.viewer = Some(viewer);
        self
    }

    pub fn set_poll_interval(&mut self, milliseconds: u64) {
        self.poll_interval = match milliseconds {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        self.last_poll = Instant::now();
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn manager(&self) -> &RegisterManager<T> {
        &self.manager
    }

    fn current_panel(&self) -> &SharedPanel {
        &self.panels[self.current_tab]
    }

    fn report(&mut self, message: String) {
        if let Some(viewer) = &mut self.viewer {
            viewer.status(message.clone());
        }
        self.status = message;
    }

    fn publish(&mut self) {
        if let Some(viewer) = &mut self.viewer {
            viewer.publish(&self.manager.snapshot());
        }
    }

    pub fn read(&mut self) {
        self.last_poll = Instant::now();
        match self.manager.read_registers() {
            Ok(()) => {
                self.report("Registers read".to_string());
                self.publish();
            }
            Err(error) => {
                log::warn!("Reading the registers failed: {:?}", error);
                self.report(describe(&error));
            }
        }
    }

    pub fn write(&mut self) {
        match self.manager.write_registers() {
            Ok(()) => {
                self.report("Registers written".to_string());
                self.publish();
            }
            Err(error) => {
                log::warn!("Writing the registers failed: {:?}", error);
                self.report(describe(&error));
            }
        }
    }

    /// Handles a key press. Returns `true` if the user asked to quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let tabs = self.panels.len();
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('r') | KeyCode::F(5) => self.read(),
            KeyCode::Char('w') | KeyCode::F(6) => self.write(),
            KeyCode::Right | KeyCode::Tab => {
                self.current_tab = (self.current_tab + 1) % tabs;
                self.selected = 0;
            }
            KeyCode::Left | KeyCode::BackTab => {
                self.current_tab = (self.current_tab + tabs - 1) % tabs;
                self.selected = 0;
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                let rows = self.current_panel().borrow().controls().len();
                self.selected = (self.selected + 1).min(rows - 1);
            }
            KeyCode::Char(' ') => self.input(Input::Toggle),
            KeyCode::Backspace => self.input(Input::Backspace),
            KeyCode::Char(c) => self.input(Input::Char(c)),
            _ => (),
        }
        false
    }

    fn input(&mut self, input: Input) {
        let selected = self.selected;
        let mut panel = self.current_panel().borrow_mut();
        let controls = panel.controls_mut();
        if let Some(control) = controls.into_iter().nth(selected) {
            control.input(input);
        }
    }

    /// Runs the periodic work: viewer commands and polling the target.
    pub fn tick(&mut self) {
        while let Some(command) = self.viewer.as_mut().and_then(Viewer::next_command) {
            log::info!("Got viewer command: {:?}", command);
            match command {
                Command::UpdateInterval(interval) => self.set_poll_interval(interval as u64),
                Command::Read => self.read(),
                Command::Write(registers) => {
                    self.manager.apply_remote(from_registers(registers));
                    self.write();
                }
            }
        }

        if let Some(interval) = self.poll_interval {
            if self.last_poll.elapsed() >= interval {
                self.read();
            }
        }
    }

    fn titles(&self) -> Vec<String> {
        self.panels.iter().map(|p| p.borrow().title()).collect()
    }

    /// The rows of the current tab: text and whether it can be edited.
    fn rows(&self) -> Vec<(String, bool)> {
        let panel = self.current_panel().borrow();
        let rows = panel
            .controls()
            .iter()
            .map(|control| {
                (
                    format!("{:<16} {}", control.label(), control.display()),
                    !control.is_read_only(),
                )
            })
            .collect();
        rows
    }
}

fn describe(error: &SyncError) -> String {
    match error {
        SyncError::Format(error) => error.to_string(),
        SyncError::Target(source) => format!("{}: {:#}", error, source),
    }
}

/// App holds the state of the application and the terminal it draws to.
pub struct App<T: DebugTarget> {
    state: State<T>,

    terminal: Terminal<CrosstermBackend<std::io::Stdout>>,
    events: Events,
}

impl<T: DebugTarget> App<T> {
    pub fn new(state: State<T>, tick_rate: Duration) -> Result<Self> {
        let events = Events::new(tick_rate);

        enable_raw_mode().context("Switching the terminal to raw mode")?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        let _ = terminal.hide_cursor();

        Ok(Self {
            state,
            terminal,
            events,
        })
    }

    pub fn run(&mut self, read_on_start: bool) -> Result<()> {
        if read_on_start {
            self.state.read();
        }
        loop {
            self.render()?;
            match self.events.next()? {
                Event::Input(key) => {
                    if self.state.handle_key(key) {
                        return Ok(());
                    }
                }
                Event::Tick => self.state.tick(),
            }
        }
    }

    pub fn render(&mut self) -> Result<()> {
        let titles = self.state.titles();
        let rows = self.state.rows();
        let current_tab = self.state.current_tab;
        let selected = self.state.selected;
        let status = self.state.status.clone();

        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();

        self.terminal.draw(|mut f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(0)
                .constraints(
                    [
                        Constraint::Length(1),
                        Constraint::Min(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                    ]
                    .as_ref(),
                )
                .split(f.size());

            let tabs = Tabs::default()
                .titles(titles.as_slice())
                .select(current_tab)
                .style(Style::default().fg(Color::Black).bg(Color::Yellow))
                .highlight_style(
                    Style::default()
                        .fg(Color::Green)
                        .bg(Color::Yellow)
                        .modifier(Modifier::BOLD),
                );
            f.render_widget(tabs, chunks[0]);

            let items = rows.iter().enumerate().map(|(i, (row, editable))| {
                let style = if i == selected {
                    Style::default().fg(Color::Yellow).bg(Color::Blue)
                } else if *editable {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Text::styled(row.clone(), style)
            });
            let list = List::new(items).block(Block::default().borders(Borders::NONE));
            f.render_widget(list, chunks[1]);

            let status = [Text::raw(status)];
            let status = Paragraph::new(status.iter())
                .style(Style::default().fg(Color::White).bg(Color::Black));
            f.render_widget(status, chunks[2]);

            let help = [Text::raw(HELP)];
            let help =
                Paragraph::new(help.iter()).style(Style::default().fg(Color::Black).bg(Color::Yellow));
            f.render_widget(help, chunks[3]);
        })?;
        Ok(())
    }
}

impl<T: DebugTarget> Drop for App<T> {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interface::{Register, Update};
    use register_view::{DebugRegister, MemoryTarget};
    use std::{net::TcpStream, thread::sleep};
    use tungstenite::Message;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn type_text(state: &mut State<MemoryTarget>, text: &str) {
        for _ in 0..16 {
            state.handle_key(key(KeyCode::Backspace));
        }
        for c in text.chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typed_value_is_written() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.read();
        type_text(&mut state, "0x1234");
        assert!(!state.handle_key(key(KeyCode::Char('w'))));

        assert_eq!(state.status(), "Registers written");
        assert_eq!(
            state.manager().target().get(DebugRegister::Dvr(0).spr()),
            0x1234
        );
    }

    #[test]
    fn invalid_value_is_reported() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.handle_key(key(KeyCode::Right));
        type_text(&mut state, "0x12z");
        state.handle_key(key(KeyCode::F(6)));

        assert!(state.status().starts_with("Invalid value \"0x12z\" for Value (DVR1)"));
        assert_eq!(state.manager().target().get(DebugRegister::Dvr(1).spr()), 0);
    }

    #[test]
    fn toggles_follow_the_selection() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.handle_key(key(KeyCode::Down));
        state.handle_key(key(KeyCode::Char(' ')));
        state.handle_key(key(KeyCode::Down));
        state.handle_key(key(KeyCode::Char(' ')));
        state.handle_key(key(KeyCode::Char('w')));

        let dcr0 = state.manager().target().get(DebugRegister::Dcr(0).spr());
        assert_eq!(dcr0, 0b1_001_0);
    }

    #[test]
    fn tabs_wrap_around() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.handle_key(key(KeyCode::Left));
        assert_eq!(state.titles()[state.current_tab], "Status");
        state.handle_key(key(KeyCode::Tab));
        assert_eq!(state.current_tab, 0);
        assert_eq!(state.titles().len(), 11);
    }

    #[test]
    fn selection_stays_in_range() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        for _ in 0..20 {
            state.handle_key(key(KeyCode::Down));
        }
        assert_eq!(state.selected, state.rows().len() - 1);
        state.handle_key(key(KeyCode::Up));
        assert_eq!(state.selected, state.rows().len() - 2);
    }

    #[test]
    fn quit_keys() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        assert!(state.handle_key(key(KeyCode::Char('q'))));
        assert!(state.handle_key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: KeyModifiers::CONTROL,
        }));
        assert!(!state.handle_key(key(KeyCode::Char('c'))));
    }

    #[test]
    fn failed_read_shows_the_cause() {
        let target = MemoryTarget::new().with_fault(DebugRegister::Dmr1.spr());
        let mut state = State::new(RegisterManager::new(target));
        state.read();
        assert!(state.status().contains("Reading DMR1"));
    }

    #[test]
    fn polling_rereads_the_target() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.set_poll_interval(1000);
        state.tick();
        assert_eq!(state.status(), "");

        state
            .manager
            .target_mut()
            .write_spr(DebugRegister::Dsr.spr(), 0x2000)
            .unwrap();
        state.last_poll -= Duration::from_millis(2000);
        state.tick();

        assert_eq!(state.status(), "Registers read");
        assert_eq!(state.manager().cache().get(DebugRegister::Dsr), 0x2000);
    }

    #[test]
    fn zero_interval_disables_polling() {
        let mut state = State::new(RegisterManager::new(MemoryTarget::new()));
        state.set_poll_interval(0);
        state.last_poll -= Duration::from_millis(200);
        state.tick();
        assert_eq!(state.status(), "");
    }

    #[test]
    fn viewer_commands_are_executed_and_answered() {
        let viewer = Viewer::start("127.0.0.1:0").unwrap();
        let addr = viewer.local_addr().unwrap();
        let mut state =
            State::new(RegisterManager::new(MemoryTarget::new())).with_viewer(viewer);

        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let url = format!("ws://{}/", addr);
        let (mut client, _) = tungstenite::client(url.as_str(), stream).unwrap();

        let command = Command::Write(vec![Register {
            name: "DVR0".into(),
            spr: 0x3000,
            value: 0x1234,
        }]);
        client
            .write_message(Message::Text(serde_json::to_string(&command).unwrap()))
            .unwrap();

        let start = Instant::now();
        while state.manager().target().get(DebugRegister::Dvr(0).spr()) != 0x1234 {
            assert!(start.elapsed() < Duration::from_secs(5), "command never arrived");
            sleep(Duration::from_millis(5));
            state.tick();
        }
        assert_eq!(state.status(), "Registers written");

        let registers = loop {
            match client.read_message().unwrap() {
                Message::Text(text) => match serde_json::from_str(&text).unwrap() {
                    Update::Registers(registers) => break registers,
                    Update::Status(_) => continue,
                },
                _ => continue,
            }
        };
        let dvr0 = registers
            .registers
            .iter()
            .find(|register| register.spr == 0x3000)
            .unwrap();
        assert_eq!(dvr0.value, 0x1234);

        let command = serde_json::to_string(&Command::UpdateInterval(50)).unwrap();
        client.write_message(Message::Text(command)).unwrap();
        let start = Instant::now();
        while state.poll_interval.is_none() {
            assert!(start.elapsed() < Duration::from_secs(5), "command never arrived");
            sleep(Duration::from_millis(5));
            state.tick();
        }
        assert_eq!(state.poll_interval, Some(Duration::from_millis(50)));
    }
}
