use control_core::bindings::{self, key_label, Key, KEY_BINDINGS};
use control_core::connection::{self, ConnectionHandle, ConnectionState, Link};
use control_core::protocol::ACTIONS;
use control_core::timer;
use control_core::{ControlConfig, Dispatcher, Notice, NoticeLevel, WsTransport};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

const INPUT_CAP: usize = 64;

#[derive(Default)]
struct View {
    last_notice: Option<Notice>,
    /// Typed action name while the `:` prompt is open.
    prompt: Option<String>,
    show_actions: bool,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Holds raw mode and the alternate screen; dropping it hands the terminal back
/// even when the panel exits through `?` or a panic.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut impl Write) -> io::Result<Self> {
        // Raw mode keeps bound keys from echoing or scrolling the terminal.
        enable_raw_mode()?;
        let guard = Self;
        execute!(out, EnterAlternateScreen, cursor::Hide)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen);
        if let Err(e) = disable_raw_mode() {
            tracing::warn!(error = %e, "failed to restore terminal");
        }
    }
}

pub async fn run(config: ControlConfig) -> anyhow::Result<()> {
    let (handle, mut events) = connection::spawn(WsTransport, &config);
    let mut dispatcher = Dispatcher::new(handle.clone(), &config);

    let (input_tx, mut input_rx) = mpsc::channel(INPUT_CAP);
    let mut stdout = io::stdout();
    let terminal = TerminalGuard::enter(&mut stdout)?;
    thread::spawn(move || read_keys(input_tx));

    let result: anyhow::Result<()> = async {
        let mut view = View::default();
        loop {
            render(&mut stdout, &config, &dispatcher, &view)?;
            let revert_at = dispatcher.revert_deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => dispatcher.on_connection_event(event),
                    None => break,
                },
                key = input_rx.recv() => match key {
                    Some(key) => {
                        if handle_key(key, &mut dispatcher, &mut view) == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                },
                _ = timer::sleep_until(revert_at) => dispatcher.tick(Instant::now()),
            }
            if let Some(notice) = dispatcher.take_notices().pop() {
                view.last_notice = Some(notice);
            }
        }
        Ok(())
    }
    .await;

    drop(terminal);
    handle.shutdown().await;
    result
}

/// Blocking crossterm reader. Stops once the panel drops its receiver.
fn read_keys(tx: mpsc::Sender<KeyEvent>) {
    while !tx.is_closed() {
        match event::poll(Duration::from_millis(50)) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "terminal poll failed");
                return;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if tx.blocking_send(key).is_err() {
                    return;
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "terminal read failed");
                return;
            }
        }
    }
}

fn handle_key<L: Link>(key: KeyEvent, dispatcher: &mut Dispatcher<L>, view: &mut View) -> Flow {
    if let Some(buffer) = view.prompt.as_mut() {
        match key.code {
            KeyCode::Enter => {
                let action = std::mem::take(buffer);
                view.prompt = None;
                dispatch(dispatcher, &action);
            }
            KeyCode::Esc => view.prompt = None,
            KeyCode::Backspace => {
                buffer.pop();
            }
            KeyCode::Char(c) => buffer.push(c),
            _ => {}
        }
        return Flow::Continue;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
        KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
        KeyCode::Char(':') => view.prompt = Some(String::new()),
        KeyCode::Char('?') => view.show_actions = !view.show_actions,
        code => {
            if let Some(action) = to_binding(code).and_then(bindings::action_for) {
                dispatch(dispatcher, action);
            }
        }
    }
    Flow::Continue
}

fn dispatch<L: Link>(dispatcher: &mut Dispatcher<L>, action: &str) {
    if let Err(e) = dispatcher.dispatch(action) {
        tracing::debug!(error = %e, action, "command rejected");
    }
}

fn to_binding(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Char(' ') => Some(Key::Space),
        KeyCode::Char(c) => Some(Key::Char(c)),
        _ => None,
    }
}

fn render(
    out: &mut impl Write,
    config: &ControlConfig,
    dispatcher: &Dispatcher<ConnectionHandle>,
    view: &View,
) -> io::Result<()> {
    queue!(out, cursor::MoveTo(0, 0), Clear(ClearType::All))?;
    line(out, format!("IoT vehicle control  {}", config.endpoint).bold())?;

    let status = match dispatcher.status() {
        ConnectionState::Connected => "CONNECTED - IoT vehicle online".green(),
        ConnectionState::Disconnected => "DISCONNECTED - reconnecting...".red(),
    };
    line(out, status)?;
    line(out, format!("Movement: {}", dispatcher.indicator().label()))?;

    match &view.last_notice {
        Some(notice) => {
            let text = notice.text.clone();
            let styled = match notice.level {
                NoticeLevel::Success => text.green(),
                NoticeLevel::Error => text.red(),
            };
            line(out, styled)?;
        }
        None => line(out, "")?,
    }

    line(out, "")?;
    line(out, "History:".bold())?;
    if dispatcher.history().is_empty() {
        line(out, "  Press a key to start...".dim())?;
    }
    for entry in dispatcher.history().iter() {
        line(out, format!("  {:<14}{}", entry.action, entry.display_time))?;
    }

    line(out, "")?;
    let keys: Vec<String> = KEY_BINDINGS
        .iter()
        .map(|&(key, action)| format!("{} {action}", key_label(key)))
        .collect();
    line(out, format!("Keys: {}", keys.join(" | ")).dim())?;
    line(out, "':' type an action  '?' list actions  'q' quit".dim())?;

    if view.show_actions {
        line(out, "")?;
        for (name, id) in ACTIONS {
            line(out, format!("  {id:>4}  {name}"))?;
        }
    }

    if let Some(buffer) = &view.prompt {
        line(out, "")?;
        line(out, format!("action> {buffer}"))?;
    }
    out.flush()
}

fn line(out: &mut impl Write, content: impl std::fmt::Display) -> io::Result<()> {
    queue!(out, Print(content), Print("\r\n"))
}
