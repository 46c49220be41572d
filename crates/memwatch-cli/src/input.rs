use crate::shutdown::ShutdownSignal;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Keys understood by the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Esc, q or Ctrl+C.
    Quit,
    /// `u`: release every lock.
    ReleaseLocks,
}

/// Spawn a thread that turns key presses into [`KeyCommand`]s.
///
/// `Quit` triggers `shutdown` directly; other commands are sent on the
/// returned channel for the watch loop to drain between ticks.
pub fn spawn_keyboard_monitor(
    shutdown: Arc<ShutdownSignal>,
) -> (JoinHandle<()>, Receiver<KeyCommand>) {
    let (tx, rx) = channel();
    let handle = thread::spawn(move || monitor(shutdown, tx));
    (handle, rx)
}

fn monitor(shutdown: Arc<ShutdownSignal>, tx: Sender<KeyCommand>) {
    debug!("Keyboard monitor started");

    while !shutdown.is_shutdown() {
        if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
            continue;
        }
        let Ok(Event::Key(key_event)) = event::read() else {
            continue;
        };
        match classify(&key_event) {
            Some(KeyCommand::Quit) => {
                debug!("Quit key pressed: {:?}", key_event.code);
                shutdown.trigger();
                break;
            }
            Some(command) => {
                if tx.send(command).is_err() {
                    break;
                }
            }
            None => {}
        }
    }

    debug!("Keyboard monitor stopped");
}

fn classify(event: &KeyEvent) -> Option<KeyCommand> {
    match event.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(KeyCommand::Quit),
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Quit)
        }
        KeyCode::Char('u') | KeyCode::Char('U') => Some(KeyCommand::ReleaseLocks),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quit_keys() {
        for event in [
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            assert_eq!(classify(&event), Some(KeyCommand::Quit));
        }
    }

    #[test]
    fn test_release_locks_key() {
        let event = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::NONE);
        assert_eq!(classify(&event), Some(KeyCommand::ReleaseLocks));
    }

    #[test]
    fn test_other_keys_ignored() {
        let event = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(classify(&event), None);

        let event = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(classify(&event), None);

        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(classify(&event), None);
    }
}
