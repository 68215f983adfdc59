use crate::app::AppCommand;
use crate::camera::DeviceId;
use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Map a key press to an app command
pub fn command_for_key(code: KeyCode, modifiers: KeyModifiers) -> Option<AppCommand> {
    match code {
        // raw mode swallows SIGINT
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(AppCommand::Quit),
        KeyCode::Char(' ') | KeyCode::Char('c') | KeyCode::Enter => Some(AppCommand::Capture),
        KeyCode::Char('n') | KeyCode::Right => Some(AppCommand::NextCamera),
        KeyCode::Char('p') | KeyCode::Left => Some(AppCommand::PreviousCamera),
        KeyCode::Char(digit @ '0'..='9') => digit
            .to_digit(10)
            .map(|index| AppCommand::SwitchDevice(DeviceId(index))),
        KeyCode::Char('m') => Some(AppCommand::EditModel),
        KeyCode::Char('s') => Some(AppCommand::Save),
        KeyCode::Char('q') | KeyCode::Esc => Some(AppCommand::Quit),
        _ => None,
    }
}

/// Turns key presses into commands, collecting a model name after `m`
#[derive(Debug, Default)]
pub struct KeyMapper {
    model_entry: Option<String>,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a model name is being typed
    pub fn is_editing(&self) -> bool {
        self.model_entry.is_some()
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<AppCommand> {
        if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
            self.model_entry = None;
            return Some(AppCommand::Quit);
        }

        let Some(entry) = self.model_entry.as_mut() else {
            let command = command_for_key(code, modifiers);
            if command == Some(AppCommand::EditModel) {
                self.model_entry = Some(String::new());
            }
            return command;
        };

        match code {
            KeyCode::Char(ch) => {
                entry.push(ch);
                None
            }
            KeyCode::Backspace => {
                entry.pop();
                None
            }
            KeyCode::Esc => {
                debug!("Model entry cancelled");
                self.model_entry = None;
                None
            }
            KeyCode::Enter => {
                let model = self.model_entry.take().unwrap_or_default();
                let model = model.trim();
                if model.is_empty() {
                    None
                } else {
                    Some(AppCommand::SetModel(model.to_string()))
                }
            }
            _ => None,
        }
    }
}

/// Keyboard front end: reads raw key presses on a blocking thread and posts
/// commands to the presentation task
pub struct KeyboardInputHandler {
    commands: UnboundedSender<AppCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: UnboundedSender<AppCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");
            let mut mapper = KeyMapper::new();

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                                key_event
                            }
                            _ => continue,
                        };

                        let Some(command) = mapper.handle_key(key_event.code, key_event.modifiers)
                        else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        let quit = command == AppCommand::Quit;
                        if commands.send(command).is_err() {
                            debug!("Presentation task gone, keyboard handler exiting");
                            break;
                        }
                        if quit {
                            info!("Quit key pressed - requesting shutdown");
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the blocking task a poll period to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_key_bindings() {
        let none = KeyModifiers::NONE;
        assert_eq!(command_for_key(KeyCode::Char(' '), none), Some(AppCommand::Capture));
        assert_eq!(command_for_key(KeyCode::Char('c'), none), Some(AppCommand::Capture));
        assert_eq!(command_for_key(KeyCode::Char('n'), none), Some(AppCommand::NextCamera));
        assert_eq!(
            command_for_key(KeyCode::Char('p'), none),
            Some(AppCommand::PreviousCamera)
        );
        assert_eq!(command_for_key(KeyCode::Char('s'), none), Some(AppCommand::Save));
        assert_eq!(
            command_for_key(KeyCode::Char('3'), none),
            Some(AppCommand::SwitchDevice(DeviceId(3)))
        );
        assert_eq!(command_for_key(KeyCode::Char('m'), none), Some(AppCommand::EditModel));
        assert_eq!(command_for_key(KeyCode::Esc, none), Some(AppCommand::Quit));
        assert_eq!(
            command_for_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(AppCommand::Quit)
        );
        assert_eq!(command_for_key(KeyCode::Char('x'), none), None);
    }

    fn type_keys(mapper: &mut KeyMapper, keys: &[KeyCode]) -> Vec<AppCommand> {
        keys.iter()
            .filter_map(|key| mapper.handle_key(*key, KeyModifiers::NONE))
            .collect()
    }

    #[test]
    fn test_model_entry_posts_set_model() {
        let mut mapper = KeyMapper::new();

        let commands = type_keys(
            &mut mapper,
            &[
                KeyCode::Char('m'),
                KeyCode::Char('b'),
                KeyCode::Char('a'),
                KeyCode::Char('x'),
                KeyCode::Backspace,
                KeyCode::Char('k'),
                KeyCode::Char('q'),
                KeyCode::Enter,
            ],
        );

        assert_eq!(
            commands,
            vec![AppCommand::EditModel, AppCommand::SetModel("bakq".to_string())]
        );
        assert!(!mapper.is_editing());
        assert_eq!(
            mapper.handle_key(KeyCode::Char('q'), KeyModifiers::NONE),
            Some(AppCommand::Quit)
        );
    }

    #[test]
    fn test_model_entry_cancel_and_empty() {
        let mut mapper = KeyMapper::new();

        let cancelled = type_keys(
            &mut mapper,
            &[KeyCode::Char('m'), KeyCode::Char('l'), KeyCode::Esc, KeyCode::Char('s')],
        );
        assert_eq!(cancelled, vec![AppCommand::EditModel, AppCommand::Save]);

        let empty = type_keys(
            &mut mapper,
            &[KeyCode::Char('m'), KeyCode::Char(' '), KeyCode::Enter],
        );
        assert_eq!(empty, vec![AppCommand::EditModel]);
        assert!(!mapper.is_editing());

        mapper.handle_key(KeyCode::Char('m'), KeyModifiers::NONE);
        assert_eq!(
            mapper.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(AppCommand::Quit)
        );
        assert!(!mapper.is_editing());
    }

    #[tokio::test]
    async fn test_keyboard_handler_stop() {
        let (sender, _receiver) = mpsc::unbounded_channel();
        let handler = KeyboardInputHandler::new(sender);

        assert!(!handler.cancellation_token.is_cancelled());
        handler.stop().await.unwrap();
        assert!(handler.cancellation_token.is_cancelled());
    }
}
