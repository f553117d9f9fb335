//! View components and the trait the app loop drives them through.

use color_eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

use crate::action::Action;

pub mod browser;
pub mod download;
pub mod nodes;
pub mod pod_logs;
pub mod resources;
pub mod terminal;
pub mod workloads;

/// A full-screen view.
///
/// The app loop delivers key presses and actions; components answer with
/// follow-up actions. Anything async happens in `refresh`-style methods the
/// app awaits, or in tasks the component spawns and polls on `Tick`.
pub trait Component {
    /// Called once when the component takes the screen.
    fn init(&mut self, _area: Rect) -> Result<()> {
        Ok(())
    }

    /// Handles a key press, optionally producing an action.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let _ = key;
        Ok(None)
    }

    /// Handles an app-level action, optionally producing a follow-up.
    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        let _ = action;
        Ok(None)
    }

    /// Renders the component into `area`.
    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()>;
}
