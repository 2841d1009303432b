use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use winit::event::{ElementState, Event, MouseButton, VirtualKeyCode, WindowEvent};

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key(VirtualKeyCode, ElementState),
    MouseButton(MouseButton, ElementState),
    CursorMoved(f32, f32),
    FileDropped(PathBuf),
    /// Releases are not delivered to an unfocused window.
    FocusLost,
}

/// Everything that happened since the previous frame, in arrival order.
#[derive(Debug, Default)]
pub struct FrameInput {
    /// Keys that went down this frame; auto-repeat is filtered out.
    pub pressed: Vec<VirtualKeyCode>,
    pub held: HashSet<VirtualKeyCode>,
    /// The look button went down this frame.
    pub look_started: bool,
    pub look_active: bool,
    pub cursor_positions: Vec<(f32, f32)>,
    pub dropped_files: Vec<PathBuf>,
}

impl FrameInput {
    pub fn key_held(&self, key: VirtualKeyCode) -> bool {
        self.held.contains(&key)
    }
}

/// Window events are queued as they arrive and consumed once per frame by
/// `drain`, so continuous motion depends on frame time rather than on the
/// platform key-repeat rate.
#[derive(Debug, Default)]
pub struct Input {
    queue: VecDeque<InputEvent>,
    key_held: HashSet<VirtualKeyCode>,
    look_active: bool,
}

pub const LOOK_BUTTON: MouseButton = MouseButton::Right;

impl Input {
    pub fn new() -> Input {
        Input::default()
    }

    pub fn update(&mut self, event: &Event<()>) {
        let event = match event {
            Event::WindowEvent { event, .. } => event,
            _ => return,
        };
        match event {
            WindowEvent::KeyboardInput { input, .. } => {
                if let Some(key) = input.virtual_keycode {
                    self.push(InputEvent::Key(key, input.state));
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                self.push(InputEvent::MouseButton(*button, *state));
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.push(InputEvent::CursorMoved(position.x as f32, position.y as f32));
            }
            WindowEvent::DroppedFile(path) => {
                self.push(InputEvent::FileDropped(path.clone()));
            }
            WindowEvent::Focused(false) => self.push(InputEvent::FocusLost),
            _ => {}
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    pub fn drain(&mut self) -> FrameInput {
        let mut frame = FrameInput::default();
        while let Some(event) = self.queue.pop_front() {
            match event {
                InputEvent::Key(key, ElementState::Pressed) => {
                    if self.key_held.insert(key) {
                        frame.pressed.push(key);
                    }
                }
                InputEvent::Key(key, ElementState::Released) => {
                    self.key_held.remove(&key);
                }
                InputEvent::MouseButton(button, state) if button == LOOK_BUTTON => {
                    let active = state == ElementState::Pressed;
                    if active && !self.look_active {
                        frame.look_started = true;
                        frame.cursor_positions.clear();
                    }
                    self.look_active = active;
                }
                InputEvent::MouseButton(..) => {}
                InputEvent::CursorMoved(x, y) => {
                    if self.look_active {
                        frame.cursor_positions.push((x, y));
                    }
                }
                InputEvent::FileDropped(path) => frame.dropped_files.push(path),
                InputEvent::FocusLost => {
                    self.key_held.clear();
                    self.look_active = false;
                }
            }
        }
        frame.held = self.key_held.clone();
        frame.look_active = self.look_active;
        frame
    }
}
