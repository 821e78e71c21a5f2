//! Operator session state machine.
//!
//! Interprets abstract key input against the current mode and registration
//! sub-state. Every transition mutates the session in place and yields at
//! most one side effect for the caller to execute.

use crate::geometry::Rect;
use crate::register::RegisterManager;
use crate::tracker::TrackedFace;

/// Raw key codes for Enter/Escape/Backspace as delivered by the input
/// collaborator.
const CODE_ENTER: u8 = 13;
const CODE_ESCAPE: u8 = 27;
const CODE_BACKSPACE: u8 = 8;

/// Digits carrying mode-switch and exit commands. They take precedence
/// over face selection, so faces at those list indices are selected with
/// other digits after the list reorders.
const DIGIT_TO_REGISTER: u8 = 1;
const DIGIT_TO_RECOGNIZE: u8 = 2;
const DIGIT_EXIT: u8 = 3;

/// Abstract operator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Enter,
    Escape,
    Backspace,
    Char(char),
}

impl Key {
    /// Decode a raw key code. Unmapped codes yield `None` and are ignored
    /// upstream.
    pub fn from_code(code: u8) -> Option<Key> {
        match code {
            CODE_ENTER => Some(Key::Enter),
            CODE_ESCAPE => Some(Key::Escape),
            CODE_BACKSPACE => Some(Key::Backspace),
            b'0'..=b'9' => Some(Key::Digit(code - b'0')),
            0x20..=0x7e => Some(Key::Char(code as char)),
            _ => None,
        }
    }

    /// The printable character this key contributes to a name buffer.
    fn as_char(self) -> Option<char> {
        match self {
            Key::Char(c) => Some(c),
            Key::Digit(d) => Some((b'0' + d) as char),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Register,
    Recognize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterState {
    Idle,
    Selecting,
}

/// Side effect of a transition, executed by the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Ship a "register this face as name" request.
    SendRegistration {
        face_id: u32,
        region: Rect,
        name: String,
    },
    /// Operator asked to terminate.
    Exit,
}

/// Whole-session state, read by rendering and mutated only here.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub mode: Mode,
    pub register_state: RegisterState,
    pub selected_ids: Vec<u32>,
    pub current_index: usize,
    pub name_buffer: String,
    pub should_exit: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            mode: Mode::Recognize,
            register_state: RegisterState::Idle,
            selected_ids: Vec::new(),
            current_index: 0,
            name_buffer: String::new(),
            should_exit: false,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the operator is typing a name for a selected face.
    pub fn is_selecting(&self) -> bool {
        self.mode == Mode::Register && self.register_state == RegisterState::Selecting
    }

    /// Feed one key through the state machine.
    ///
    /// `faces` is the current visible face list (selection indexes into
    /// it); locks are applied through `register`.
    pub fn handle_key(
        &mut self,
        key: Key,
        faces: &[TrackedFace],
        register: &mut RegisterManager,
    ) -> Option<SessionEffect> {
        match (self.mode, self.register_state) {
            (Mode::Register, RegisterState::Selecting) => self.on_selecting_key(key, faces, register),
            (Mode::Register, RegisterState::Idle) => self.on_register_idle_key(key, faces, register),
            (Mode::Recognize, _) => self.on_recognize_key(key, register),
        }
    }

    fn on_register_idle_key(
        &mut self,
        key: Key,
        faces: &[TrackedFace],
        register: &mut RegisterManager,
    ) -> Option<SessionEffect> {
        match key {
            Key::Digit(DIGIT_EXIT) => {
                tracing::info!("exit requested");
                self.should_exit = true;
                Some(SessionEffect::Exit)
            }
            Key::Digit(DIGIT_TO_RECOGNIZE) => {
                tracing::info!("mode switched to recognize");
                self.enter_recognize(register);
                None
            }
            Key::Digit(d) => {
                let idx = d as usize;
                if let Some(face) = faces.get(idx) {
                    if !self.selected_ids.contains(&face.id) {
                        self.selected_ids.push(face.id);
                        register.lock_face(face.id, face.region);
                        tracing::info!(face_id = face.id, index = idx, "face selected");
                    }
                }
                None
            }
            Key::Enter if !self.selected_ids.is_empty() => {
                tracing::info!(count = self.selected_ids.len(), "starting name entry");
                self.register_state = RegisterState::Selecting;
                self.current_index = 0;
                self.name_buffer.clear();
                None
            }
            _ => None,
        }
    }

    fn on_selecting_key(
        &mut self,
        key: Key,
        faces: &[TrackedFace],
        register: &mut RegisterManager,
    ) -> Option<SessionEffect> {
        match key {
            Key::Escape => {
                tracing::info!("registration aborted");
                self.reset_registration(register);
                None
            }
            Key::Enter => {
                let name = self.name_buffer.trim().to_string();
                if name.is_empty() {
                    return None;
                }

                let face_id = self.selected_ids[self.current_index];
                let region = faces.iter().find(|f| f.id == face_id).map(|f| f.region);

                let effect = match region {
                    Some(region) => {
                        tracing::info!(face_id, name = %name, "registration confirmed");
                        Some(SessionEffect::SendRegistration {
                            face_id,
                            region,
                            name,
                        })
                    }
                    None => {
                        tracing::warn!(face_id, "selected face no longer visible, skipped");
                        None
                    }
                };

                self.current_index += 1;
                if self.current_index >= self.selected_ids.len() {
                    tracing::info!("registration session complete");
                    self.reset_registration(register);
                } else {
                    self.name_buffer.clear();
                }
                effect
            }
            Key::Backspace => {
                self.name_buffer.pop();
                None
            }
            key => {
                if let Some(c) = key.as_char() {
                    self.name_buffer.push(c);
                }
                None
            }
        }
    }

    fn on_recognize_key(&mut self, key: Key, register: &mut RegisterManager) -> Option<SessionEffect> {
        match key {
            Key::Digit(DIGIT_EXIT) => {
                tracing::info!("exit requested");
                self.should_exit = true;
                Some(SessionEffect::Exit)
            }
            Key::Digit(DIGIT_TO_REGISTER) => {
                tracing::info!("mode switched to register");
                self.mode = Mode::Register;
                self.reset_registration(register);
                None
            }
            _ => None,
        }
    }

    fn enter_recognize(&mut self, register: &mut RegisterManager) {
        self.mode = Mode::Recognize;
        self.reset_registration(register);
    }

    /// Back to register.idle with all selection state and locks dropped.
    fn reset_registration(&mut self, register: &mut RegisterManager) {
        self.register_state = RegisterState::Idle;
        self.selected_ids.clear();
        self.current_index = 0;
        self.name_buffer.clear();
        register.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn face(id: u32, region: Rect) -> TrackedFace {
        TrackedFace {
            id,
            crop: RgbImage::new(4, 4),
            region,
        }
    }

    fn press(
        state: &mut SessionState,
        register: &mut RegisterManager,
        faces: &[TrackedFace],
        keys: &str,
    ) -> Vec<SessionEffect> {
        keys.bytes()
            .filter_map(|code| Key::from_code(code))
            .filter_map(|key| state.handle_key(key, faces, register))
            .collect()
    }

    #[test]
    fn test_key_decoding() {
        assert_eq!(Key::from_code(13), Some(Key::Enter));
        assert_eq!(Key::from_code(27), Some(Key::Escape));
        assert_eq!(Key::from_code(8), Some(Key::Backspace));
        assert_eq!(Key::from_code(b'7'), Some(Key::Digit(7)));
        assert_eq!(Key::from_code(b'a'), Some(Key::Char('a')));
        assert_eq!(Key::from_code(200), None);
    }

    #[test]
    fn test_register_flow_end_to_end() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let region = Rect::new(100, 100, 60, 60);
        let faces = vec![face(0, region)];

        // '1' -> register.idle
        assert!(press(&mut state, &mut register, &faces, "1").is_empty());
        assert_eq!(state.mode, Mode::Register);
        assert_eq!(state.register_state, RegisterState::Idle);

        // '0' selects face index 0 and locks it
        press(&mut state, &mut register, &faces, "0");
        assert_eq!(state.selected_ids, vec![0]);
        assert!(register.is_locked(0));

        // Enter -> selecting
        state.handle_key(Key::Enter, &faces, &mut register);
        assert_eq!(state.register_state, RegisterState::Selecting);
        assert_eq!(state.current_index, 0);

        // Type the name and confirm
        press(&mut state, &mut register, &faces, "Ana");
        assert_eq!(state.name_buffer, "Ana");
        let effect = state.handle_key(Key::Enter, &faces, &mut register);

        assert_eq!(
            effect,
            Some(SessionEffect::SendRegistration {
                face_id: 0,
                region,
                name: "Ana".to_string(),
            })
        );

        // All selected faces processed: back to idle, locks cleared
        assert_eq!(state.register_state, RegisterState::Idle);
        assert!(state.selected_ids.is_empty());
        assert!(!register.is_locked(0));
    }

    #[test]
    fn test_selection_ignores_unknown_index() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces = vec![face(0, Rect::new(0, 0, 10, 10))];

        press(&mut state, &mut register, &faces, "1");
        press(&mut state, &mut register, &faces, "7");
        assert!(state.selected_ids.is_empty());
    }

    #[test]
    fn test_enter_without_selection_stays_idle() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();

        press(&mut state, &mut register, &[], "1");
        state.handle_key(Key::Enter, &[], &mut register);
        assert_eq!(state.register_state, RegisterState::Idle);
    }

    #[test]
    fn test_name_entry_editing() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces = vec![face(0, Rect::new(0, 0, 10, 10))];

        press(&mut state, &mut register, &faces, "10");
        state.handle_key(Key::Enter, &faces, &mut register);

        press(&mut state, &mut register, &faces, "Anb");
        state.handle_key(Key::Backspace, &faces, &mut register);
        press(&mut state, &mut register, &faces, "a");
        assert_eq!(state.name_buffer, "Ana");

        // Digits are part of names during entry
        press(&mut state, &mut register, &faces, "7");
        assert_eq!(state.name_buffer, "Ana7");
    }

    #[test]
    fn test_enter_with_blank_name_is_ignored() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces = vec![face(0, Rect::new(0, 0, 10, 10))];

        press(&mut state, &mut register, &faces, "10");
        state.handle_key(Key::Enter, &faces, &mut register);
        press(&mut state, &mut register, &faces, "   ");

        let effect = state.handle_key(Key::Enter, &faces, &mut register);
        assert!(effect.is_none());
        assert_eq!(state.register_state, RegisterState::Selecting);
    }

    #[test]
    fn test_escape_aborts_and_clears_locks() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces = vec![face(0, Rect::new(0, 0, 10, 10))];

        press(&mut state, &mut register, &faces, "10");
        state.handle_key(Key::Enter, &faces, &mut register);
        press(&mut state, &mut register, &faces, "An");

        state.handle_key(Key::Escape, &faces, &mut register);
        assert_eq!(state.register_state, RegisterState::Idle);
        assert!(state.selected_ids.is_empty());
        assert!(state.name_buffer.is_empty());
        assert!(!register.is_locked(0));
    }

    #[test]
    fn test_multi_face_naming_advances() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces = vec![
            face(0, Rect::new(0, 0, 40, 40)),
            face(5, Rect::new(200, 0, 40, 40)),
        ];

        press(&mut state, &mut register, &faces, "1");
        // '1' is a plain selection digit once already in register.idle
        press(&mut state, &mut register, &faces, "01");
        assert_eq!(state.selected_ids, vec![0, 5]);

        state.handle_key(Key::Enter, &faces, &mut register);
        press(&mut state, &mut register, &faces, "Ana");
        let first = state.handle_key(Key::Enter, &faces, &mut register);
        assert!(matches!(
            first,
            Some(SessionEffect::SendRegistration { face_id: 0, .. })
        ));
        assert_eq!(state.register_state, RegisterState::Selecting);
        assert!(state.name_buffer.is_empty());

        press(&mut state, &mut register, &faces, "Bo");
        let second = state.handle_key(Key::Enter, &faces, &mut register);
        assert!(matches!(
            second,
            Some(SessionEffect::SendRegistration { face_id: 5, .. })
        ));
        assert_eq!(state.register_state, RegisterState::Idle);
    }

    #[test]
    fn test_mode_and_exit_digits_take_precedence_in_idle() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let faces: Vec<TrackedFace> = (0..4)
            .map(|i| face(i, Rect::new(i as i32 * 100, 0, 40, 40)))
            .collect();

        press(&mut state, &mut register, &faces, "1");
        // '2' switches mode instead of selecting face index 2
        press(&mut state, &mut register, &faces, "2");
        assert_eq!(state.mode, Mode::Recognize);
        assert!(state.selected_ids.is_empty());
    }

    #[test]
    fn test_exit_from_recognize() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        let effects = press(&mut state, &mut register, &[], "3");
        assert_eq!(effects, vec![SessionEffect::Exit]);
        assert!(state.should_exit);
    }

    #[test]
    fn test_switch_to_register_clears_stale_locks() {
        let mut state = SessionState::new();
        let mut register = RegisterManager::default();
        register.lock_face(9, Rect::new(0, 0, 10, 10));

        press(&mut state, &mut register, &[], "1");
        assert_eq!(state.mode, Mode::Register);
        assert!(!register.is_locked(9));
    }
}
