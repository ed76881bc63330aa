// hotkeys.rs — Global key hook. `rdev::listen` blocks a dedicated OS thread;
// matched chords are forwarded to the async dispatch loop over a channel.

use rdev::{EventType, Key};
use tokio::sync::mpsc;

/// The three actions a configured key combination can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Recognize,
    Interrupt,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModKind {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    ctrl: bool,
    shift: bool,
    alt: bool,
    meta: bool,
}

impl Modifiers {
    fn set(&mut self, kind: ModKind, pressed: bool) {
        match kind {
            ModKind::Ctrl => self.ctrl = pressed,
            ModKind::Shift => self.shift = pressed,
            ModKind::Alt => self.alt = pressed,
            ModKind::Meta => self.meta = pressed,
        }
    }

    fn has(&self, kind: ModKind) -> bool {
        match kind {
            ModKind::Ctrl => self.ctrl,
            ModKind::Shift => self.shift,
            ModKind::Alt => self.alt,
            ModKind::Meta => self.meta,
        }
    }

    /// All modifiers required by `other` are currently held.
    fn contains(&self, other: &Modifiers) -> bool {
        (!other.ctrl || self.ctrl)
            && (!other.shift || self.shift)
            && (!other.alt || self.alt)
            && (!other.meta || self.meta)
    }

    fn is_empty(&self) -> bool {
        !(self.ctrl || self.shift || self.alt || self.meta)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized hotkey '{0}'")]
pub struct HotkeyParseError(String);

/// A parsed key combination: a set of modifiers plus an optional terminal
/// key. A modifiers-only chord (e.g. plain "ctrl") fires on the modifier
/// press itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    mods: Modifiers,
    key: Option<Key>,
}

impl Hotkey {
    /// Parse combinations like "space", "ctrl", "ctrl+q" or "ctrl+shift+f2".
    pub fn parse(spec: &str) -> Result<Self, HotkeyParseError> {
        let mut mods = Modifiers::default();
        let mut key = None;

        for token in spec.split('+').map(|t| t.trim().to_ascii_lowercase()) {
            match token.as_str() {
                "ctrl" | "control" => mods.set(ModKind::Ctrl, true),
                "shift" => mods.set(ModKind::Shift, true),
                "alt" => mods.set(ModKind::Alt, true),
                "meta" | "cmd" | "win" | "super" => mods.set(ModKind::Meta, true),
                other => {
                    let parsed =
                        key_from_token(other).ok_or_else(|| HotkeyParseError(spec.to_string()))?;
                    if key.replace(parsed).is_some() {
                        // Two non-modifier keys in one chord
                        return Err(HotkeyParseError(spec.to_string()));
                    }
                }
            }
        }

        if key.is_none() && mods.is_empty() {
            return Err(HotkeyParseError(spec.to_string()));
        }
        Ok(Self { mods, key })
    }
}

fn key_from_token(token: &str) -> Option<Key> {
    use Key::*;
    let key = match token {
        "a" => KeyA,
        "b" => KeyB,
        "c" => KeyC,
        "d" => KeyD,
        "e" => KeyE,
        "f" => KeyF,
        "g" => KeyG,
        "h" => KeyH,
        "i" => KeyI,
        "j" => KeyJ,
        "k" => KeyK,
        "l" => KeyL,
        "m" => KeyM,
        "n" => KeyN,
        "o" => KeyO,
        "p" => KeyP,
        "q" => KeyQ,
        "r" => KeyR,
        "s" => KeyS,
        "t" => KeyT,
        "u" => KeyU,
        "v" => KeyV,
        "w" => KeyW,
        "x" => KeyX,
        "y" => KeyY,
        "z" => KeyZ,
        "0" => Num0,
        "1" => Num1,
        "2" => Num2,
        "3" => Num3,
        "4" => Num4,
        "5" => Num5,
        "6" => Num6,
        "7" => Num7,
        "8" => Num8,
        "9" => Num9,
        "space" => Space,
        "enter" | "return" => Return,
        "tab" => Tab,
        "esc" | "escape" => Escape,
        "backspace" => Backspace,
        "delete" => Delete,
        "insert" => Insert,
        "home" => Home,
        "end" => End,
        "pageup" => PageUp,
        "pagedown" => PageDown,
        "up" => UpArrow,
        "down" => DownArrow,
        "left" => LeftArrow,
        "right" => RightArrow,
        "f1" => F1,
        "f2" => F2,
        "f3" => F3,
        "f4" => F4,
        "f5" => F5,
        "f6" => F6,
        "f7" => F7,
        "f8" => F8,
        "f9" => F9,
        "f10" => F10,
        "f11" => F11,
        "f12" => F12,
        _ => return None,
    };
    Some(key)
}

fn modifier_of(key: Key) -> Option<ModKind> {
    match key {
        Key::ControlLeft | Key::ControlRight => Some(ModKind::Ctrl),
        Key::ShiftLeft | Key::ShiftRight => Some(ModKind::Shift),
        Key::Alt | Key::AltGr => Some(ModKind::Alt),
        Key::MetaLeft | Key::MetaRight => Some(ModKind::Meta),
        _ => None,
    }
}

/// Tracks held modifiers across press/release events and matches chords.
#[derive(Debug, Default)]
pub struct ChordTracker {
    held: Modifiers,
}

impl ChordTracker {
    /// Feed one input event; returns the action of the first matching
    /// binding, if any.
    pub fn on_event(
        &mut self,
        event_type: &EventType,
        bindings: &[(Hotkey, HotkeyAction)],
    ) -> Option<HotkeyAction> {
        match event_type {
            EventType::KeyPress(key) => {
                let as_mod = modifier_of(*key);
                if let Some(kind) = as_mod {
                    self.held.set(kind, true);
                }
                for (hotkey, action) in bindings {
                    let fired = match hotkey.key {
                        Some(bound) => {
                            as_mod.is_none() && *key == bound && self.held.contains(&hotkey.mods)
                        }
                        // Modifiers-only chord: fires when one of its own
                        // modifiers goes down and the rest are already held.
                        None => {
                            as_mod.map_or(false, |kind| hotkey.mods.has(kind))
                                && self.held.contains(&hotkey.mods)
                        }
                    };
                    if fired {
                        return Some(*action);
                    }
                }
                None
            }
            EventType::KeyRelease(key) => {
                if let Some(kind) = modifier_of(*key) {
                    self.held.set(kind, false);
                }
                None
            }
            _ => None,
        }
    }
}

/// Spawn the blocking OS key hook on its own thread. Matched actions are sent
/// over `tx`; the thread lives for the rest of the process.
pub fn spawn_listener(
    bindings: Vec<(Hotkey, HotkeyAction)>,
    tx: mpsc::UnboundedSender<HotkeyAction>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut tracker = ChordTracker::default();
        let result = rdev::listen(move |event: rdev::Event| {
            if let Some(action) = tracker.on_event(&event.event_type, &bindings) {
                log::debug!("hotkey fired: {action:?}");
                if tx.send(action).is_err() {
                    log::debug!("hotkey receiver dropped");
                }
            }
        });
        if let Err(err) = result {
            log::error!("global key hook failed: {err:?}");
        }
    })
}
