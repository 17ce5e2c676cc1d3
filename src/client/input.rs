//! Input module
//!
//! Logical keys the locomotion controller understands, and the default
//! keyboard binding for them.

/// A logical movement key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Forward,
    Backward,
    Left,
    Right,
    Jump,
    Run,
}

impl LogicalKey {
    /// Map a DOM-style key code (`KeyW`, `Space`, ...) to a logical key
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "KeyW" => Some(LogicalKey::Forward),
            "KeyS" => Some(LogicalKey::Backward),
            "KeyA" => Some(LogicalKey::Left),
            "KeyD" => Some(LogicalKey::Right),
            "Space" => Some(LogicalKey::Jump),
            "ShiftLeft" => Some(LogicalKey::Run),
            _ => None,
        }
    }

    /// Check if this key is one of the four movement directions
    pub fn is_direction(&self) -> bool {
        matches!(
            self,
            LogicalKey::Forward | LogicalKey::Backward | LogicalKey::Left | LogicalKey::Right
        )
    }
}

/// A press or release of a logical key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Pressed(LogicalKey),
    Released(LogicalKey),
}

impl KeyEvent {
    pub fn key(&self) -> LogicalKey {
        match self {
            KeyEvent::Pressed(key) | KeyEvent::Released(key) => *key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        assert_eq!(LogicalKey::from_code("KeyW"), Some(LogicalKey::Forward));
        assert_eq!(LogicalKey::from_code("KeyA"), Some(LogicalKey::Left));
        assert_eq!(LogicalKey::from_code("Space"), Some(LogicalKey::Jump));
        assert_eq!(LogicalKey::from_code("ShiftLeft"), Some(LogicalKey::Run));
        assert_eq!(LogicalKey::from_code("ShiftRight"), None);
    }

    #[test]
    fn test_directions() {
        assert!(LogicalKey::Left.is_direction());
        assert!(!LogicalKey::Jump.is_direction());
        assert_eq!(KeyEvent::Released(LogicalKey::Run).key(), LogicalKey::Run);
    }
}
