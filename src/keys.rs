//! Key name parsing and virtual-key classification.

pub const VK_SHIFT: u32 = 0x10;
pub const VK_CONTROL: u32 = 0x11;
pub const VK_MENU: u32 = 0x12;
pub const VK_LSHIFT: u32 = 0xA0;
pub const VK_RSHIFT: u32 = 0xA1;
pub const VK_LCONTROL: u32 = 0xA2;
pub const VK_RCONTROL: u32 = 0xA3;
pub const VK_LMENU: u32 = 0xA4;
pub const VK_RMENU: u32 = 0xA5;

/// Inventory slots the game exposes.
pub const MAX_ITEM_SLOTS: usize = 6;

/// Default inventory keys, one per item slot.
pub const DEFAULT_ITEM_KEYS: [&str; MAX_ITEM_SLOTS] = ["1", "2", "3", "4", "5", "6"];

/// Default hero ability keys.
pub const DEFAULT_HERO_SKILL_KEYS: [&str; 4] = ["Q", "W", "E", "R"];

/// Modifier keys tracked by the engine and replayed around a mapped key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    /// Press order used when bracketing a synthesized key.
    pub const PRESS_ORDER: [Modifier; 3] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift];

    /// Generic (side-less) virtual key for this modifier.
    #[inline]
    pub const fn vk(self) -> u32 {
        match self {
            Modifier::Ctrl => VK_CONTROL,
            Modifier::Alt => VK_MENU,
            Modifier::Shift => VK_SHIFT,
        }
    }

    /// Classifies a virtual key, accepting both generic and sided codes.
    ///
    /// Low-level hooks report the sided codes (`VK_LSHIFT`, ...), while
    /// synthesized and legacy input may carry the generic ones.
    #[inline]
    pub const fn from_vk(vk: u32) -> Option<Modifier> {
        match vk {
            VK_CONTROL | VK_LCONTROL | VK_RCONTROL => Some(Modifier::Ctrl),
            VK_MENU | VK_LMENU | VK_RMENU => Some(Modifier::Alt),
            VK_SHIFT | VK_LSHIFT | VK_RSHIFT => Some(Modifier::Shift),
            _ => None,
        }
    }
}

/// Returns true for keys that must be sent with the extended-key flag.
#[inline]
pub const fn is_extended_vk(vk: u32) -> bool {
    matches!(
        vk,
        0x21..=0x28       // PageUp, PageDown, End, Home, arrows
            | 0x2C        // PrintScreen
            | 0x2D        // Insert
            | 0x2E        // Delete
            | 0x5B..=0x5D // LWin, RWin, Apps
            | 0x6F        // numpad divide
            | 0x90        // NumLock
            | VK_RCONTROL
            | VK_RMENU
    )
}

/// Converts a key name (case-insensitive) to its virtual key code.
pub fn key_name_to_vk(key_name: &str) -> Option<u32> {
    let key = key_name.trim().to_uppercase();

    // letter and digit keys
    if key.len() == 1
        && let Some(c) = key.chars().next()
        && (c.is_ascii_alphabetic() || c.is_ascii_digit())
    {
        return Some(c as u32);
    }

    // F1-F24
    if key.starts_with('F')
        && key.len() > 1
        && let Ok(num) = key[1..].parse::<u32>()
        && (1..=24).contains(&num)
    {
        return Some(0x70 + num - 1);
    }

    if key.starts_with("NUMPAD")
        && key.len() > 6
        && let Ok(num) = key[6..].parse::<u32>()
        && num <= 9
    {
        return Some(0x60 + num);
    }

    // raw code, e.g. "VK_E2"
    if let Some(hex) = key.strip_prefix("VK_")
        && let Ok(vk) = u32::from_str_radix(hex, 16)
        && (1..=0xFE).contains(&vk)
    {
        return Some(vk);
    }

    match key.as_str() {
        "ESC" | "ESCAPE" => Some(0x1B),
        "ENTER" | "RETURN" => Some(0x0D),
        "TAB" => Some(0x09),
        "SHIFT" => Some(VK_SHIFT),
        "CTRL" | "CONTROL" => Some(VK_CONTROL),
        "ALT" | "MENU" => Some(VK_MENU),
        "PAUSE" => Some(0x13),
        "CAPSLOCK" | "CAPITAL" => Some(0x14),
        "SPACE" => Some(0x20),
        "BACKSPACE" | "BACK" => Some(0x08),
        "DELETE" => Some(0x2E),
        "INSERT" => Some(0x2D),
        "HOME" => Some(0x24),
        "END" => Some(0x23),
        "PAGEUP" => Some(0x21),
        "PAGEDOWN" => Some(0x22),
        "UP" => Some(0x26),
        "DOWN" => Some(0x28),
        "LEFT" => Some(0x25),
        "RIGHT" => Some(0x27),
        "NUMLOCK" => Some(0x90),
        "SCROLL" => Some(0x91),
        "SNAPSHOT" => Some(0x2C),
        "MULTIPLY" => Some(0x6A),
        "ADD" => Some(0x6B),
        "SUBTRACT" => Some(0x6D),
        "DECIMAL" => Some(0x6E),
        "DIVIDE" => Some(0x6F),
        "OEM_3" | "`" => Some(0xC0),
        "OEM_MINUS" | "-" => Some(0xBD),
        "OEM_PLUS" | "=" => Some(0xBB),
        "LSHIFT" => Some(VK_LSHIFT),
        "RSHIFT" => Some(VK_RSHIFT),
        "LCTRL" => Some(VK_LCONTROL),
        "RCTRL" => Some(VK_RCONTROL),
        "LALT" => Some(VK_LMENU),
        "RALT" => Some(VK_RMENU),
        "LWIN" => Some(0x5B),
        "RWIN" => Some(0x5C),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_name_to_vk_letters_and_digits() {
        assert_eq!(key_name_to_vk("A"), Some(0x41));
        assert_eq!(key_name_to_vk("q"), Some(0x51));
        assert_eq!(key_name_to_vk("1"), Some(0x31));
        assert_eq!(key_name_to_vk("9"), Some(0x39));
    }

    #[test]
    fn test_key_name_to_vk_function_and_numpad() {
        assert_eq!(key_name_to_vk("F1"), Some(0x70));
        assert_eq!(key_name_to_vk("f12"), Some(0x7B));
        assert_eq!(key_name_to_vk("F24"), Some(0x87));
        assert_eq!(key_name_to_vk("NUMPAD7"), Some(0x67));
        assert_eq!(key_name_to_vk("F25"), None);
    }

    #[test]
    fn test_key_name_to_vk_special_and_invalid() {
        assert_eq!(key_name_to_vk("ESCAPE"), Some(0x1B));
        assert_eq!(key_name_to_vk("space"), Some(0x20));
        assert_eq!(key_name_to_vk("VK_E2"), Some(0xE2));
        assert_eq!(key_name_to_vk(""), None);
        assert_eq!(key_name_to_vk("NOTAKEY"), None);
    }

    #[test]
    fn test_modifier_classification() {
        assert_eq!(Modifier::from_vk(VK_CONTROL), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_vk(VK_RCONTROL), Some(Modifier::Ctrl));
        assert_eq!(Modifier::from_vk(VK_LMENU), Some(Modifier::Alt));
        assert_eq!(Modifier::from_vk(VK_RSHIFT), Some(Modifier::Shift));
        assert_eq!(Modifier::from_vk(0x41), None);
        assert_eq!(Modifier::Alt.vk(), VK_MENU);
    }

    #[test]
    fn test_extended_keys() {
        assert!(is_extended_vk(0x26)); // UP
        assert!(is_extended_vk(0x2E)); // DELETE
        assert!(is_extended_vk(VK_RMENU));
        assert!(!is_extended_vk(0x32));
        assert!(!is_extended_vk(VK_LCONTROL));
    }
}
