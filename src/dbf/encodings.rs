//! Language driver id → character encoding resolution.
//!
//! Fallback chain: caller override → language driver table → windows-1252.
//! OEM codepages with no web-encoding equivalent (cp437, cp850, ...) fall
//! through to windows-1252 as well; precise OEM mapping is out of scope.

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GB18030, IBM866, SHIFT_JIS, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252,
    WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257, WINDOWS_874,
};
use log::debug;

/// Resolve the encoding declared by the header's language driver byte.
pub fn from_language_driver(ldid: u8) -> &'static Encoding {
    let encoding = match ldid {
        // ANSI / Windows western
        0x03 | 0x57 | 0x58 | 0x59 => WINDOWS_1252,
        // Russian OEM
        0x66 => IBM866,
        // East Asian Windows codepages
        0x78 => BIG5,
        0x79 => EUC_KR,
        0x7A => GB18030,
        0x7B => SHIFT_JIS,
        // Thai, Hebrew, Arabic
        0x7C => WINDOWS_874,
        0x7D => WINDOWS_1255,
        0x7E => WINDOWS_1256,
        // Eastern European, Russian, Turkish, Greek, Baltic
        0xC8 => WINDOWS_1250,
        0xC9 => WINDOWS_1251,
        0xCA => WINDOWS_1254,
        0xCB => WINDOWS_1253,
        0xCC => WINDOWS_1257,
        other => {
            debug!("No encoding mapped for language driver 0x{other:02x}, falling back to windows-1252");
            WINDOWS_1252
        }
    };
    debug!("Language driver 0x{ldid:02x} resolved to {}", encoding.name());
    encoding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_drivers_resolve() {
        assert_eq!(from_language_driver(0x03), WINDOWS_1252);
        assert_eq!(from_language_driver(0xC9), WINDOWS_1251);
        assert_eq!(from_language_driver(0x7B), SHIFT_JIS);
    }

    #[test]
    fn unknown_driver_falls_back() {
        assert_eq!(from_language_driver(0x00), WINDOWS_1252);
        assert_eq!(from_language_driver(0xFF), WINDOWS_1252);
    }
}
