//! Byte-level rendering of a descriptor in the conventional HID listing
//! style: raw bytes on the left, one decoded item per line on the right.
//!
//! This walks the bytes a second time and keeps its own nesting depth
//! and Usage Page tracker; it does not consult the parsed tree.

use std::fmt::Write as _;

use crate::basic::{sign_extend, ItemType, RawItem, RawItems};
use crate::collection::CollectionType;

const BYTE_COLUMN_WIDTH: usize = 24;

pub fn annotate(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    let mut usage_page = 0u16;

    for item in RawItems::new(bytes) {
        let mut line = String::new();
        for (position, byte) in item.bytes.iter().enumerate() {
            if position > 0 {
                line.push_str(", ");
            }
            let _ = write!(line, "0x{byte:02X}");
        }
        while line.len() < BYTE_COLUMN_WIDTH {
            line.push(' ');
        }

        // End Collection leaves its scope before it prints
        if item.item_type == ItemType::Main && item.tag == 0x0C {
            depth = depth.saturating_sub(1);
        }

        line.push_str("// ");
        for _ in 0..depth {
            line.push_str("  ");
        }
        line.push_str(&describe(&item, &mut usage_page));

        if item.item_type == ItemType::Main && item.tag == 0x0A {
            depth += 1;
        }

        out.push_str(&line);
        out.push('\n');
    }

    let _ = write!(out, "\n// {} bytes\n", bytes.len());

    out
}

fn describe(item: &RawItem, usage_page: &mut u16) -> String {
    match item.item_type {
        ItemType::Main => describe_main(item),
        ItemType::Global => describe_global(item, usage_page),
        ItemType::Local => describe_local(item, *usage_page),
        ItemType::Reserved => "Reserved".to_string(),
    }
}

fn describe_main(item: &RawItem) -> String {
    match item.tag {
        0x08 => format!("Input ({})", main_flags(item.data as u8, false)),
        0x09 => format!("Output ({})", main_flags(item.data as u8, true)),
        0x0B => format!("Feature ({})", main_flags(item.data as u8, true)),
        0x0A => format!("Collection ({})", CollectionType::new(item.data as u8)),
        0x0C => "End Collection".to_string(),
        tag => format!("Main (tag=0x{tag:X})"),
    }
}

/// One token per flag bit, low to high. Bit 7 reads as Bit Field /
/// Buffered Bytes on Input and Volatile / Non Volatile on Output and
/// Feature.
fn main_flags(flags: u8, volatile: bool) -> String {
    [
        if flags & 0x01 == 0 { "Data" } else { "Const" },
        if flags & 0x02 == 0 { "Array" } else { "Variable" },
        if flags & 0x04 == 0 { "Absolute" } else { "Relative" },
        if flags & 0x08 == 0 { "No Wrap" } else { "Wrap" },
        if flags & 0x10 == 0 { "Linear" } else { "Nonlinear" },
        if flags & 0x20 == 0 {
            "Preferred State"
        } else {
            "No Preferred State"
        },
        if flags & 0x40 == 0 {
            "No Null Position"
        } else {
            "Null State"
        },
        match (flags & 0x80 == 0, volatile) {
            (true, false) => "Bit Field",
            (false, false) => "Buffered Bytes",
            (true, true) => "Volatile",
            (false, true) => "Non Volatile",
        },
    ]
    .join(",")
}

fn describe_global(item: &RawItem, usage_page: &mut u16) -> String {
    match item.tag {
        0x00 => {
            *usage_page = item.data as u16;
            format!("Usage Page ({})", usage_page_name(*usage_page))
        }
        0x01 => format!("Logical Minimum ({})", sign_extend(item.data, item.size)),
        0x02 => format!("Logical Maximum ({})", sign_extend(item.data, item.size)),
        0x03 => format!("Physical Minimum ({})", sign_extend(item.data, item.size)),
        0x04 => format!("Physical Maximum ({})", sign_extend(item.data, item.size)),
        0x05 => format!("Unit Exponent ({})", sign_extend(item.data, item.size) as i8),
        0x06 => format!("Unit (0x{:X})", item.data),
        0x07 => format!("Report Size ({})", item.data),
        0x08 => format!("Report ID ({})", item.data as u8),
        0x09 => format!("Report Count ({})", item.data),
        0x0A => "Push".to_string(),
        0x0B => "Pop".to_string(),
        tag => format!("Global (tag=0x{tag:X})"),
    }
}

fn describe_local(item: &RawItem, usage_page: u16) -> String {
    match item.tag {
        0x00 => format!("Usage ({})", usage_name(usage_page, item.data)),
        0x01 => format!("Usage Minimum (0x{:X})", item.data),
        0x02 => format!("Usage Maximum (0x{:X})", item.data),
        tag => format!("Local (tag=0x{tag:X})"),
    }
}

fn usage_page_name(page: u16) -> String {
    match page {
        0x01 => "Generic Desktop".to_string(),
        0x07 => "Keyboard/Keypad".to_string(),
        0x08 => "LEDs".to_string(),
        0x09 => "Button".to_string(),
        0x0A => "Ordinal".to_string(),
        0x0C => "Consumer".to_string(),
        0x0D => "Digitizer".to_string(),
        0xFF00..=0xFFFF => format!("Vendor Defined 0x{page:04X}"),
        _ => format!("0x{page:02X}"),
    }
}

// From the HID Usage Tables; everything not listed renders as hex.
fn usage_name(page: u16, usage: u32) -> String {
    let known = match (page, usage) {
        (0x01, 0x01) => Some("Pointer"),
        (0x01, 0x02) => Some("Mouse"),
        (0x01, 0x04) => Some("Joystick"),
        (0x01, 0x05) => Some("Game Pad"),
        (0x01, 0x06) => Some("Keyboard"),
        (0x01, 0x07) => Some("Keypad"),
        (0x01, 0x30) => Some("X"),
        (0x01, 0x31) => Some("Y"),
        (0x01, 0x32) => Some("Z"),
        (0x01, 0x33) => Some("Rx"),
        (0x01, 0x34) => Some("Ry"),
        (0x01, 0x35) => Some("Rz"),
        (0x01, 0x36) => Some("Slider"),
        (0x01, 0x37) => Some("Dial"),
        (0x01, 0x38) => Some("Wheel"),
        (0x01, 0x39) => Some("Hat Switch"),
        (0x01, 0x80) => Some("System Control"),
        (0x08, 0x01) => Some("Num Lock"),
        (0x08, 0x02) => Some("Caps Lock"),
        (0x08, 0x03) => Some("Scroll Lock"),
        (0x08, 0x04) => Some("Compose"),
        (0x08, 0x05) => Some("Kana"),
        (0x0C, 0x01) => Some("Consumer Control"),
        (0x0C, 0xB0) => Some("Play"),
        (0x0C, 0xB1) => Some("Pause"),
        (0x0C, 0xB5) => Some("Scan Next Track"),
        (0x0C, 0xB6) => Some("Scan Previous Track"),
        (0x0C, 0xB7) => Some("Stop"),
        (0x0C, 0xCD) => Some("Play/Pause"),
        (0x0C, 0xE2) => Some("Mute"),
        (0x0C, 0xE9) => Some("Volume Increment"),
        (0x0C, 0xEA) => Some("Volume Decrement"),
        _ => None,
    };

    match known {
        Some(name) => name.to_string(),
        None if page == 0x09 => format!("Button {usage}"),
        None => format!("0x{usage:X}"),
    }
}
