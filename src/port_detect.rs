use std::collections::HashSet;

use glob::{glob, Pattern};

/// USB serial adapters grouped by how the OS names their device nodes,
/// listed in the order autodetection prefers them.
struct DeviceFamily {
    label: &'static str,
    patterns: &'static [&'static str],
}

const FAMILIES: &[DeviceFamily] = &[
    DeviceFamily {
        label: "macOS callout",
        patterns: &[
            "/dev/cu.usbserial*",
            "/dev/cu.usbmodem*",
            "/dev/cu.SLAB_USBtoUART*",
            "/dev/cu.wchusbserial*",
        ],
    },
    DeviceFamily {
        label: "Linux USB/ACM",
        patterns: &["/dev/ttyUSB*", "/dev/ttyACM*"],
    },
    DeviceFamily {
        label: "macOS tty",
        patterns: &[
            "/dev/tty.usbserial*",
            "/dev/tty.usbmodem*",
            "/dev/tty.SLAB_USBtoUART*",
            "/dev/tty.wchusbserial*",
        ],
    },
];

impl DeviceFamily {
    fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|raw| Pattern::new(raw).is_ok_and(|pattern| pattern.matches(path)))
    }
}

fn family_of(path: &str) -> Option<&'static DeviceFamily> {
    FAMILIES.iter().find(|family| family.matches(path))
}

/// Every USB serial device node currently present, in preference order.
pub fn list_candidates() -> Vec<String> {
    let mut seen = HashSet::new();
    FAMILIES
        .iter()
        .flat_map(|family| family.patterns.iter())
        .filter_map(|raw| glob(raw).ok())
        .flat_map(|paths| paths.flatten())
        .map(|path| path.display().to_string())
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// `found port: <path> (<family>)`, one per candidate.
pub fn describe_candidates(candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .map(|path| match family_of(path) {
            Some(family) => format!("found port: {path} ({})", family.label),
            None => format!("found port: {path}"),
        })
        .collect()
}

/// Picks the rig's port when exactly one plausible device is attached.
pub fn detect_port(hint: Option<&str>) -> Option<String> {
    pick_port(list_candidates(), hint)
}

/// Narrows `candidates` by `hint`, then walks the device families in order
/// and takes the first one with exactly one member. Falls back to any unique
/// candidate.
pub(crate) fn pick_port(mut candidates: Vec<String>, hint: Option<&str>) -> Option<String> {
    if let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) {
        candidates.retain(|c| c.contains(hint));
    }

    let sole = |members: Vec<&String>| match members.as_slice() {
        [only] => Some((*only).clone()),
        _ => None,
    };

    FAMILIES
        .iter()
        .find_map(|family| sole(candidates.iter().filter(|c| family.matches(c)).collect()))
        .or_else(|| sole(candidates.iter().collect()))
}
