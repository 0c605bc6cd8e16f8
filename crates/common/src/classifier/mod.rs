//! Peripheral role classification
//!
//! Scanners, keyboards, card readers and some printers all enumerate as
//! generic HID devices. This module decides, per target role, whether a
//! device should be treated as that role and how confident the decision is.
//!
//! # Pipeline
//!
//! Rules run in a fixed order and the first decisive one wins:
//!
//! 1. Allow-listed vendor with no conflicting name keyword: accept (High)
//! 2. Deny-listed vendor: reject
//! 3. Name names a different role (unless it also names this one): reject
//! 4. Name names an adjacent device class (same override): reject
//! 5. HID usage pair, when available: accept (High) or reject
//! 6. Interface class / boot protocol: accept or reject
//! 7. Name names this role: accept (Low)
//! 8. Allow-listed vendor with at least one interface: accept (Medium)
//! 9. Reject
//!
//! Reordering changes outcomes on ambiguous hardware. Step 5 usually needs
//! a permission grant, so callers re-run classification once the grant
//! arrives and treat the new verdict as authoritative.
//!
//! Scanner and keyboard are rivals: keyboard-wedge scanners look like
//! keyboards on every signal but the name and the usage page. A vendor on
//! both allow lists only counts as allow-listed for a role its name
//! mentions, and a rival match is withdrawn when the other role matches
//! with higher confidence (ties go to the scanner).

mod keywords;
mod vendors;

pub use keywords::{KeyboardLayout, RoleKeywords, contains_any};
pub use vendors::{CONFIGURED_LABEL, VendorList, VendorOverride, VendorTables, vendor_name};

use std::fmt;
use std::sync::Arc;

use protocol::hid::{
    USAGE_KEYBOARD, USAGE_KEYPAD, USAGE_MOUSE, USAGE_PAGE_BARCODE_SCANNER,
    USAGE_PAGE_GENERIC_DESKTOP, USAGE_POINTER,
};
use protocol::types::{
    HID_PROTOCOL_KEYBOARD, HID_PROTOCOL_MOUSE, HID_PROTOCOL_NONE, HID_SUBCLASS_BOOT,
    HID_SUBCLASS_NONE, USB_CLASS_PRINTER, USB_CLASS_SMART_CARD,
};
use protocol::{Confidence, DeviceIdentity, InterfaceDescriptor, Role, UsagePair};
use serde::Serialize;
use tracing::debug;

/// Pipeline rule that produced a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    FastAllowList,
    DenyList,
    NameExclusion,
    AdjacentExclusion,
    Usage,
    InterfaceProtocol,
    NameKeyword,
    AllowListSafetyNet,
    RivalRole,
    NoMatch,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::FastAllowList => "fast-allow-list",
            Rule::DenyList => "deny-list",
            Rule::NameExclusion => "name-exclusion",
            Rule::AdjacentExclusion => "adjacent-exclusion",
            Rule::Usage => "usage",
            Rule::InterfaceProtocol => "interface-protocol",
            Rule::NameKeyword => "name-keyword",
            Rule::AllowListSafetyNet => "allow-list-safety-net",
            Rule::RivalRole => "rival-role",
            Rule::NoMatch => "no-match",
        };
        f.write_str(name)
    }
}

/// Outcome of classifying one device against one role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub role: Role,
    /// `Some` when the device matches the role
    pub confidence: Option<Confidence>,
    pub rule: Rule,
}

impl Verdict {
    fn accept(role: Role, confidence: Confidence, rule: Rule) -> Self {
        Self {
            role,
            confidence: Some(confidence),
            rule,
        }
    }

    fn reject(role: Role, rule: Rule) -> Self {
        Self {
            role,
            confidence: None,
            rule,
        }
    }

    pub fn is_match(&self) -> bool {
        self.confidence.is_some()
    }
}

/// Best role across every concrete role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identification {
    pub role: Role,
    pub confidence: Confidence,
    pub rule: Rule,
}

impl Identification {
    const UNKNOWN: Self = Self {
        role: Role::Unknown,
        confidence: Confidence::Low,
        rule: Rule::NoMatch,
    };
}

enum Decision {
    Accept(Confidence),
    Reject,
    Undecided,
}

/// Lowercased name strings of a device
struct Names {
    manufacturer: String,
    product: String,
}

impl Names {
    fn of(identity: &DeviceIdentity) -> Self {
        Self {
            manufacturer: identity.manufacturer_lower(),
            product: identity.product_lower(),
        }
    }

    fn any(&self, keywords: &[&str]) -> bool {
        contains_any(&self.manufacturer, keywords) || contains_any(&self.product, keywords)
    }
}

/// Role classifier over shared, immutable vendor tables
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: Arc<VendorTables>,
}

impl Classifier {
    pub fn new(tables: Arc<VendorTables>) -> Self {
        Self { tables }
    }

    /// Classifier over the built-in vendor tables
    pub fn builtin() -> Self {
        Self::new(Arc::new(VendorTables::builtin()))
    }

    pub fn tables(&self) -> &VendorTables {
        &self.tables
    }

    /// Classify `identity` against `role`
    ///
    /// `usage` is the first usage pair of the device's report descriptor, or
    /// `None` when the descriptor could not be read.
    pub fn classify(
        &self,
        identity: &DeviceIdentity,
        usage: Option<UsagePair>,
        role: Role,
    ) -> Verdict {
        let mut verdict = self.evaluate(identity, usage, role);
        if let Some(ours) = verdict.confidence
            && let Some(rival) = rival(role)
            && let Some(theirs) = self.evaluate(identity, usage, rival).confidence
            && (theirs > ours || (theirs == ours && rival == Role::Scanner))
        {
            verdict = Verdict::reject(role, Rule::RivalRole);
        }
        debug!(
            "{:04x}:{:04x} as {}: {} via {} (usage: {})",
            identity.vendor_id,
            identity.product_id,
            role,
            verdict
                .confidence
                .map_or_else(|| "rejected".to_string(), |c| c.to_string()),
            verdict.rule,
            usage.map_or_else(|| "unavailable".to_string(), |u| u.to_string()),
        );
        verdict
    }

    /// Pick the best matching role
    ///
    /// Higher confidence wins; ties go to Scanner, Keyboard, CardReader,
    /// Printer in that order. No match yields `(Unknown, Low)`.
    pub fn identify(&self, identity: &DeviceIdentity, usage: Option<UsagePair>) -> Identification {
        let mut best: Option<Identification> = None;
        for role in Role::CONCRETE {
            let verdict = self.classify(identity, usage, role);
            let Some(confidence) = verdict.confidence else {
                continue;
            };
            if best.is_none_or(|b| confidence > b.confidence) {
                best = Some(Identification {
                    role,
                    confidence,
                    rule: verdict.rule,
                });
            }
        }
        best.unwrap_or(Identification::UNKNOWN)
    }

    fn evaluate(&self, identity: &DeviceIdentity, usage: Option<UsagePair>, role: Role) -> Verdict {
        let Some(vendors) = self.tables.get(role) else {
            return Verdict::reject(role, Rule::NoMatch);
        };
        let keywords = keywords::for_role(role);
        let names = Names::of(identity);
        let names_own_role = names.any(keywords.own);
        let contested = rival(role)
            .and_then(|rival| self.tables.get(rival))
            .is_some_and(|list| list.is_allowed(identity.vendor_id));
        let allow_listed =
            vendors.is_allowed(identity.vendor_id) && (!contested || names_own_role);

        if allow_listed && !names.any(keywords.fast_path_conflicts) {
            return Verdict::accept(role, Confidence::High, Rule::FastAllowList);
        }

        if vendors.is_denied(identity.vendor_id) {
            return Verdict::reject(role, Rule::DenyList);
        }

        if !names_own_role {
            if keywords.exclusions.iter().any(|set| names.any(set))
                || contains_any(&names.manufacturer, keywords.excluded_brands)
            {
                return Verdict::reject(role, Rule::NameExclusion);
            }
            if names.any(keywords.adjacent) {
                return Verdict::reject(role, Rule::AdjacentExclusion);
            }
        }

        if let Some(usage) = usage {
            match usage_decision(role, usage) {
                Decision::Accept(confidence) => {
                    return Verdict::accept(role, confidence, Rule::Usage);
                }
                Decision::Reject => return Verdict::reject(role, Rule::Usage),
                Decision::Undecided => {}
            }
        }

        match interface_decision(role, identity, allow_listed) {
            Decision::Accept(confidence) => {
                return Verdict::accept(role, confidence, Rule::InterfaceProtocol);
            }
            Decision::Reject => return Verdict::reject(role, Rule::InterfaceProtocol),
            Decision::Undecided => {}
        }

        if names_own_role {
            return Verdict::accept(role, Confidence::Low, Rule::NameKeyword);
        }

        if allow_listed {
            // Zero interfaces means a broken enumeration
            return if identity.interfaces.is_empty() {
                Verdict::reject(role, Rule::AllowListSafetyNet)
            } else {
                Verdict::accept(role, Confidence::Medium, Rule::AllowListSafetyNet)
            };
        }

        Verdict::reject(role, Rule::NoMatch)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::builtin()
    }
}

fn rival(role: Role) -> Option<Role> {
    match role {
        Role::Scanner => Some(Role::Keyboard),
        Role::Keyboard => Some(Role::Scanner),
        _ => None,
    }
}

fn usage_decision(role: Role, usage: UsagePair) -> Decision {
    let desktop = |u: u16| usage.usage_page == USAGE_PAGE_GENERIC_DESKTOP && usage.usage == u;
    let barcode = usage.usage_page == USAGE_PAGE_BARCODE_SCANNER;
    let pointing = desktop(USAGE_MOUSE) || desktop(USAGE_POINTER);
    let keys = desktop(USAGE_KEYBOARD) || desktop(USAGE_KEYPAD);

    match role {
        Role::Scanner if barcode => Decision::Accept(Confidence::High),
        Role::Scanner if pointing => Decision::Reject,
        Role::Keyboard if keys => Decision::Accept(Confidence::High),
        Role::Keyboard if barcode || pointing => Decision::Reject,
        // RFID readers commonly emulate keyboards, so key usages stay undecided
        Role::CardReader if barcode || pointing => Decision::Reject,
        Role::Printer if barcode || pointing || keys => Decision::Reject,
        _ => Decision::Undecided,
    }
}

fn interface_decision(role: Role, identity: &DeviceIdentity, allow_listed: bool) -> Decision {
    let boot_keyboard =
        |i: &InterfaceDescriptor| i.matches(HID_SUBCLASS_BOOT, HID_PROTOCOL_KEYBOARD);
    let boot_mouse = |i: &InterfaceDescriptor| i.matches(HID_SUBCLASS_BOOT, HID_PROTOCOL_MOUSE);
    let vendor_defined =
        |i: &InterfaceDescriptor| i.matches(HID_SUBCLASS_NONE, HID_PROTOCOL_NONE);

    match role {
        Role::Scanner => {
            let mut found = false;
            for interface in identity.hid_interfaces() {
                // Keyboard-wedge scanners from known vendors use boot keyboard
                if allow_listed {
                    found = true;
                    continue;
                }
                if boot_keyboard(interface) || boot_mouse(interface) {
                    return Decision::Reject;
                }
                found |= vendor_defined(interface);
            }
            if found {
                Decision::Accept(Confidence::Medium)
            } else {
                Decision::Undecided
            }
        }
        Role::Keyboard => {
            let mut found = false;
            for interface in identity.hid_interfaces() {
                if boot_mouse(interface) {
                    return Decision::Reject;
                }
                found |= boot_keyboard(interface) || (allow_listed && vendor_defined(interface));
            }
            if found {
                Decision::Accept(Confidence::Medium)
            } else {
                Decision::Undecided
            }
        }
        Role::Printer if identity.has_class(USB_CLASS_PRINTER) => {
            Decision::Accept(Confidence::High)
        }
        Role::CardReader if identity.has_class(USB_CLASS_SMART_CARD) => {
            Decision::Accept(Confidence::High)
        }
        _ => Decision::Undecided,
    }
}
