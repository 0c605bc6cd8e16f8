//! Per-role vendor allow/deny tables
//!
//! Built-in tables are curated from field experience with POS hardware.
//! Configuration may extend them once at startup; after that the merged
//! [`VendorTables`] is immutable and shared behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use protocol::Role;

use crate::{Error, Result};

/// Label attached to vendors added through configuration
pub const CONFIGURED_LABEL: &str = "configured";

const CARD_READER_VENDORS: &[(u16, &str)] = &[
    (0x072f, "Advanced Card Systems (ACS)"),
    (0x0b97, "O2 Micro"),
    (0x0dc3, "Athena Smartcard Solutions"),
    (0x04e6, "SCM Microsystems"),
    (0x076b, "OmniKey (HID Global)"),
    (0x0c4b, "Reiner SCT"),
    (0x1a44, "VASCO Data Security"),
    (0x23a0, "BIFIT"),
    (0x1fc9, "NXP Semiconductors"),
    (0x24dc, "Mingwah Aohan"),
];

const SCANNER_VENDORS: &[(u16, &str)] = &[
    (0x1a86, "QinHeng Electronics"),
    (0x1a40, "Terminus Technology"),
    (0x0581, "Racal Data Group (Scanner Barcode)"),
    (0x05e0, "Symbol Technologies (Zebra)"),
    (0x0c2e, "Honeywell"),
    (0x0536, "Hand Held Products"),
    (0x05f9, "PSC Scanning"),
    (0x080c, "Datalogic"),
    (0x1eab, "Newland"),
    (0x2687, "Fitbit"),
];

/// Keyboard, mouse and generic HID keypad chip vendors
const NON_SCANNER_HID_VENDORS: &[(u16, &str)] = &[
    (0x046d, "Logitech"),
    (0x045e, "Microsoft"),
    (0x0458, "KYE Systems (Genius)"),
    (0x413c, "Dell"),
    (0x1532, "Razer"),
    (0x046a, "Cherry"),
    (0x04f2, "Chicony Electronics"),
    (0x04ca, "Lite-On Technology"),
    (0x09da, "A-FOUR TECH CO., LTD."),
    (0x1c4f, "Beijing Sigmachip Co., Ltd."),
    (0x04d9, "Holtek Semiconductor"),
    (0x1a2c, "China Resource Semico"),
    (0x258a, "SINO WEALTH"),
    (0x04b4, "Cypress Semiconductor"),
    (0x062a, "MosArt Semiconductor"),
];

const KEYBOARD_VENDORS: &[(u16, &str)] = &[
    (0x09da, "A-FOUR TECH CO., LTD."),
    (0x1c4f, "Beijing Sigmachip Co., Ltd."),
    (0x046d, "Logitech"),
    (0x045e, "Microsoft"),
    (0x05ac, "Apple"),
    (0x413c, "Dell"),
    (0x17ef, "Lenovo"),
    (0x03f0, "HP"),
    (0x1532, "Razer"),
    (0x1b1c, "Corsair"),
    (0x3434, "Keychron"),
    (0x046a, "Cherry"),
    (0x04d9, "Holtek Semiconductor"),
    (0x1a2c, "China Resource Semico"),
    (0x258a, "SINO WEALTH"),
    (0x04b4, "Cypress Semiconductor"),
    (0x062a, "MosArt Semiconductor"),
    (0x1a86, "QinHeng Electronics"),
];

/// Vendors whose keyboard-mode HID devices are scanners
const KEYBOARD_EMULATING_SCANNER_VENDORS: &[(u16, &str)] = &[
    (0x05e0, "Symbol Technologies (Zebra)"),
    (0x0c2e, "Honeywell"),
    (0x0536, "Hand Held Products"),
    (0x05f9, "PSC Scanning"),
    (0x080c, "Datalogic"),
    (0x1eab, "Newland"),
    (0x2dd6, "GSAN"),
    (0x05fe, "Champ Tech"),
    (0x0581, "Racal Data Group (Scanner Barcode)"),
    (0x1f3a, "Allwinner Technology"),
    (0x0483, "STMicroelectronics"),
];

const PRINTER_VENDORS: &[(u16, &str)] = &[
    (0x04b8, "Epson"),
    (0x04e8, "Samsung"),
    (0x03f0, "HP"),
    (0x04a9, "Canon"),
    (0x067b, "Prolific"),
    (0x0416, "Xprinter"),
    (0x0519, "Gprinter"),
];

static BUILTIN: LazyLock<VendorTables> = LazyLock::new(|| VendorTables {
    scanner: VendorList::from_tables(
        &[SCANNER_VENDORS],
        &[CARD_READER_VENDORS, NON_SCANNER_HID_VENDORS],
    ),
    keyboard: VendorList::from_tables(
        &[KEYBOARD_VENDORS],
        &[KEYBOARD_EMULATING_SCANNER_VENDORS, CARD_READER_VENDORS],
    ),
    printer: VendorList::from_tables(&[PRINTER_VENDORS], &[]),
    card_reader: VendorList::from_tables(&[CARD_READER_VENDORS], &[]),
});

static NAMES: LazyLock<BTreeMap<u16, &'static str>> = LazyLock::new(|| {
    [
        CARD_READER_VENDORS,
        SCANNER_VENDORS,
        NON_SCANNER_HID_VENDORS,
        KEYBOARD_VENDORS,
        KEYBOARD_EMULATING_SCANNER_VENDORS,
        PRINTER_VENDORS,
    ]
    .into_iter()
    .flatten()
    .copied()
    .collect()
});

/// Display name for a known vendor id
///
/// Used when a device exposes no manufacturer string.
pub fn vendor_name(vendor_id: u16) -> Option<&'static str> {
    NAMES.get(&vendor_id).copied()
}

/// Allow and deny list for one role
///
/// The two lists are kept disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorList {
    allow: BTreeMap<u16, &'static str>,
    deny: BTreeMap<u16, &'static str>,
}

impl VendorList {
    fn from_tables(allow: &[&[(u16, &'static str)]], deny: &[&[(u16, &'static str)]]) -> Self {
        let mut list = Self::default();
        for &(vid, label) in allow.iter().copied().flatten() {
            list.allow(vid, label);
        }
        for &(vid, label) in deny.iter().copied().flatten() {
            list.deny(vid, label);
        }
        list
    }

    pub fn is_allowed(&self, vendor_id: u16) -> bool {
        self.allow.contains_key(&vendor_id)
    }

    pub fn is_denied(&self, vendor_id: u16) -> bool {
        self.deny.contains_key(&vendor_id)
    }

    /// Add to the allow list, removing any deny entry
    pub fn allow(&mut self, vendor_id: u16, label: &'static str) {
        self.deny.remove(&vendor_id);
        self.allow.insert(vendor_id, label);
    }

    /// Add to the deny list, removing any allow entry
    pub fn deny(&mut self, vendor_id: u16, label: &'static str) {
        self.allow.remove(&vendor_id);
        self.deny.insert(vendor_id, label);
    }

    pub fn allowed(&self) -> impl Iterator<Item = u16> + '_ {
        self.allow.keys().copied()
    }

    pub fn denied(&self) -> impl Iterator<Item = u16> + '_ {
        self.deny.keys().copied()
    }
}

/// Vendor additions for one role, already parsed from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorOverride {
    pub allow: Vec<u16>,
    pub deny: Vec<u16>,
}

/// Vendor lists for every concrete role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorTables {
    scanner: VendorList,
    keyboard: VendorList,
    printer: VendorList,
    card_reader: VendorList,
}

impl VendorTables {
    /// The built-in tables
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Empty tables (no vendor is allow- or deny-listed for any role)
    pub fn empty() -> Self {
        Self {
            scanner: VendorList::default(),
            keyboard: VendorList::default(),
            printer: VendorList::default(),
            card_reader: VendorList::default(),
        }
    }

    /// Lists for `role`; `None` for [`Role::Unknown`]
    pub fn get(&self, role: Role) -> Option<&VendorList> {
        match role {
            Role::Scanner => Some(&self.scanner),
            Role::Keyboard => Some(&self.keyboard),
            Role::Printer => Some(&self.printer),
            Role::CardReader => Some(&self.card_reader),
            Role::Unknown => None,
        }
    }

    fn get_mut(&mut self, role: Role) -> Option<&mut VendorList> {
        match role {
            Role::Scanner => Some(&mut self.scanner),
            Role::Keyboard => Some(&mut self.keyboard),
            Role::Printer => Some(&mut self.printer),
            Role::CardReader => Some(&mut self.card_reader),
            Role::Unknown => None,
        }
    }

    /// Merge configured vendors into the lists for `role`
    ///
    /// A vendor present in both `allow` and `deny` is rejected.
    pub fn apply(&mut self, role: Role, overrides: &VendorOverride) -> Result<()> {
        if let Some(vid) = overrides.allow.iter().find(|v| overrides.deny.contains(v)) {
            return Err(Error::Config(format!(
                "vendor {:#06x} is both allowed and denied for {}",
                vid, role
            )));
        }

        let list = self
            .get_mut(role)
            .ok_or_else(|| Error::Config(format!("no vendor tables for role {}", role)))?;

        for &vid in &overrides.allow {
            list.allow(vid, vendor_name(vid).unwrap_or(CONFIGURED_LABEL));
        }
        for &vid in &overrides.deny {
            list.deny(vid, vendor_name(vid).unwrap_or(CONFIGURED_LABEL));
        }
        Ok(())
    }
}

impl Default for VendorTables {
    fn default() -> Self {
        Self::builtin()
    }
}
