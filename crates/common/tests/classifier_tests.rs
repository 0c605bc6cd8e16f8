//! Classifier pipeline tests over the built-in and configured vendor tables

use std::sync::Arc;

use common::classifier::{Classifier, Rule, VendorOverride, VendorTables};
use common::test_utils::{
    hid_interface, mock_card_reader, mock_keyboard, mock_mouse, mock_printer, mock_scanner,
    mock_record,
};
use proptest::prelude::*;
use protocol::hid::{
    USAGE_KEYBOARD, USAGE_MOUSE, USAGE_PAGE_BARCODE_SCANNER, USAGE_PAGE_GENERIC_DESKTOP,
};
use protocol::{Confidence, DeviceIdentity, Role, UsagePair};

mod known_hardware {
    use super::*;

    #[test]
    fn test_allow_listed_scanner_fast_path() {
        let identity = mock_scanner(0x1a86, "USB Scanner");
        let verdict = Classifier::builtin().classify(&identity, None, Role::Scanner);

        assert!(verdict.is_match());
        assert_eq!(verdict.confidence, Some(Confidence::High));
        assert_eq!(verdict.rule, Rule::FastAllowList);
    }

    #[test]
    fn test_keyboard_named_device_from_scanner_vendor() {
        let identity = mock_keyboard(0x1a86, "USB Keyboard K1");
        let identification = Classifier::builtin().identify(&identity, None);

        assert_eq!(identification.role, Role::Keyboard);
        assert_eq!(identification.confidence, Confidence::High);
        assert_eq!(identification.rule, Rule::FastAllowList);
    }

    #[test]
    fn test_logitech_keyboard_is_not_a_scanner() {
        let identity = mock_keyboard(0x046d, "K120 Keyboard");
        let classifier = Classifier::builtin();

        let scanner = classifier.classify(&identity, None, Role::Scanner);
        assert!(!scanner.is_match());
        assert_eq!(scanner.rule, Rule::DenyList);

        assert_eq!(
            classifier.identify(&identity, None).role,
            Role::Keyboard
        );
    }

    #[test]
    fn test_honeywell_wedge_scanner_is_not_a_keyboard() {
        let identity = mock_keyboard(0x0c2e, "Voyager 1200g");
        let classifier = Classifier::builtin();

        assert!(!classifier.classify(&identity, None, Role::Keyboard).is_match());
        let identification = classifier.identify(&identity, None);
        assert_eq!(identification.role, Role::Scanner);
        assert_eq!(identification.confidence, Confidence::High);
    }

    #[test]
    fn test_unknown_vendor_printer_by_class() {
        let identity = mock_printer(0x9999, "POS-80");
        let verdict = Classifier::builtin().classify(&identity, None, Role::Printer);
        assert_eq!(verdict.confidence, Some(Confidence::High));
        assert_eq!(verdict.rule, Rule::InterfaceProtocol);
    }

    #[test]
    fn test_ccid_reader() {
        let identity = mock_card_reader(0x9998, "CCID Reader");
        let identification = Classifier::builtin().identify(&identity, None);
        assert_eq!(identification.role, Role::CardReader);
        assert_eq!(identification.confidence, Confidence::High);
    }

    #[test]
    fn test_rfid_reader_with_boot_keyboard_interface() {
        let identity = DeviceIdentity::new(0x9999, 0x0001)
            .with_product("USB RFID Reader")
            .with_interface(hid_interface(0, 1, 1));
        let classifier = Classifier::builtin();

        assert!(!classifier.classify(&identity, None, Role::Keyboard).is_match());
        assert_eq!(classifier.identify(&identity, None).role, Role::CardReader);
    }

    #[test]
    fn test_hid_receipt_printer_is_not_a_scanner() {
        let identity = mock_scanner(0x9999, "Receipt Printer");
        let classifier = Classifier::builtin();

        let scanner = classifier.classify(&identity, None, Role::Scanner);
        assert!(!scanner.is_match());
        assert_eq!(scanner.rule, Rule::NameExclusion);

        let identification = classifier.identify(&identity, None);
        assert_eq!(identification.role, Role::Printer);
        assert_eq!(identification.confidence, Confidence::Low);
    }

    #[test]
    fn test_unnamed_qinheng_keyboard() {
        // 0x1a86 is on both the scanner and keyboard allow lists
        let identity = mock_keyboard(0x1a86, "");
        let identification = Classifier::builtin().identify(&identity, None);
        assert_eq!(identification.role, Role::Keyboard);
        assert_eq!(identification.confidence, Confidence::Medium);
        assert_eq!(identification.rule, Rule::InterfaceProtocol);
    }

    #[test]
    fn test_mouse_is_unknown() {
        let identity = mock_mouse(0x9999, "Optical Mouse");
        let identification = Classifier::builtin().identify(&identity, None);
        assert_eq!(identification.role, Role::Unknown);
        assert_eq!(identification.confidence, Confidence::Low);
        assert_eq!(identification.rule, Rule::NoMatch);
    }

    #[test]
    fn test_record_carries_identification() {
        let record = mock_record(1, 4, mock_scanner(0x1a86, "USB Scanner"));
        assert_eq!(record.identification.role, Role::Scanner);
        assert_eq!(record.selector().to_string(), "1a86:0001");
    }
}

mod usage_refinement {
    use super::*;

    #[test]
    fn test_barcode_usage_upgrades_unknown_vendor() {
        let identity = DeviceIdentity::new(0x9999, 0x0001)
            .with_interface(hid_interface(0, 1, 1));
        let classifier = Classifier::builtin();

        let before = classifier.identify(&identity, None);
        assert_eq!(before.role, Role::Keyboard);
        assert_eq!(before.confidence, Confidence::Medium);

        let after = classifier.identify(
            &identity,
            Some(UsagePair::new(USAGE_PAGE_BARCODE_SCANNER, 0x02)),
        );
        assert_eq!(after.role, Role::Scanner);
        assert_eq!(after.confidence, Confidence::High);
        assert_eq!(after.rule, Rule::Usage);
    }

    #[test]
    fn test_keyboard_usage_confirms_keyboard() {
        let identity = mock_keyboard(0x9999, "");
        let identification = Classifier::builtin().identify(
            &identity,
            Some(UsagePair::new(USAGE_PAGE_GENERIC_DESKTOP, USAGE_KEYBOARD)),
        );
        assert_eq!(identification.role, Role::Keyboard);
        assert_eq!(identification.confidence, Confidence::High);
    }

    #[test]
    fn test_mouse_usage_rejects_every_hid_role() {
        let identity = DeviceIdentity::new(0x9999, 0x0001).with_interface(hid_interface(0, 0, 0));
        let usage = Some(UsagePair::new(USAGE_PAGE_GENERIC_DESKTOP, USAGE_MOUSE));
        let classifier = Classifier::builtin();

        for role in [Role::Scanner, Role::Keyboard, Role::CardReader, Role::Printer] {
            assert!(
                !classifier.classify(&identity, usage, role).is_match(),
                "{} matched a mouse usage",
                role
            );
        }
    }
}

mod tie_breaks {
    use super::*;

    #[test]
    fn test_equal_high_prefers_scanner() {
        // Scanner vendor on the fast path, smart card class on the interface
        let identity = mock_card_reader(0x1a40, "");
        let classifier = Classifier::builtin();

        let scanner = classifier.classify(&identity, None, Role::Scanner);
        let card_reader = classifier.classify(&identity, None, Role::CardReader);
        assert_eq!(scanner.confidence, Some(Confidence::High));
        assert_eq!(card_reader.confidence, Some(Confidence::High));

        assert_eq!(classifier.identify(&identity, None).role, Role::Scanner);
    }

    #[test]
    fn test_equal_low_prefers_keyboard() {
        let identity = DeviceIdentity::new(0x9999, 0x0001).with_product("Keypad with RFID");
        let classifier = Classifier::builtin();

        let keyboard = classifier.classify(&identity, None, Role::Keyboard);
        let card_reader = classifier.classify(&identity, None, Role::CardReader);
        assert_eq!(keyboard.confidence, Some(Confidence::Low));
        assert_eq!(card_reader.confidence, Some(Confidence::Low));

        assert_eq!(classifier.identify(&identity, None).role, Role::Keyboard);
    }

    #[test]
    fn test_equal_rival_match_goes_to_scanner() {
        // Both rivals name themselves on a vendor allow-listed for both
        let identity = mock_keyboard(0x1a86, "Barcode Keyboard");
        let classifier = Classifier::builtin();

        let scanner = classifier.classify(&identity, None, Role::Scanner);
        assert_eq!(scanner.confidence, Some(Confidence::Medium));

        let keyboard = classifier.classify(&identity, None, Role::Keyboard);
        assert!(!keyboard.is_match());
        assert_eq!(keyboard.rule, Rule::RivalRole);

        assert_eq!(classifier.identify(&identity, None).role, Role::Scanner);
    }

    #[test]
    fn test_higher_confidence_beats_order() {
        // Keyboard matches High on usage; scanner only by name
        let identity = DeviceIdentity::new(0x9999, 0x0001).with_product("Scan Keypad");
        let identification = Classifier::builtin().identify(
            &identity,
            Some(UsagePair::new(USAGE_PAGE_GENERIC_DESKTOP, USAGE_KEYBOARD)),
        );
        assert_eq!(identification.role, Role::Keyboard);
        assert_eq!(identification.confidence, Confidence::High);
    }
}

mod configured_tables {
    use super::*;

    #[test]
    fn test_configured_allow_enables_fast_path() {
        let mut tables = VendorTables::builtin();
        tables
            .apply(
                Role::Printer,
                &VendorOverride {
                    allow: vec![0x28e9],
                    deny: vec![],
                },
            )
            .unwrap();
        let classifier = Classifier::new(Arc::new(tables));

        let identity = DeviceIdentity::new(0x28e9, 0x0289).with_product("Receipt Printer");
        let verdict = classifier.classify(&identity, None, Role::Printer);
        assert_eq!(verdict.confidence, Some(Confidence::High));
        assert_eq!(verdict.rule, Rule::FastAllowList);
    }

    #[test]
    fn test_configured_deny_overrides_builtin_allow() {
        let mut tables = VendorTables::builtin();
        tables
            .apply(
                Role::Scanner,
                &VendorOverride {
                    allow: vec![],
                    deny: vec![0x1a86],
                },
            )
            .unwrap();
        let classifier = Classifier::new(Arc::new(tables));

        let identity = mock_scanner(0x1a86, "USB Scanner");
        let verdict = classifier.classify(&identity, None, Role::Scanner);
        assert!(!verdict.is_match());
        assert_eq!(verdict.rule, Rule::DenyList);
    }

    #[test]
    fn test_conflicting_override_is_rejected() {
        let mut tables = VendorTables::builtin();
        let result = tables.apply(
            Role::Keyboard,
            &VendorOverride {
                allow: vec![0x1234],
                deny: vec![0x1234],
            },
        );
        assert!(result.is_err());
    }
}

mod properties {
    use super::*;

    fn any_usage() -> impl Strategy<Value = Option<UsagePair>> {
        prop_oneof![
            Just(None),
            (any::<u16>(), any::<u16>())
                .prop_map(|(page, usage)| Some(UsagePair::new(page, usage))),
            Just(Some(UsagePair::new(USAGE_PAGE_BARCODE_SCANNER, 0x02))),
            Just(Some(UsagePair::new(USAGE_PAGE_GENERIC_DESKTOP, USAGE_KEYBOARD))),
        ]
    }

    fn any_interface() -> impl Strategy<Value = protocol::InterfaceDescriptor> {
        (0u8..4, 0u8..2, 0u8..3).prop_map(|(n, s, p)| hid_interface(n, s, p))
    }

    proptest! {
        #[test]
        fn deny_listed_vendor_never_matches(
            role_index in 0usize..2,
            pick in any::<prop::sample::Index>(),
            product in "[ -~]{0,24}",
            usage in any_usage(),
            interfaces in prop::collection::vec(any_interface(), 0..3),
        ) {
            let role = [Role::Scanner, Role::Keyboard][role_index];
            let classifier = Classifier::builtin();
            let denied: Vec<u16> = classifier.tables().get(role).unwrap().denied().collect();
            let vendor_id = *pick.get(&denied);

            let mut identity = DeviceIdentity::new(vendor_id, 0x0001).with_product(product);
            identity.interfaces = interfaces;

            prop_assert!(!classifier.classify(&identity, usage, role).is_match());
        }

        #[test]
        fn allow_listed_vendor_without_conflicts_is_high(
            role_index in 0usize..4,
            pick in any::<prop::sample::Index>(),
            product in "[A-Z][0-9]{1,6}",
            usage in any_usage(),
        ) {
            let role = Role::CONCRETE[role_index];
            let classifier = Classifier::builtin();
            let tables = classifier.tables();
            // Vendors shared with another role's allow list need a naming product
            let allowed: Vec<u16> = tables
                .get(role)
                .unwrap()
                .allowed()
                .filter(|vid| {
                    Role::CONCRETE
                        .into_iter()
                        .filter(|other| *other != role)
                        .all(|other| !tables.get(other).unwrap().is_allowed(*vid))
                })
                .collect();
            let vendor_id = *pick.get(&allowed);

            let identity = DeviceIdentity::new(vendor_id, 0x0001).with_product(product);
            let verdict = classifier.classify(&identity, usage, role);

            if verdict.rule == Rule::RivalRole {
                // A barcode usage makes the scanner outrank an allow-listed keyboard
                prop_assert_eq!(role, Role::Keyboard);
                prop_assert_eq!(
                    classifier.classify(&identity, usage, Role::Scanner).confidence,
                    Some(Confidence::High)
                );
            } else {
                prop_assert_eq!(verdict.confidence, Some(Confidence::High));
                prop_assert_eq!(verdict.rule, Rule::FastAllowList);
            }
        }

        #[test]
        fn scanner_and_keyboard_never_both_match(
            pick in any::<prop::sample::Index>(),
            product in prop_oneof![
                Just(String::new()),
                Just("USB Scanner".to_string()),
                Just("USB Keyboard".to_string()),
                Just("Barcode Keyboard".to_string()),
                "[A-Za-z ]{0,16}",
            ],
            usage in any_usage(),
            interfaces in prop::collection::vec(any_interface(), 0..3),
        ) {
            let classifier = Classifier::builtin();
            let tables = classifier.tables();
            let mut vendors: Vec<u16> = tables.get(Role::Scanner).unwrap().allowed().collect();
            vendors.extend(tables.get(Role::Keyboard).unwrap().allowed());
            vendors.push(0x9999);
            let vendor_id = *pick.get(&vendors);

            let mut identity = DeviceIdentity::new(vendor_id, 0x0001).with_product(product);
            identity.interfaces = interfaces;

            let scanner = classifier.classify(&identity, usage, Role::Scanner);
            let keyboard = classifier.classify(&identity, usage, Role::Keyboard);
            prop_assert!(
                !(scanner.is_match() && keyboard.is_match()),
                "{:04x} matched both: {:?} / {:?}",
                vendor_id,
                scanner,
                keyboard
            );
        }

        #[test]
        fn identify_is_consistent_with_classify(
            vendor_id in any::<u16>(),
            product in "[a-z ]{0,16}",
            usage in any_usage(),
            interfaces in prop::collection::vec(any_interface(), 0..3),
        ) {
            let classifier = Classifier::builtin();
            let mut identity = DeviceIdentity::new(vendor_id, 0x0001).with_product(product);
            identity.interfaces = interfaces;

            let identification = classifier.identify(&identity, usage);
            if identification.role == Role::Unknown {
                for role in Role::CONCRETE {
                    prop_assert!(!classifier.classify(&identity, usage, role).is_match());
                }
            } else {
                let verdict = classifier.classify(&identity, usage, identification.role);
                prop_assert_eq!(verdict.confidence, Some(identification.confidence));
                for role in Role::CONCRETE {
                    if let Some(c) = classifier.classify(&identity, usage, role).confidence {
                        prop_assert!(c <= identification.confidence);
                    }
                }
            }
        }
    }
}
