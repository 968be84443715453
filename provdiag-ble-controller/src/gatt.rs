//! Discovered GATT layout and the check against the provisioning contract

use provdiag_proto::ble::{EXPECTED_CHARACTERISTICS, SERVICE_UUID, uuid_eq};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CharacteristicFlags {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicFlags {
    /// Short labels for the flags that are set, e.g. `["Read", "Notify"]`.
    pub fn labels(&self) -> Vec<&'static str> {
        [
            (self.read, "Read"),
            (self.write, "Write"),
            (self.write_without_response, "WriteNoResp"),
            (self.notify, "Notify"),
            (self.indicate, "Indicate"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GattCharacteristic {
    pub uuid: String,
    pub flags: CharacteristicFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GattService {
    pub uuid: String,
    pub characteristics: Vec<GattCharacteristic>,
}

pub fn find_provisioning_service(services: &[GattService]) -> Option<&GattService> {
    services.iter().find(|s| uuid_eq(&s.uuid, SERVICE_UUID))
}

/// Presence of one expected characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCharacteristic {
    pub label: &'static str,
    pub uuid: &'static str,
    pub found: bool,
}

/// Result of checking a service against the expected characteristics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub expected: Vec<ExpectedCharacteristic>,
    /// Characteristics on the service that are not expected, as reported
    pub extra: Vec<String>,
}

impl ServiceReport {
    pub fn all_found(&self) -> bool {
        self.expected.iter().all(|e| e.found)
    }
}

pub fn evaluate_service(service: &GattService) -> ServiceReport {
    let expected = EXPECTED_CHARACTERISTICS
        .iter()
        .map(|&(label, uuid)| ExpectedCharacteristic {
            label,
            uuid,
            found: service
                .characteristics
                .iter()
                .any(|c| uuid_eq(&c.uuid, uuid)),
        })
        .collect();

    let extra = service
        .characteristics
        .iter()
        .filter(|c| {
            !EXPECTED_CHARACTERISTICS
                .iter()
                .any(|(_, uuid)| uuid_eq(&c.uuid, uuid))
        })
        .map(|c| c.uuid.clone())
        .collect();

    ServiceReport { expected, extra }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(uuid: &str, chars: &[&str]) -> GattService {
        GattService {
            uuid: uuid.to_string(),
            characteristics: chars
                .iter()
                .map(|c| GattCharacteristic {
                    uuid: c.to_string(),
                    flags: CharacteristicFlags::default(),
                })
                .collect(),
        }
    }

    #[test]
    fn flag_labels() {
        let flags = CharacteristicFlags {
            read: true,
            write_without_response: true,
            indicate: true,
            ..Default::default()
        };
        assert_eq!(flags.labels(), vec!["Read", "WriteNoResp", "Indicate"]);
        assert!(CharacteristicFlags::default().labels().is_empty());
    }

    #[test]
    fn lowercase_uuids_match() {
        let s = service(
            "0000ffe0-0000-1000-8000-00805f9b34fb",
            &[
                "0000ffe1-0000-1000-8000-00805f9b34fb",
                "0000ffe2-0000-1000-8000-00805f9b34fb",
                "0000ffe3-0000-1000-8000-00805f9b34fb",
            ],
        );
        let services = vec![s];
        let found = find_provisioning_service(&services).unwrap();
        let report = evaluate_service(found);
        assert!(report.all_found());
        assert!(report.extra.is_empty());
    }

    #[test]
    fn extras_do_not_replace_missing() {
        let s = service(
            SERVICE_UUID,
            &[
                "0000FFE1-0000-1000-8000-00805F9B34FB",
                "0000FFE2-0000-1000-8000-00805F9B34FB",
                "0000FFE4-0000-1000-8000-00805F9B34FB",
            ],
        );
        let report = evaluate_service(&s);
        assert!(!report.all_found());
        let found: Vec<bool> = report.expected.iter().map(|e| e.found).collect();
        assert_eq!(found, vec![true, true, false]);
        assert_eq!(report.extra, vec!["0000FFE4-0000-1000-8000-00805F9B34FB"]);
    }

    #[test]
    fn extras_alongside_complete_set() {
        let s = service(
            SERVICE_UUID,
            &[
                "0000FFE3-0000-1000-8000-00805F9B34FB",
                "00002A00-0000-1000-8000-00805F9B34FB",
                "0000FFE1-0000-1000-8000-00805F9B34FB",
                "0000FFE2-0000-1000-8000-00805F9B34FB",
            ],
        );
        let report = evaluate_service(&s);
        assert!(report.all_found());
        assert_eq!(report.extra.len(), 1);
    }

    #[test]
    fn other_service_is_not_provisioning() {
        let services = vec![service("00001800-0000-1000-8000-00805F9B34FB", &[])];
        assert!(find_provisioning_service(&services).is_none());
    }
}
