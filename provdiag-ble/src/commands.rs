use provdiag_ble_controller::{BleCentral, ScanResult, StepId, StepStatus, Validator};

/// Steps 1, 2 and one scan. Returns `false` if any of them failed.
pub async fn scan<C: BleCentral>(v: &mut Validator<C>, filtered: bool) -> bool {
    if !prepare(v).await {
        return false;
    }
    if filtered {
        v.scan_filtered().await;
        v.board().status(StepId::FilteredScan) == StepStatus::Pass
    } else {
        v.scan_unfiltered().await;
        v.board().status(StepId::UnfilteredScan) == StepStatus::Pass
    }
}

async fn prepare<C: BleCentral>(v: &mut Validator<C>) -> bool {
    v.create_adapter().await;
    if v.board().status(StepId::CreateAdapter) != StepStatus::Pass {
        return false;
    }
    v.check_adapter_state().await;
    v.board().status(StepId::AdapterState) == StepStatus::Pass
}

/// All seven steps in order, honouring the same gating as the shell.
pub async fn run_all<C: BleCentral>(v: &mut Validator<C>, target: Option<&str>) {
    if !prepare(v).await {
        return;
    }
    v.scan_unfiltered().await;
    v.scan_filtered().await;

    let Some(device) = pick_device(v, target) else {
        match target {
            Some(t) => eprintln!("No scanned device matches {t:?}"),
            None => eprintln!(
                "No {}* device found",
                v.settings().device_name_prefix
            ),
        }
        return;
    };
    println!("Using {} ({})", device.display_name(), device.id);

    v.connect(&device).await;
    if v.board().is_enabled(StepId::Discover) {
        v.discover().await;
    }
    if v.board().is_enabled(StepId::Validate) {
        v.validate();
    }
}

/// The device named by `target`, else the first provisioning device seen.
pub fn pick_device<C: BleCentral>(v: &Validator<C>, target: Option<&str>) -> Option<ScanResult> {
    if let Some(t) = target {
        return v.find_device(t);
    }
    let prefix = &v.settings().device_name_prefix;
    v.filtered_devices()
        .iter()
        .chain(v.unfiltered_devices().iter())
        .find(|d| {
            d.name
                .as_deref()
                .is_some_and(|n| provdiag_proto::ble::is_provisioning_device(n, prefix))
        })
        .or_else(|| v.filtered_devices().iter().next())
        .cloned()
}
