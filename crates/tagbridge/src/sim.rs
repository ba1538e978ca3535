//! A simulated reader for exercising the bridge without hardware.
//!
//! Every visible tag is found on the first inventory round and reported as
//! a subsequent find on each round after. Rounds run every history interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tagbridge_core::{
    BatteryInfo, CallbackHandle, CompletedResult, Completion, ConnectionState, Epc,
    FirmwareChannel, FirmwareUpdateInfo, FirmwareUpdateResult, HardwareCallback, InventoryEvent,
    InventoryHandle, ReaderDriver, ReaderInfo, RfidConfiguration, SdkInfo, Tag, TagAccessRequest,
    TagAccessResult, TargetEpcs, Ticket,
};

pub const DEFAULT_TAGS: [&str; 3] = [
    "e2801160600002040000a1b1",
    "e2801160600002040000a1b2",
    "e2801160600002040000a1b3",
];

const REGIONS: [&str; 4] = ["FCC", "ETSI", "Japan", "China"];
const MIN_ROUND: Duration = Duration::from_millis(20);
const FIRMWARE_STEP: Duration = Duration::from_millis(25);
const FIRMWARE_STEPS: u32 = 4;
const FIRMWARE_VERSION: (i32, i32, i32) = (1, 4, 1);

struct Scan {
    config: RfidConfiguration,
    targets: TargetEpcs,
    /// `None` while waiting for the connection to open, or while paused.
    round: Option<Round>,
}

/// One running sequence of inventory rounds.
///
/// Events are sent while holding the gate, and `close` shuts it before
/// returning, so no tag event is queued after the halt is acknowledged.
#[derive(Clone)]
struct Round {
    cancel: CancellationToken,
    open: Arc<Mutex<bool>>,
}

impl Round {
    fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            open: Arc::new(Mutex::new(true)),
        }
    }

    fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.cancel.cancel();
    }

    /// Send `event` unless the round was closed. Returns whether it was sent.
    fn emit(
        &self,
        callbacks: &CallbackHandle,
        handle: InventoryHandle,
        event: InventoryEvent,
    ) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            callbacks.inventory(handle, event);
        }
        *open
    }
}

pub struct SimulatedReader {
    callbacks: CallbackHandle,
    tags: Vec<Epc>,
    open: bool,
    scans: HashMap<InventoryHandle, Scan>,
    region: usize,
    loaded_update: Option<String>,
}

impl SimulatedReader {
    pub fn new(callbacks: CallbackHandle, tags: Vec<Epc>) -> Self {
        Self {
            callbacks,
            tags,
            open: false,
            scans: HashMap::new(),
            region: 0,
            loaded_update: None,
        }
    }

    fn launch(&self, handle: InventoryHandle, scan: &Scan) -> Round {
        let round = Round::new();
        let visible: Vec<Epc> = self
            .tags
            .iter()
            .filter(|epc| scan.targets.matches(epc))
            .cloned()
            .collect();
        tokio::spawn(run_rounds(
            self.callbacks.clone(),
            handle,
            visible,
            RoundSettings::from(&scan.config),
            round.clone(),
        ));
        self.callbacks.inventory(handle, InventoryEvent::Started);
        round
    }

    fn halt(&mut self, handle: InventoryHandle) -> bool {
        let Some(round) = self.scans.get_mut(&handle).and_then(|s| s.round.take()) else {
            return false;
        };
        round.close();
        true
    }

    fn stopped(&self, handle: InventoryHandle) {
        self.callbacks.inventory(
            handle,
            InventoryEvent::Stopped {
                result: CompletedResult::OK,
            },
        );
    }

    fn reader_info(&self) -> ReaderInfo {
        if !self.open {
            return ReaderInfo::default();
        }
        ReaderInfo {
            required_protocol_version: 2,
            supported_protocol_version: 2,
            reader_protocol_version: 2,
            reader_hardware_model: "SIM-1".into(),
            reader_serial_number: 1,
            firmware_version_major: FIRMWARE_VERSION.0,
            firmware_version_minor: FIRMWARE_VERSION.1,
            firmware_version_build: FIRMWARE_VERSION.2,
            region_name: REGIONS[self.region].into(),
            num_volume_levels: 4,
            battery_capacity: 600,
            battery_capacity_mah: 1200,
            reader_description: "Simulated reader".into(),
            ..ReaderInfo::default()
        }
    }

    fn tag_result(&self, epc: &Epc) -> (Option<Tag>, TagAccessResult) {
        if self.tags.contains(epc) {
            (Some(Tag::first_seen(epc.clone(), Utc::now())), TagAccessResult::Ok)
        } else {
            (None, TagAccessResult::TagNotFound)
        }
    }
}

// ── Inventory rounds ─────────────────────────────────────────────

struct RoundSettings {
    period: Duration,
    continual: bool,
    subsequent_finds: bool,
    history_depth: usize,
}

impl From<&RfidConfiguration> for RoundSettings {
    fn from(config: &RfidConfiguration) -> Self {
        let period = u64::try_from(config.history_interval_msec).map_or(MIN_ROUND, |ms| {
            Duration::from_millis(ms).max(MIN_ROUND)
        });
        Self {
            period,
            continual: config.continual,
            subsequent_finds: config.report_subsequent_finds,
            history_depth: usize::try_from(config.history_depth).unwrap_or(0),
        }
    }
}

async fn run_rounds(
    callbacks: CallbackHandle,
    handle: InventoryHandle,
    visible: Vec<Epc>,
    settings: RoundSettings,
    round: Round,
) {
    let mut seen: HashMap<Epc, Tag> = HashMap::new();
    let mut ticker = tokio::time::interval(settings.period);
    let emit = |event| round.emit(&callbacks, handle, event);

    'rounds: loop {
        tokio::select! {
            biased;
            () = round.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let now = Utc::now();
        for epc in &visible {
            if let Some(tag) = seen.get_mut(epc) {
                let state = &mut tag.read_state;
                state.total_reads += 1;
                state.most_recent_read = now;
                if let Some(history) = state.read_history.as_mut() {
                    history.insert(0, 1);
                    history.truncate(settings.history_depth);
                }
                if settings.subsequent_finds
                    && !emit(InventoryEvent::TagSubsequentFinds {
                        tag: tag.clone(),
                        count: 1,
                        details: None,
                    })
                {
                    break 'rounds;
                }
                continue;
            }

            let mut tag = Tag::first_seen(epc.clone(), now);
            if settings.history_depth > 0 {
                tag.read_state.read_history = Some(vec![1]);
            }
            let sent = emit(InventoryEvent::TagFound {
                tag: tag.clone(),
                details: None,
            }) && emit(InventoryEvent::TagChanged {
                tag: tag.clone(),
                first_find: true,
            });
            if !sent {
                break 'rounds;
            }
            seen.insert(epc.clone(), tag);
        }
        if !emit(InventoryEvent::HistoryInterval) {
            break;
        }

        if !settings.continual {
            emit(InventoryEvent::Stopped {
                result: CompletedResult::OK,
            });
            break;
        }
    }
    debug!(%handle, "simulated inventory rounds ended");
}

async fn run_firmware_update(callbacks: CallbackHandle) {
    let started = tokio::time::Instant::now();
    for step in 0..=FIRMWARE_STEPS {
        tokio::time::sleep(FIRMWARE_STEP).await;
        callbacks.deliver(HardwareCallback::FirmwareProgress {
            amount_done: step * 25,
            amount_total: FIRMWARE_STEPS * 25,
            can_cancel: step < FIRMWARE_STEPS,
        });
    }
    let seconds = u32::try_from(started.elapsed().as_secs()).unwrap_or(u32::MAX);
    callbacks.deliver(HardwareCallback::FirmwareCompleted {
        result: FirmwareUpdateResult::SUCCESS,
        seconds,
    });
}

// ── ReaderDriver ─────────────────────────────────────────────────

impl ReaderDriver for SimulatedReader {
    fn open_connection(&mut self) {
        if self.open {
            return;
        }
        self.callbacks
            .connection_state(ConnectionState::Connecting, self.reader_info());
        self.open = true;
        self.callbacks
            .connection_state(ConnectionState::Connected, self.reader_info());
        info!(tags = self.tags.len(), "simulated reader connected");

        // Runs requested before the connection opened start now.
        let waiting: Vec<InventoryHandle> = self
            .scans
            .iter()
            .filter(|(_, scan)| scan.round.is_none())
            .map(|(handle, _)| *handle)
            .collect();
        for handle in waiting {
            if let Some(scan) = self.scans.get(&handle) {
                let round = self.launch(handle, scan);
                if let Some(scan) = self.scans.get_mut(&handle) {
                    scan.round = Some(round);
                }
            }
        }
    }

    fn close_connection(&mut self) {
        let handles: Vec<InventoryHandle> = self.scans.keys().copied().collect();
        for handle in handles {
            self.halt(handle);
        }
        self.open = false;
        self.callbacks
            .connection_state(ConnectionState::NotConnected, self.reader_info());
    }

    fn is_connection_open(&self) -> bool {
        self.open
    }

    fn start_inventory(
        &mut self,
        handle: InventoryHandle,
        config: &RfidConfiguration,
        targets: &TargetEpcs,
    ) {
        let mut scan = Scan {
            config: config.clone(),
            targets: targets.clone(),
            round: None,
        };
        if self.open {
            scan.round = Some(self.launch(handle, &scan));
        } else {
            debug!(%handle, "inventory waiting for connection");
        }
        self.scans.insert(handle, scan);
    }

    fn stop_inventory(&mut self, handle: InventoryHandle, ticket: Option<Ticket>) {
        self.halt(handle);
        if self.scans.contains_key(&handle) {
            self.stopped(handle);
        }
        if let Some(ticket) = ticket {
            self.callbacks.completed(ticket, Completion::StopInventory);
        }
    }

    fn pause_inventory(&mut self, handle: InventoryHandle) {
        if self.halt(handle) {
            self.stopped(handle);
        }
    }

    fn resume_inventory(&mut self, handle: InventoryHandle) {
        if !self.open {
            return;
        }
        if let Some(scan) = self.scans.get(&handle).filter(|s| s.round.is_none()) {
            let round = self.launch(handle, scan);
            if let Some(scan) = self.scans.get_mut(&handle) {
                scan.round = Some(round);
            }
        }
    }

    fn release_inventory(&mut self, handle: InventoryHandle) {
        self.halt(handle);
        self.scans.remove(&handle);
    }

    fn tag_access(&mut self, handle: InventoryHandle, ticket: Ticket, request: TagAccessRequest) {
        debug!(%handle, %ticket, ?request, "simulated tag access");
        let completion = match request {
            TagAccessRequest::Program {
                old_epc, new_epc, ..
            } => match self.tags.iter().position(|e| *e == old_epc) {
                Some(i) => {
                    self.tags[i] = new_epc.clone();
                    Completion::TagAccess {
                        tag: Some(Tag::first_seen(new_epc, Utc::now())),
                        result: TagAccessResult::Ok,
                    }
                }
                None => Completion::TagAccess {
                    tag: None,
                    result: TagAccessResult::TagNotFound,
                },
            },
            TagAccessRequest::Write { epc, .. } | TagAccessRequest::LockUnlock { epc, .. } => {
                let (tag, result) = self.tag_result(&epc);
                Completion::TagAccess { tag, result }
            }
            TagAccessRequest::Read { epc, min_bytes, .. } => {
                let (tag, result) = self.tag_result(&epc);
                let data = tag
                    .as_ref()
                    .map(|_| vec![0; usize::try_from(min_bytes).unwrap_or(0)]);
                Completion::TagRead { tag, data, result }
            }
            TagAccessRequest::CustomCommand { epc, .. } => {
                let (tag, result) = self.tag_result(&epc);
                Completion::CustomCommand {
                    header_bit: false,
                    response: tag.as_ref().map(|_| Vec::new()),
                    tag,
                    result,
                }
            }
            TagAccessRequest::ChangePower { initial, min, max } => Completion::ChangePower {
                success: min <= initial && initial <= max,
            },
        };
        self.callbacks.completed(ticket, completion);
    }

    fn battery_info(&self) -> BatteryInfo {
        BatteryInfo {
            can_scan: self.open,
            external_power_is_connected: false,
            is_charging: false,
            minutes_remaining: 480,
            percent_remaining: 80,
            voltage: 3.9,
        }
    }

    fn sdk_info(&self) -> SdkInfo {
        SdkInfo {
            version_major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
            version_minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
            version_build: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
            version_date_time: DateTime::<Utc>::default(),
        }
    }

    fn set_logging_status(&mut self, mask: u32) {
        debug!(mask, "simulated reader logging status set");
    }

    fn check_for_firmware_update(&mut self, ticket: Ticket, channel: FirmwareChannel) {
        let (major, minor, build) = FIRMWARE_VERSION;
        let update = match channel {
            FirmwareChannel::Release => (major, minor, build + 1),
            FirmwareChannel::Development => (major, minor + 1, 0),
        };
        let info = FirmwareUpdateInfo {
            name: format!("{}.{}.{}", update.0, update.1, update.2),
            notes: format!("Simulated {channel} build"),
            software_version_major: update.0,
            software_version_minor: update.1,
            software_version_build: update.2,
            software_version_date: DateTime::<Utc>::default(),
        };
        self.callbacks.completed(
            ticket,
            Completion::FirmwareCheck {
                update: Some(info),
                required: false,
            },
        );
    }

    fn load_update(&mut self, ticket: Ticket, name: &str) {
        let success = !name.is_empty();
        if success {
            self.loaded_update = Some(name.to_owned());
        }
        self.callbacks
            .completed(ticket, Completion::FirmwareLoaded { success });
    }

    fn firmware_update(&mut self) {
        match self.loaded_update.take() {
            Some(name) => {
                info!(update = %name, "simulated firmware update started");
                tokio::spawn(run_firmware_update(self.callbacks.clone()));
            }
            None => self.callbacks.deliver(HardwareCallback::FirmwareCompleted {
                result: FirmwareUpdateResult::NO_FILE,
                seconds: 0,
            }),
        }
    }

    fn force_firmware_channel_reload(&mut self, only_if_some_time_has_passed: bool) {
        debug!(only_if_some_time_has_passed, "firmware channel reload requested");
    }

    fn force_firmware_check(&mut self) {
        debug!("firmware check requested");
    }

    fn region_names(&mut self, ticket: Ticket) {
        self.callbacks.completed(
            ticket,
            Completion::RegionNames {
                names: Some(REGIONS.iter().map(|r| (*r).to_owned()).collect()),
                selected_index: i32::try_from(self.region).unwrap_or(0),
            },
        );
    }

    fn set_region(&mut self, ticket: Ticket, name: &str) {
        let found = REGIONS.iter().position(|r| *r == name);
        if let Some(i) = found {
            self.region = i;
        }
        self.callbacks.completed(
            ticket,
            Completion::RegionSet {
                success: found.is_some(),
            },
        );
    }

    fn user_must_set_region(&self) -> bool {
        false
    }

    fn user_can_set_region(&self) -> bool {
        true
    }
}
