#![allow(clippy::unwrap_used)]

// Integration tests for the bridge, driven through the public `Bridge` API
// against a recording mock driver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use tagbridge_core::{
    BatteryInfo, Bridge, BridgeConfig, CallbackHandle, CompletedResult, Completion,
    ConnectionState, FirmwareChannel, FirmwareUpdateResult, HardwareCallback, InventoryEvent,
    InventoryHandle, ReaderDriver, ReaderInfo, Reply, ReplyStream, RfidConfiguration, SdkInfo,
    Tag, TagAccessRequest, TagAccessResult, TargetEpcs, Ticket,
};

// ── Mock driver ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Open,
    Close,
    Start(InventoryHandle, TargetEpcs),
    Stop(InventoryHandle, Option<Ticket>),
    Pause(InventoryHandle),
    Resume(InventoryHandle),
    Release(InventoryHandle),
    TagAccess(InventoryHandle, TagAccessRequest),
    FirmwareUpdate,
    SetLogging(u32),
}

struct MockDriver {
    callbacks: CallbackHandle,
    calls: Arc<Mutex<Vec<Call>>>,
    open: bool,
}

impl MockDriver {
    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn mock_reader() -> ReaderInfo {
    ReaderInfo {
        reader_hardware_model: "mock".into(),
        firmware_version_major: 1,
        firmware_version_minor: 2,
        firmware_version_build: 3,
        ..ReaderInfo::default()
    }
}

impl ReaderDriver for MockDriver {
    fn open_connection(&mut self) {
        self.open = true;
        self.record(Call::Open);
    }

    fn close_connection(&mut self) {
        self.open = false;
        self.record(Call::Close);
    }

    fn is_connection_open(&self) -> bool {
        self.open
    }

    fn start_inventory(
        &mut self,
        handle: InventoryHandle,
        _config: &RfidConfiguration,
        targets: &TargetEpcs,
    ) {
        self.record(Call::Start(handle, targets.clone()));
        self.callbacks.inventory(handle, InventoryEvent::Started);
    }

    fn stop_inventory(&mut self, handle: InventoryHandle, ticket: Option<Ticket>) {
        self.record(Call::Stop(handle, ticket));
        if let Some(ticket) = ticket {
            self.callbacks.inventory(
                handle,
                InventoryEvent::Stopped {
                    result: CompletedResult::OK,
                },
            );
            self.callbacks.completed(ticket, Completion::StopInventory);
        }
    }

    fn pause_inventory(&mut self, handle: InventoryHandle) {
        self.record(Call::Pause(handle));
    }

    fn resume_inventory(&mut self, handle: InventoryHandle) {
        self.record(Call::Resume(handle));
    }

    fn release_inventory(&mut self, handle: InventoryHandle) {
        self.record(Call::Release(handle));
    }

    fn tag_access(&mut self, handle: InventoryHandle, ticket: Ticket, request: TagAccessRequest) {
        // Lock/unlock never completes.
        let completion = match &request {
            TagAccessRequest::LockUnlock { .. } => {
                self.record(Call::TagAccess(handle, request));
                return;
            }
            TagAccessRequest::Read { epc, .. } => Completion::TagRead {
                tag: Some(Tag::first_seen(epc.clone(), Utc::now())),
                data: Some(vec![0xca, 0xfe]),
                result: TagAccessResult::Ok,
            },
            TagAccessRequest::ChangePower { .. } => Completion::ChangePower { success: true },
            _ => Completion::TagAccess {
                tag: None,
                result: TagAccessResult::TagNotFound,
            },
        };
        self.record(Call::TagAccess(handle, request));
        self.callbacks.completed(ticket, completion);
    }

    fn battery_info(&self) -> BatteryInfo {
        BatteryInfo {
            percent_remaining: 80,
            ..BatteryInfo::default()
        }
    }

    fn sdk_info(&self) -> SdkInfo {
        SdkInfo {
            version_major: 1,
            version_minor: 13,
            version_build: 2,
            version_date_time: Utc.timestamp_millis_opt(1_000).unwrap(),
        }
    }

    fn set_logging_status(&mut self, mask: u32) {
        self.record(Call::SetLogging(mask));
    }

    fn check_for_firmware_update(&mut self, ticket: Ticket, _channel: FirmwareChannel) {
        self.callbacks.completed(
            ticket,
            Completion::FirmwareCheck {
                update: None,
                required: false,
            },
        );
    }

    fn load_update(&mut self, ticket: Ticket, _name: &str) {
        self.callbacks
            .completed(ticket, Completion::FirmwareLoaded { success: true });
    }

    fn firmware_update(&mut self) {
        self.record(Call::FirmwareUpdate);
    }

    fn force_firmware_channel_reload(&mut self, _only_if_some_time_has_passed: bool) {}

    fn force_firmware_check(&mut self) {}

    fn region_names(&mut self, ticket: Ticket) {
        self.callbacks.completed(
            ticket,
            Completion::RegionNames {
                names: Some(vec!["US".into(), "EU".into()]),
                selected_index: 1,
            },
        );
    }

    fn set_region(&mut self, ticket: Ticket, name: &str) {
        self.callbacks.completed(
            ticket,
            Completion::RegionSet {
                success: name == "EU",
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

// ── Harness ──────────────────────────────────────────────────────

struct Harness {
    bridge: Bridge,
    hw: CallbackHandle,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    fn with_config(config: BridgeConfig) -> Self {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut hw = None;
        let bridge = Bridge::spawn(config, |callbacks| {
            hw = Some(callbacks.clone());
            MockDriver {
                callbacks,
                calls: Arc::clone(&calls),
                open: false,
            }
        });
        Self {
            bridge,
            hw: hw.unwrap(),
            calls,
        }
    }

    async fn run(&self, name: &str, args: Vec<Value>) -> ReplyStream {
        self.bridge.execute(name, args).await.unwrap()
    }

    /// Run a command and return its single reply.
    async fn call(&self, name: &str, args: Vec<Value>) -> Reply {
        let mut stream = self.run(name, args).await;
        recv(&mut stream).await
    }

    async fn start(&self, id: &str, flags: [bool; 4]) -> ReplyStream {
        let values = RfidConfiguration::default().to_values();
        let mut stream = self
            .run(
                "startInventory",
                vec![
                    json!(id),
                    Value::Array(values),
                    Value::Null,
                    json!(false),
                    json!(flags[0]),
                    json!(flags[1]),
                    json!(flags[2]),
                    json!(flags[3]),
                ],
            )
            .await;
        let started = recv(&mut stream).await;
        assert_eq!(started.callback(), Some("didStart"));
        assert!(started.keep_open);
        stream
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn handle_of(&self, nth_start: usize) -> InventoryHandle {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(h, _) => Some(h),
                _ => None,
            })
            .nth(nth_start)
            .unwrap()
    }
}

async fn recv(stream: &mut ReplyStream) -> Reply {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("reply within timeout")
        .expect("stream still open")
}

async fn ended(stream: &mut ReplyStream) -> bool {
    tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("stream settles within timeout")
        .is_none()
}

fn tag(epc: &str) -> Tag {
    Tag::first_seen(epc, Utc.timestamp_millis_opt(5_000).unwrap())
}

// ── Sessions ─────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_session_lifecycle() {
    let h = Harness::new();
    let mut events = h.start("s1", [true; 4]).await;
    let handle = h.handle_of(0);

    h.hw.inventory(
        handle,
        InventoryEvent::TagFound {
            tag: tag("E2001"),
            details: None,
        },
    );
    let found = recv(&mut events).await;
    assert_eq!(found.callback(), Some("tagFound"));
    assert_eq!(found.payload["tag_epc"], "E2001");
    assert!(found.keep_open);

    h.hw.inventory(
        handle,
        InventoryEvent::Stopped {
            result: CompletedResult::OK,
        },
    );
    let stopped = recv(&mut events).await;
    assert_eq!(stopped.callback(), Some("didStop"));
    assert_eq!(stopped.payload["result"], 0);
    assert!(!stopped.keep_open);
    assert!(ended(&mut events).await);

    let again = h.call("stopInventory", vec![json!("s1")]).await;
    assert!(again.is_error());
    assert_eq!(
        again.payload,
        json!("stopInventory called with no active inventory")
    );

    let releases = h
        .calls()
        .into_iter()
        .filter(|c| *c == Call::Release(handle))
        .count();
    assert_eq!(releases, 1);
}

#[tokio::test]
async fn caller_stop_acknowledges_after_final_event() {
    let h = Harness::new();
    let mut events = h.start("s1", [false; 4]).await;

    let ack = h.call("stopInventory", vec![json!("s1")]).await;
    assert!(ack.is_ok());
    assert!(!ack.keep_open);

    assert_eq!(recv(&mut events).await.callback(), Some("didStop"));
    assert!(ended(&mut events).await);

    // The id is free again.
    h.start("s1", [false; 4]).await;
}

#[tokio::test]
async fn duplicate_session_id_is_rejected() {
    let h = Harness::new();
    let _first = h.start("s1", [false; 4]).await;

    let values = RfidConfiguration::default().to_values();
    let dup = h
        .call("startInventory", vec![json!("s1"), Value::Array(values)])
        .await;
    assert!(dup.is_error());
    assert_eq!(dup.payload, json!("inventory session 's1' is already active"));
}

#[tokio::test]
async fn disabled_interest_never_delivers() {
    let h = Harness::new();
    let mut events = h.start("s1", [false, true, true, true]).await;
    let handle = h.handle_of(0);

    for _ in 0..3 {
        h.hw.inventory(
            handle,
            InventoryEvent::TagChanged {
                tag: tag("e2"),
                first_find: true,
            },
        );
    }
    h.hw.inventory(handle, InventoryEvent::HistoryInterval);

    let next = recv(&mut events).await;
    assert_eq!(next.callback(), Some("historyInterval"));
}

#[tokio::test]
async fn paused_stop_keeps_stream_open() {
    let h = Harness::new();
    let mut events = h.start("s1", [false; 4]).await;
    let handle = h.handle_of(0);

    assert!(h.call("pauseInventory", vec![json!("s1")]).await.is_ok());
    h.hw.inventory(
        handle,
        InventoryEvent::Stopped {
            result: CompletedResult::OK,
        },
    );
    let stopped = recv(&mut events).await;
    assert_eq!(stopped.callback(), Some("didStop"));
    assert!(stopped.keep_open);

    assert!(h.call("resumeInventory", vec![json!("s1")]).await.is_ok());
    h.hw.inventory(handle, InventoryEvent::Started);
    assert_eq!(recv(&mut events).await.callback(), Some("didStart"));

    assert!(h.calls().contains(&Call::Pause(handle)));
    assert!(h.calls().contains(&Call::Resume(handle)));
    assert!(!h.calls().contains(&Call::Release(handle)));
}

#[tokio::test]
async fn lost_connection_stop_keeps_session() {
    let h = Harness::new();
    let mut events = h.start("s1", [false; 4]).await;
    let handle = h.handle_of(0);

    h.hw.inventory(
        handle,
        InventoryEvent::Stopped {
            result: CompletedResult::LOST_CONNECTION,
        },
    );
    let stopped = recv(&mut events).await;
    assert_eq!(stopped.payload["result"], 99);
    assert!(stopped.keep_open);

    // Still registered: a caller stop succeeds and ends the stream.
    assert!(h.call("stopInventory", vec![json!("s1")]).await.is_ok());
    assert!(!recv(&mut events).await.keep_open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn foreign_thread_callbacks_keep_session_order() {
    const FINDS: i32 = 200;
    let h = Harness::new();
    let mut events = h.start("s1", [false, false, true, false]).await;
    let handle = h.handle_of(0);

    let hw = h.hw.clone();
    let reader_thread = std::thread::spawn(move || {
        for count in 0..FINDS {
            hw.inventory(
                handle,
                InventoryEvent::TagSubsequentFinds {
                    tag: tag("e2001"),
                    count,
                    details: None,
                },
            );
        }
        hw.inventory(
            handle,
            InventoryEvent::Stopped {
                result: CompletedResult::OK,
            },
        );
    });

    // Caller commands interleave with the hardware stream.
    for _ in 0..20 {
        assert!(h.call("getBatteryInfo", vec![]).await.is_ok());
    }
    reader_thread.join().unwrap();

    for count in 0..FINDS {
        let event = recv(&mut events).await;
        assert_eq!(event.callback(), Some("tagSubsequentFinds"));
        assert_eq!(event.payload["count"], count);
        assert!(event.keep_open);
    }
    let stopped = recv(&mut events).await;
    assert_eq!(stopped.callback(), Some("didStop"));
    assert!(!stopped.keep_open);
    assert!(ended(&mut events).await);
}

#[tokio::test]
async fn missing_session_errors_name_the_command() {
    let h = Harness::new();
    for name in ["pauseInventory", "resumeInventory"] {
        let reply = h.call(name, vec![json!("ghost")]).await;
        assert_eq!(
            reply.payload,
            json!(format!("{name} called with no active inventory"))
        );
    }
    let reply = h
        .call(
            "changePower",
            vec![json!("ghost"), json!(20.0), json!(10.0), json!(30.0)],
        )
        .await;
    assert_eq!(
        reply.payload,
        json!("changePower called with no active inventory")
    );
}

// ── Tag access ───────────────────────────────────────────────────

#[tokio::test]
async fn read_tag_completes_once_with_data() {
    let h = Harness::new();
    let _events = h.start("s1", [false; 4]).await;

    let mut stream = h
        .run(
            "readTag",
            vec![json!("s1"), json!("e2001"), json!(3), json!(0), json!(2), json!(8)],
        )
        .await;
    let reply = recv(&mut stream).await;
    assert!(!reply.keep_open);
    assert_eq!(reply.payload["result"], 0);
    assert_eq!(reply.payload["data"], "cafe");
    assert_eq!(reply.payload["tag_epc"], "e2001");
    assert!(ended(&mut stream).await);
}

#[tokio::test]
async fn tag_access_result_code_is_reported() {
    let h = Harness::new();
    let _events = h.start("s1", [false; 4]).await;

    let reply = h
        .call(
            "programTag",
            vec![json!("s1"), json!("e2001"), json!("e2002"), json!(0)],
        )
        .await;
    assert_eq!(reply.payload, json!({"result": 4}));
}

#[tokio::test]
async fn bad_arguments_fail_the_command() {
    let h = Harness::new();
    let reply = h.call("readTag", vec![json!("s1")]).await;
    assert!(reply.is_error());
    assert_eq!(
        reply.payload,
        json!("readTag: argument 1 is missing or not a string")
    );
}

// ── Connection listeners ─────────────────────────────────────────

#[tokio::test]
async fn connection_change_fans_out_to_every_listener() {
    let h = Harness::new();
    let mut listeners = Vec::new();
    for id in 1..=3 {
        listeners.push(h.run("addConnectionStateCallback", vec![json!(id)]).await);
    }

    h.hw.connection_state(ConnectionState::Connected, mock_reader());

    let first = recv(&mut listeners[0]).await;
    assert_eq!(first.payload["state"], 3);
    assert_eq!(first.payload["firmwareVersion"], "1.2.3");
    assert_eq!(first.payload["readerHardwareModel"], "mock");
    for stream in &mut listeners[1..] {
        assert_eq!(recv(stream).await, first);
    }

    // Round-trip a command so the executor has drained everything.
    h.call("getSdkStaticInfo", vec![]).await;
    for stream in &mut listeners {
        assert!(stream.try_next().is_none());
    }
    assert_eq!(
        *h.bridge.connection_state().borrow(),
        ConnectionState::Connected
    );
}

#[tokio::test]
async fn broadcast_uses_reader_snapshot_from_the_callback() {
    let h = Harness::new();
    let mut listener = h.run("addConnectionStateCallback", vec![json!(1)]).await;

    h.hw.connection_state(ConnectionState::Connecting, ReaderInfo::default());
    h.hw.connection_state(ConnectionState::Connected, mock_reader());

    let connecting = recv(&mut listener).await;
    assert_eq!(connecting.payload["state"], 1);
    assert_eq!(connecting.payload["firmwareVersion"], "0.0.0");
    assert_eq!(connecting.payload["readerHardwareModel"], "");
    let connected = recv(&mut listener).await;
    assert_eq!(connected.payload["firmwareVersion"], "1.2.3");
}

#[tokio::test]
async fn removed_listener_stream_ends() {
    let h = Harness::new();
    let mut listener = h.run("addConnectionStateCallback", vec![json!(9)]).await;
    assert!(
        h.call("removeConnectionStateCallback", vec![json!(9)])
            .await
            .is_ok()
    );
    assert!(ended(&mut listener).await);
}

#[tokio::test]
async fn close_connection_stops_sessions_and_clears_listeners() {
    let h = Harness::new();
    h.call("openConnection", vec![]).await;
    let mut events = h.start("s1", [true; 4]).await;
    let mut listener = h.run("addConnectionStateCallback", vec![json!(1)]).await;
    let handle = h.handle_of(0);

    assert!(h.call("closeConnection", vec![]).await.is_ok());
    assert!(ended(&mut events).await);
    assert!(ended(&mut listener).await);

    let calls = h.calls();
    assert!(calls.contains(&Call::Stop(handle, None)));
    assert!(calls.contains(&Call::Release(handle)));
    assert_eq!(calls.last(), Some(&Call::Close));
}

#[tokio::test]
async fn close_connection_drops_outstanding_operations() {
    let h = Harness::new();
    h.call("openConnection", vec![]).await;
    let _events = h.start("s1", [false; 4]).await;
    let handle = h.handle_of(0);

    let mut lock = h
        .run(
            "lockUnlockTag",
            vec![json!("s1"), json!("e2001"), json!(3), json!(0)],
        )
        .await;
    let mut update = h.run("firmwareUpdate", vec![]).await;

    assert!(h.call("closeConnection", vec![]).await.is_ok());
    assert!(ended(&mut lock).await);
    assert!(ended(&mut update).await);

    // The firmware slot is free again.
    let mut next = h.run("firmwareUpdate", vec![]).await;
    h.call("log", vec![json!("sync")]).await;
    assert!(next.try_next().is_none());

    let calls = h.calls();
    assert!(calls.iter().any(|c| matches!(c, Call::TagAccess(run, _) if *run == handle)));
    let updates = calls.iter().filter(|c| **c == Call::FirmwareUpdate).count();
    assert_eq!(updates, 2);
}

// ── Firmware ─────────────────────────────────────────────────────

#[tokio::test]
async fn firmware_update_streams_progress_then_completion() {
    let h = Harness::new();
    let mut update = h.run("firmwareUpdate", vec![]).await;

    let second = h.call("firmwareUpdate", vec![]).await;
    assert!(second.is_error());

    h.hw.deliver(HardwareCallback::FirmwareProgress {
        amount_done: 10,
        amount_total: 100,
        can_cancel: true,
    });
    h.hw.deliver(HardwareCallback::FirmwareCompleted {
        result: FirmwareUpdateResult::SUCCESS,
        seconds: 42,
    });

    let progress = recv(&mut update).await;
    assert!(progress.keep_open);
    assert_eq!(
        progress.payload,
        json!({"amountDone": 10, "amountTotal": 100, "canCancel": true})
    );
    let done = recv(&mut update).await;
    assert!(!done.keep_open);
    assert_eq!(done.payload, json!({"success": true, "seconds": 42}));

    // The slot is free again.
    let _next = h.run("firmwareUpdate", vec![]).await;
    h.call("log", vec![json!("sync")]).await;
    let updates = h
        .calls()
        .into_iter()
        .filter(|c| *c == Call::FirmwareUpdate)
        .count();
    assert_eq!(updates, 2);
}

#[tokio::test]
async fn firmware_check_and_load_complete() {
    let h = Harness::new();
    let check = h.call("automaticCheckForFirmwareUpdate", vec![]).await;
    assert_eq!(check.payload, json!({"required": false}));
    let load = h.call("loadUpdateWithName", vec![json!("1.13.0")]).await;
    assert_eq!(load.payload, json!({"success": true}));
}

// ── Region, battery, SDK ─────────────────────────────────────────

#[tokio::test]
async fn region_commands() {
    let h = Harness::new();
    let names = h.call("getRegionNames", vec![]).await;
    assert_eq!(
        names.payload,
        json!({"regionNames": ["US", "EU"], "selectedIndex": 1})
    );
    let set = h.call("setRegion", vec![json!("EU")]).await;
    assert_eq!(set.payload, json!({"success": true}));
    let must = h.call("userMustSetRegion", vec![]).await;
    assert_eq!(must.payload, json!({"value": false}));
    let can = h.call("userCanSetRegion", vec![]).await;
    assert_eq!(can.payload, json!({"value": true}));
}

#[tokio::test]
async fn battery_and_sdk_info() {
    let h = Harness::new();
    let battery = h.call("getBatteryInfo", vec![]).await;
    assert_eq!(battery.payload["percentRemaining"], 80);
    let sdk = h.call("getSdkStaticInfo", vec![]).await;
    assert_eq!(
        sdk.payload,
        json!({
            "sdkVersionMajor": 1,
            "sdkVersionMinor": 13,
            "sdkVersionBuild": 2,
            "sdkVersionDateTime": 1000,
        })
    );
}

#[tokio::test]
async fn preset_catalog_is_flat_with_names() {
    let h = Harness::new();
    let reply = h.call("getRfidConfigs", vec![]).await;
    let flat = reply.payload[0].as_array().unwrap();
    let names = reply.payload[1].as_array().unwrap();
    assert_eq!(flat.len(), 5 * 37);
    assert_eq!(names.len(), 5);
    assert_eq!(names[0], "Locate at a distance");
}

// ── Dispatch and lifecycle ───────────────────────────────────────

#[tokio::test]
async fn unknown_command_closes_stream_without_reply() {
    let h = Harness::new();
    let mut stream = h.run("setHandleScreenRotation", vec![json!(true)]).await;
    assert!(ended(&mut stream).await);
}

#[tokio::test]
async fn startup_applies_config() {
    let h = Harness::with_config(BridgeConfig {
        logging_status: 3,
        auto_open_connection: true,
        ..BridgeConfig::default()
    });
    h.call("log", vec![json!("sync")]).await;
    assert_eq!(h.calls()[..2], [Call::SetLogging(3), Call::Open]);
}

#[tokio::test]
async fn reset_clears_everything() {
    let h = Harness::new();
    h.call("openConnection", vec![]).await;
    let mut events = h.start("s1", [false; 4]).await;
    let mut listener = h.run("addConnectionStateCallback", vec![json!(1)]).await;

    h.bridge.reset().await.unwrap();
    assert!(ended(&mut events).await);
    assert!(ended(&mut listener).await);
    assert!(h.calls().contains(&Call::Close));

    // A fresh session with the same id is accepted.
    h.start("s1", [false; 4]).await;
}

#[tokio::test]
async fn shutdown_closes_the_bridge() {
    let h = Harness::new();
    let mut events = h.start("s1", [false; 4]).await;
    h.bridge.shutdown().await;
    assert!(ended(&mut events).await);
    assert!(h.bridge.execute("log", vec![json!("late")]).await.is_err());
}
